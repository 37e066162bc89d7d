//! Headless building blocks for a long-document reader.
//!
//! For paging, windowing and scroll-driven prefetch, see the `folio-reader` crate.
//!
//! This crate holds the parts that do not depend on where the text comes from:
//! - structured references (`Genesis.1.1`, `Berakhot.2a.5`) and their section keys
//! - a content-length size estimator driven by font size and column layout
//! - a virtualized list engine: prefix sums over item sizes, offset → index lookup,
//!   overscanned visible ranges, a resettable size cache and scroll-to helpers
//!
//! It is UI-agnostic. A TUI/GUI layer is expected to provide:
//! - viewport size
//! - scroll offset
//! - (optionally) post-render measurements
#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

#[cfg(test)]
extern crate std;

#[macro_use]
mod macros;

mod error;
mod estimator;
mod fenwick;
mod list;
mod options;
mod reference;
mod state;
mod types;


pub use error::ReferenceError;
pub use estimator::{EstimatorConfig, LayoutMode, SizeEstimator};
pub use list::VirtualList;
pub use options::ListOptions;
pub use reference::{
    BookCatalog, BookInfo, Location, MAX_DEPTH, SectionCursor, StructureType,
    StructuredReference,
};
pub use state::ViewportState;
pub use types::{Align, ScrollDirection, VirtualItem, VirtualRange};

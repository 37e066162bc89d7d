//! Paging, windowing and scroll-driven prefetch for the `folio` reader engine.
//!
//! The `folio` crate resolves references and virtualizes a list of known size. This crate
//! supplies the list's content: it loads one section ("page") at a time from a
//! [`CorpusStore`], stitches pages into a single ordered window, and asks for more pages
//! as the viewport approaches either edge, keeping the reading position stationary when
//! content is spliced in above it.
//!
//! Fetching is expressed as tickets: [`Reader::on_scroll`] and friends hand out
//! [`FetchTicket`]s, the host performs the fetch (synchronously with [`Reader::run`], or on
//! its own executor via [`Reader::fetch`]) and returns the outcome with
//! [`Reader::complete`]. Responses that belong to a window the user has navigated away from
//! are dropped on arrival.
#![forbid(unsafe_code)]

#[macro_use]
mod macros;

mod anchor;
mod error;
mod loader;
mod prefetch;
mod reader;
mod segment;
mod settings;
mod store;
mod window;

#[cfg(test)]
mod tests;

pub use anchor::{ScrollAnchor, apply_anchor, capture_first_visible_anchor};
pub use error::{LoadError, ReaderError, StoreError};
pub use loader::PageLoader;
pub use prefetch::PrefetchPolicy;
pub use reader::{BoundaryCallback, Reader, ReaderOptions, VisibleRefCallback};
pub use segment::{Page, SectionRecords, Segment, SegmentKey, SegmentRecord};
pub use settings::{ReaderSettings, Theme};
pub use store::{CorpusStore, MemoryCorpus};
pub use window::{Completion, Edge, FetchKind, FetchStatus, FetchTicket, WindowController, WindowState};

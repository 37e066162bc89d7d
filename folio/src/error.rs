use alloc::string::String;

use thiserror::Error;

/// Errors produced while resolving a reference string against the book catalog.
///
/// `Empty`, `UnknownBook` and `InvalidOrdinal` are plain parse failures;
/// `StructureMismatch` means the text was well-formed but addressed the book at the wrong
/// depth. Both classes block navigation and are reported inline to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("empty reference")]
    Empty,

    #[error("unknown book `{slug}`")]
    UnknownBook { slug: String },

    #[error("`{token}` is not a valid ordinal in `{raw}`")]
    InvalidOrdinal { raw: String, token: String },

    #[error("`{raw}` has {found} ordinal(s) but `{slug}` is addressed with {expected}")]
    StructureMismatch {
        raw: String,
        slug: String,
        expected: usize,
        found: usize,
    },
}

impl ReferenceError {
    pub fn is_structure_mismatch(&self) -> bool {
        matches!(self, Self::StructureMismatch { .. })
    }

    pub fn is_parse_error(&self) -> bool {
        !self.is_structure_mismatch()
    }
}

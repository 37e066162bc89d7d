use folio::ReferenceError;
use thiserror::Error;

/// Failures reported by a [`crate::CorpusStore`].
///
/// Timeouts and retries are the store's business; by the time an error reaches the engine
/// the store has given up.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("`{0}` not found")]
    NotFound(String),
}

/// Failures while loading one page.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("failed to fetch `{section}`")]
    Fetch {
        section: String,
        #[source]
        source: StoreError,
    },

    #[error("unknown book `{0}`")]
    UnknownBook(String),

    #[error("section `{section}` holds an invalid reference `{raw}`")]
    CorruptRecord {
        section: String,
        raw: String,
        #[source]
        source: ReferenceError,
    },

    #[error("table of contents of `{book}` lists an invalid section")]
    InvalidSection {
        book: String,
        #[source]
        source: ReferenceError,
    },
}

/// Errors returned synchronously by [`crate::Reader`] navigation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReaderError {
    #[error(transparent)]
    Reference(#[from] ReferenceError),
}

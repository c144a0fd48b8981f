use thiserror::Error;
use tower_lsp::lsp_types::{Range, Url};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Unknown document: {0}")]
    UnknownDocument(Url),

    #[error("Document is not open: {0}")]
    NotOpen(Url),

    #[error("Stale version {received} for {uri} (current version is {current})")]
    StaleVersion {
        uri: Url,
        current: i32,
        received: i32,
    },

    #[error("Range {range:?} is out of bounds for {uri}")]
    InvalidRange { uri: Url, range: Range },
}

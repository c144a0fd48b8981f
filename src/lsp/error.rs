use thiserror::Error;
use tower_lsp::jsonrpc;

use crate::vfs::StoreError;

/// Failure of a request or notification handler
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid params: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn to_rpc(&self) -> jsonrpc::Error {
        let code = match self {
            ServerError::InvalidParams(_) | ServerError::Json(_) | ServerError::Store(_) => {
                jsonrpc::ErrorCode::InvalidParams
            }
            ServerError::Internal(_) => jsonrpc::ErrorCode::InternalError,
        };

        jsonrpc::Error {
            code,
            message: self.to_string().into(),
            data: None,
        }
    }
}

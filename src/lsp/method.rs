//! Method table and lifecycle rules

use tower_lsp::jsonrpc::{Error, ErrorCode};
use tower_lsp::lsp_types::notification::{
    Cancel, DidChangeConfiguration, DidChangeTextDocument, DidCloseTextDocument,
    DidOpenTextDocument, Exit, Initialized, Notification, SetTrace,
};
use tower_lsp::lsp_types::request::{
    DocumentHighlightRequest, GotoDefinition, Initialize, References, Request, Shutdown,
};

/// Every method the session dispatches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Initialize,
    Initialized,
    Shutdown,
    Exit,
    CancelRequest,
    SetTrace,
    DidChangeConfiguration,
    DidOpen,
    DidChange,
    DidClose,
    Definition,
    DocumentHighlight,
    References,
}

impl Method {
    pub const ALL: [Method; 13] = [
        Method::Initialize,
        Method::Initialized,
        Method::Shutdown,
        Method::Exit,
        Method::CancelRequest,
        Method::SetTrace,
        Method::DidChangeConfiguration,
        Method::DidOpen,
        Method::DidChange,
        Method::DidClose,
        Method::Definition,
        Method::DocumentHighlight,
        Method::References,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        let method = match name {
            Initialize::METHOD => Method::Initialize,
            Initialized::METHOD => Method::Initialized,
            Shutdown::METHOD => Method::Shutdown,
            Exit::METHOD => Method::Exit,
            Cancel::METHOD => Method::CancelRequest,
            SetTrace::METHOD => Method::SetTrace,
            DidChangeConfiguration::METHOD => Method::DidChangeConfiguration,
            DidOpenTextDocument::METHOD => Method::DidOpen,
            DidChangeTextDocument::METHOD => Method::DidChange,
            DidCloseTextDocument::METHOD => Method::DidClose,
            GotoDefinition::METHOD => Method::Definition,
            DocumentHighlightRequest::METHOD => Method::DocumentHighlight,
            References::METHOD => Method::References,
            _ => return None,
        };
        Some(method)
    }

    pub fn name(self) -> &'static str {
        match self {
            Method::Initialize => Initialize::METHOD,
            Method::Initialized => Initialized::METHOD,
            Method::Shutdown => Shutdown::METHOD,
            Method::Exit => Exit::METHOD,
            Method::CancelRequest => Cancel::METHOD,
            Method::SetTrace => SetTrace::METHOD,
            Method::DidChangeConfiguration => DidChangeConfiguration::METHOD,
            Method::DidOpen => DidOpenTextDocument::METHOD,
            Method::DidChange => DidChangeTextDocument::METHOD,
            Method::DidClose => DidCloseTextDocument::METHOD,
            Method::Definition => GotoDefinition::METHOD,
            Method::DocumentHighlight => DocumentHighlightRequest::METHOD,
            Method::References => References::METHOD,
        }
    }

    /// Whether the protocol defines this method as a request
    pub fn is_request(self) -> bool {
        matches!(
            self,
            Method::Initialize
                | Method::Shutdown
                | Method::Definition
                | Method::DocumentHighlight
                | Method::References
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Uninitialized,
    Initialized,
    ShuttingDown,
    Exited,
}

impl ServerState {
    /// Whether `method` may be dispatched in this state. The error is the reply
    /// to send when it arrived as a request.
    pub fn permits(self, method: Method) -> Result<(), Error> {
        match (self, method) {
            (ServerState::Exited, _) => Err(invalid_request("Server has exited")),
            (_, Method::Exit) => Ok(()),
            (ServerState::Uninitialized, Method::Initialize) => Ok(()),
            (ServerState::Uninitialized, _) => Err(not_initialized()),
            (ServerState::Initialized, Method::Initialize) => {
                Err(invalid_request("Server is already initialized"))
            }
            (ServerState::Initialized, _) => Ok(()),
            (ServerState::ShuttingDown, _) => Err(invalid_request("Server is shutting down")),
        }
    }
}

fn not_initialized() -> Error {
    Error {
        code: ErrorCode::ServerError(-32002),
        message: "Server not initialized".into(),
        data: None,
    }
}

fn invalid_request(message: &'static str) -> Error {
    Error {
        code: ErrorCode::InvalidRequest,
        message: message.into(),
        data: None,
    }
}

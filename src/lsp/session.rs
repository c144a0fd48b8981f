//! Protocol Session
//!
//! Reads one message at a time from the transport, dispatches it to the
//! [`LanguageServer`] to completion, then writes the response followed by any
//! notifications the handler queued. The server lifecycle lives here, so a
//! server implementation never sees a message its state does not permit.

use std::panic::{self, AssertUnwindSafe};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tower_lsp::jsonrpc::{Error, Id, Response};
use tower_lsp::lsp_types::{
    DidChangeConfigurationParams, DidChangeTextDocumentParams, DidCloseTextDocumentParams,
    DidOpenTextDocumentParams, DocumentHighlightParams, GotoDefinitionParams, InitializeParams,
    InitializeResult, ReferenceParams, ServerInfo, SetTraceParams,
};
use tracing::{debug, error, info, warn};

use crate::lsp::client::Client;
use crate::lsp::error::ServerError;
use crate::lsp::language_server::LanguageServer;
use crate::lsp::method::{Method, ServerState};
use crate::lsp::transport::{Transport, TransportError};
use crate::vfs::DocumentChange;

/// A decoded request or notification
#[derive(Debug)]
struct Incoming {
    id: Option<Id>,
    method: String,
    params: Value,
}

impl Incoming {
    /// `Ok(None)` for responses sent by the client. `Err` carries the id to
    /// answer an invalid message with.
    fn parse(message: Value) -> Result<Option<Self>, Id> {
        let Value::Object(mut object) = message else {
            return Err(Id::Null);
        };

        let id = match object.remove("id") {
            None => None,
            Some(id) => Some(serde_json::from_value::<Id>(id).map_err(|_| Id::Null)?),
        };

        let method = match object.remove("method") {
            Some(Value::String(method)) => method,
            None if is_response(&object) => return Ok(None),
            _ => return Err(id.unwrap_or(Id::Null)),
        };

        Ok(Some(Self {
            id,
            method,
            params: object.remove("params").unwrap_or(Value::Null),
        }))
    }
}

fn is_response(object: &Map<String, Value>) -> bool {
    object.contains_key("result") || object.contains_key("error")
}

fn parse_params<P: DeserializeOwned>(params: Value) -> Result<P, ServerError> {
    Ok(serde_json::from_value(params)?)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

pub struct Session<S, T> {
    server: S,
    transport: T,
    client: Client,
    state: ServerState,
    shutdown_requested: bool,
}

impl<S, T> Session<S, T>
where
    S: LanguageServer,
    T: Transport,
{
    pub fn new(server: S, transport: T) -> Self {
        Self {
            server,
            transport,
            client: Client::new(),
            state: ServerState::Uninitialized,
            shutdown_requested: false,
        }
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn server(&self) -> &S {
        &self.server
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_parts(self) -> (S, T) {
        (self.server, self.transport)
    }

    /// Serves messages until `exit` or the end of the stream. Returns `true`
    /// only when `exit` followed a `shutdown`.
    pub async fn run(&mut self) -> bool {
        loop {
            let message = match self.transport.receive().await {
                Ok(Some(message)) => message,
                Ok(None) => {
                    info!("Client closed the connection");
                    return false;
                }
                Err(TransportError::Malformed(e)) => {
                    warn!("Received malformed message: {}", e);
                    let response = Response::from_error(Id::Null, Error::parse_error());
                    if let Err(e) = self.reply(response).await {
                        error!("Failed to send parse error: {}", e);
                        return false;
                    }
                    continue;
                }
                Err(e) => {
                    error!("Transport failed: {}", e);
                    return false;
                }
            };

            if let Err(e) = self.handle_message(message).await {
                error!("Transport failed: {}", e);
                return false;
            }

            if self.state == ServerState::Exited {
                info!(
                    "Exiting ({})",
                    if self.shutdown_requested {
                        "after shutdown"
                    } else {
                        "without shutdown"
                    }
                );
                return self.shutdown_requested;
            }
        }
    }

    /// Dispatches one message and sends everything it produced
    pub async fn handle_message(&mut self, message: Value) -> Result<(), TransportError> {
        let incoming = match Incoming::parse(message) {
            Ok(Some(incoming)) => incoming,
            Ok(None) => {
                debug!("Ignoring response from client");
                return Ok(());
            }
            Err(id) => {
                warn!("Received an invalid JSON-RPC message");
                return self
                    .reply(Response::from_error(id, Error::invalid_request()))
                    .await;
            }
        };

        let Some(method) = Method::from_name(&incoming.method) else {
            match incoming.id {
                Some(id) => {
                    debug!("Unknown request: {}", incoming.method);
                    return self
                        .reply(Response::from_error(id, Error::method_not_found()))
                        .await;
                }
                None => {
                    debug!("Ignoring unknown notification: {}", incoming.method);
                    return Ok(());
                }
            }
        };

        if let Err(rejection) = self.state.permits(method) {
            return match incoming.id {
                Some(id) => {
                    debug!("Rejecting {} in state {:?}", method.name(), self.state);
                    self.reply(Response::from_error(id, rejection)).await
                }
                None => {
                    debug!("Dropping {} in state {:?}", method.name(), self.state);
                    Ok(())
                }
            };
        }

        if method.is_request() && incoming.id.is_none() {
            warn!("Dropping {} sent without an id", method.name());
            return Ok(());
        }

        debug!("Dispatching {}", method.name());
        let params = incoming.params;
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.dispatch(method, params)))
            .unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                error!("Handler for {} panicked: {}", method.name(), message);
                Err(ServerError::Internal(message))
            });

        match (incoming.id, result) {
            (Some(id), Ok(value)) => self.reply(Response::from_ok(id, value)).await?,
            (Some(id), Err(e)) => {
                warn!("{} failed: {}", method.name(), e);
                self.reply(Response::from_error(id, e.to_rpc())).await?
            }
            (None, Ok(_)) => {}
            (None, Err(e)) => error!("{} failed: {}", method.name(), e),
        }

        self.flush().await
    }

    fn dispatch(&mut self, method: Method, params: Value) -> Result<Value, ServerError> {
        let client = &mut self.client;

        match method {
            Method::Initialize => {
                let params: InitializeParams = parse_params(params)?;
                if let Some(trace) = params.trace {
                    client.set_trace_level(trace);
                }

                let id = self.server.initialize(params, client)?;
                self.state = ServerState::Initialized;
                info!("Initialized as {} {:?}", id.name, id.version);

                let result = InitializeResult {
                    capabilities: self.server.capabilities(),
                    server_info: Some(ServerInfo {
                        name: id.name,
                        version: id.version,
                    }),
                };
                Ok(serde_json::to_value(result)?)
            }
            Method::Initialized => {
                self.server.initialized(client);
                Ok(Value::Null)
            }
            Method::Shutdown => {
                self.server.shutdown(client)?;
                self.state = ServerState::ShuttingDown;
                self.shutdown_requested = true;
                info!("Shutting down");
                Ok(Value::Null)
            }
            Method::Exit => {
                self.state = ServerState::Exited;
                Ok(Value::Null)
            }
            Method::CancelRequest => {
                debug!("Ignoring cancellation: requests run to completion");
                Ok(Value::Null)
            }
            Method::SetTrace => {
                let params: SetTraceParams = parse_params(params)?;
                client.set_trace_level(params.value);
                Ok(Value::Null)
            }
            Method::DidChangeConfiguration => {
                let params: DidChangeConfigurationParams = parse_params(params)?;
                self.server.change_configuration(params.settings, client)?;
                Ok(Value::Null)
            }
            Method::DidOpen => {
                let params: DidOpenTextDocumentParams = parse_params(params)?;
                self.server.document_opened(params.text_document, client)?;
                Ok(Value::Null)
            }
            Method::DidChange => {
                let params: DidChangeTextDocumentParams = parse_params(params)?;
                let mut changes: Vec<DocumentChange> = params
                    .content_changes
                    .into_iter()
                    .map(|change| match change.range {
                        Some(range) => DocumentChange::RangeReplace {
                            range,
                            text: change.text,
                        },
                        None => DocumentChange::FullReplace(change.text),
                    })
                    .collect();
                if changes.is_empty() {
                    changes.push(DocumentChange::VersionOnly);
                }

                self.server.document_content_updated(
                    params.text_document.uri,
                    Some(params.text_document.version),
                    changes,
                    client,
                )?;
                Ok(Value::Null)
            }
            Method::DidClose => {
                let params: DidCloseTextDocumentParams = parse_params(params)?;
                self.server.document_closed(params.text_document.uri, client)?;
                Ok(Value::Null)
            }
            Method::Definition => {
                let params: GotoDefinitionParams = parse_params(params)?;
                let locations = self
                    .server
                    .goto_definition(params.text_document_position_params.into(), client)?;
                Ok(serde_json::to_value(locations)?)
            }
            Method::DocumentHighlight => {
                let params: DocumentHighlightParams = parse_params(params)?;
                let highlights = self
                    .server
                    .semantic_highlight(params.text_document_position_params.into(), client)?;
                Ok(serde_json::to_value(highlights)?)
            }
            Method::References => {
                let params: ReferenceParams = parse_params(params)?;
                let locations = self.server.references(
                    params.text_document_position.into(),
                    params.context.include_declaration,
                    client,
                )?;
                Ok(serde_json::to_value(locations)?)
            }
        }
    }

    async fn reply(&mut self, response: Response) -> Result<(), TransportError> {
        let message = serde_json::to_value(response)?;
        self.transport.send(message).await
    }

    async fn flush(&mut self) -> Result<(), TransportError> {
        for message in self.client.drain() {
            self.transport.send(message).await?;
        }
        Ok(())
    }
}

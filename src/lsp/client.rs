//! Outbound notifications queued while a handler runs
//!
//! Handlers never talk to the transport. Everything they want to tell the
//! client is queued here and flushed by the session after the handler returns.

use serde::Serialize;
use serde_json::Value;
use tower_lsp::jsonrpc::Request;
use tower_lsp::lsp_types::notification::{
    LogMessage, LogTrace, Notification, PublishDiagnostics,
};
use tower_lsp::lsp_types::{
    Diagnostic, LogMessageParams, LogTraceParams, MessageType, PublishDiagnosticsParams,
    TraceValue, Url,
};
use tracing::error;

#[derive(Debug)]
pub struct Client {
    trace: TraceValue,
    outbox: Vec<Value>,
}

impl Default for Client {
    fn default() -> Self {
        Self {
            trace: TraceValue::Off,
            outbox: Vec::new(),
        }
    }
}

impl Client {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trace level configured by the client
    pub fn trace_level(&self) -> TraceValue {
        self.trace
    }

    pub fn set_trace_level(&mut self, trace: TraceValue) {
        self.trace = trace;
    }

    /// Queues `textDocument/publishDiagnostics`
    pub fn publish_diagnostics(
        &mut self,
        uri: Url,
        version: Option<i32>,
        diagnostics: Vec<Diagnostic>,
    ) {
        self.notify::<PublishDiagnostics>(PublishDiagnosticsParams {
            uri,
            diagnostics,
            version,
        });
    }

    /// Queues `window/logMessage`
    pub fn log_message(&mut self, typ: MessageType, message: impl Into<String>) {
        self.notify::<LogMessage>(LogMessageParams {
            typ,
            message: message.into(),
        });
    }

    /// Queues an informational log message
    pub fn log(&mut self, message: impl Into<String>) {
        self.log_message(MessageType::LOG, message);
    }

    /// Queues `$/logTrace` unless tracing is off. `verbose` details are only
    /// sent at the verbose level.
    pub fn trace(&mut self, message: impl Into<String>, verbose: Option<String>) {
        let verbose = match self.trace {
            TraceValue::Off => return,
            TraceValue::Messages => None,
            TraceValue::Verbose => verbose,
        };

        self.notify::<LogTrace>(LogTraceParams {
            message: message.into(),
            verbose,
        });
    }

    /// Removes and returns every queued message
    pub fn drain(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.outbox)
    }

    pub fn is_empty(&self) -> bool {
        self.outbox.is_empty()
    }

    fn notify<N>(&mut self, params: N::Params)
    where
        N: Notification,
        N::Params: Serialize,
    {
        let params = match serde_json::to_value(params) {
            Ok(params) => params,
            Err(e) => {
                error!("Failed to serialize {} params: {}", N::METHOD, e);
                return;
            }
        };

        let notification = Request::build(N::METHOD).params(params).finish();
        match serde_json::to_value(notification) {
            Ok(value) => self.outbox.push(value),
            Err(e) => error!("Failed to serialize {} notification: {}", N::METHOD, e),
        }
    }
}

//! Capability interface implemented by a concrete server
//!
//! Every hook except `initialize` has a default, so a minimal server only
//! supplies what it actually supports.

use serde_json::Value;
use tower_lsp::lsp_types::{
    DocumentHighlight, InitializeParams, Location, OneOf, Position, ServerCapabilities,
    TextDocumentItem, TextDocumentPositionParams, TextDocumentSyncCapability,
    TextDocumentSyncKind, TextDocumentSyncOptions, Url,
};

use crate::lsp::client::Client;
use crate::lsp::error::ServerError;
use crate::vfs::DocumentChange;

/// Name and version reported in `serverInfo`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerId {
    pub name: String,
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPosition {
    pub uri: Url,
    pub position: Position,
}

impl From<TextDocumentPositionParams> for DocumentPosition {
    fn from(params: TextDocumentPositionParams) -> Self {
        Self {
            uri: params.text_document.uri,
            position: params.position,
        }
    }
}

pub trait LanguageServer {
    fn initialize(
        &mut self,
        params: InitializeParams,
        client: &mut Client,
    ) -> Result<ServerId, ServerError>;

    fn capabilities(&self) -> ServerCapabilities {
        ServerCapabilities {
            text_document_sync: Some(TextDocumentSyncCapability::Options(
                TextDocumentSyncOptions {
                    open_close: Some(true),
                    change: Some(TextDocumentSyncKind::INCREMENTAL),
                    ..Default::default()
                },
            )),
            definition_provider: Some(OneOf::Left(true)),
            references_provider: Some(OneOf::Left(true)),
            document_highlight_provider: Some(OneOf::Left(true)),
            ..Default::default()
        }
    }

    fn initialized(&mut self, _client: &mut Client) {}

    fn shutdown(&mut self, _client: &mut Client) -> Result<(), ServerError> {
        Ok(())
    }

    fn change_configuration(
        &mut self,
        _settings: Value,
        _client: &mut Client,
    ) -> Result<(), ServerError> {
        Ok(())
    }

    fn document_opened(
        &mut self,
        _document: TextDocumentItem,
        _client: &mut Client,
    ) -> Result<(), ServerError> {
        Ok(())
    }

    /// Applies `changes` in order. A change notification without content
    /// arrives as a single [`DocumentChange::VersionOnly`].
    fn document_content_updated(
        &mut self,
        _uri: Url,
        _version: Option<i32>,
        _changes: Vec<DocumentChange>,
        _client: &mut Client,
    ) -> Result<(), ServerError> {
        Ok(())
    }

    fn document_closed(&mut self, _uri: Url, _client: &mut Client) -> Result<(), ServerError> {
        Ok(())
    }

    fn goto_definition(
        &self,
        _at: DocumentPosition,
        _client: &mut Client,
    ) -> Result<Vec<Location>, ServerError> {
        Ok(Vec::new())
    }

    fn semantic_highlight(
        &self,
        _at: DocumentPosition,
        _client: &mut Client,
    ) -> Result<Vec<DocumentHighlight>, ServerError> {
        Ok(Vec::new())
    }

    fn references(
        &self,
        _at: DocumentPosition,
        _include_declaration: bool,
        _client: &mut Client,
    ) -> Result<Vec<Location>, ServerError> {
        Ok(Vec::new())
    }
}

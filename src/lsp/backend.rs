use serde_json::Value;
use tower_lsp::lsp_types::{
    DocumentHighlight, InitializeParams, Location, MessageType, TextDocumentItem, Url,
};
use tracing::{info, warn};

use crate::compiler::engine::CompilerEngine;
use crate::compiler::orchestrator::{CompileInputs, Orchestrator};
use crate::compiler::paths::SourcePaths;
use crate::config::WorkspaceConfig;
use crate::lsp::client::Client;
use crate::lsp::error::ServerError;
use crate::lsp::language_server::{DocumentPosition, LanguageServer, ServerId};
use crate::resolver::SymbolResolver;
use crate::vfs::{DocumentChange, DocumentStore};

/// Language server backed by a whole-program compiler engine
pub struct Backend<E> {
    store: DocumentStore,
    config: WorkspaceConfig,
    paths: SourcePaths,
    compiler: Orchestrator<E>,
}

impl<E: CompilerEngine> Backend<E> {
    pub fn new(engine: E) -> Self {
        Self {
            store: DocumentStore::new(),
            config: WorkspaceConfig::default(),
            paths: SourcePaths::default(),
            compiler: Orchestrator::new(engine),
        }
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    pub fn paths(&self) -> &SourcePaths {
        &self.paths
    }

    pub fn compiler(&self) -> &Orchestrator<E> {
        &self.compiler
    }

    fn apply_settings(&mut self, settings: &Value, client: &mut Client) -> Result<(), ServerError> {
        let problems = self.config.apply(settings)?;
        for problem in problems {
            warn!("Ignoring setting: {}", problem);
            client.log_message(MessageType::WARNING, problem.to_string());
        }
        Ok(())
    }

    fn validate(&mut self, uri: &Url, client: &mut Client) {
        let Self {
            store,
            config,
            paths,
            compiler,
        } = self;
        compiler.validate(
            uri,
            CompileInputs {
                store,
                config,
                paths,
            },
            client,
        );
    }

    fn validate_all(&mut self, client: &mut Client) {
        let Self {
            store,
            config,
            paths,
            compiler,
        } = self;
        compiler.validate_all(
            CompileInputs {
                store,
                config,
                paths,
            },
            client,
        );
    }

    /// Resolver over the latest compilation, after checking `uri` is tracked
    fn resolver(&self, uri: &Url) -> Result<Option<SymbolResolver<'_>>, ServerError> {
        self.store.require(uri)?;
        Ok(self
            .compiler
            .snapshot()
            .map(|snapshot| SymbolResolver::new(snapshot, &self.paths)))
    }
}

impl<E: CompilerEngine> LanguageServer for Backend<E> {
    fn initialize(
        &mut self,
        params: InitializeParams,
        client: &mut Client,
    ) -> Result<ServerId, ServerError> {
        #[allow(deprecated)]
        let root = params.root_uri.or_else(|| {
            params
                .workspace_folders
                .and_then(|folders| folders.into_iter().next())
                .map(|folder| folder.uri)
        });

        if let Some(root) = root {
            match root.to_file_path() {
                Ok(path) => {
                    info!("Workspace base path: {:?}", path);
                    self.paths.set_base_path(path);
                }
                Err(()) => warn!("Workspace root is not a file URI: {}", root),
            }
        }

        if let Some(options) = params.initialization_options {
            self.apply_settings(&options, client)?;
        }

        let engine = self.compiler.engine();
        client.log_message(
            MessageType::INFO,
            format!("{} {} initializing", engine.name(), engine.version()),
        );

        Ok(ServerId {
            name: engine.name().to_string(),
            version: Some(engine.version()),
        })
    }

    fn initialized(&mut self, client: &mut Client) {
        client.log_message(MessageType::INFO, "LSP server initialized");
    }

    fn shutdown(&mut self, client: &mut Client) -> Result<(), ServerError> {
        client.log_message(MessageType::INFO, "LSP server shutting down");
        Ok(())
    }

    fn change_configuration(
        &mut self,
        settings: Value,
        client: &mut Client,
    ) -> Result<(), ServerError> {
        self.apply_settings(&settings, client)?;
        self.validate_all(client);
        Ok(())
    }

    fn document_opened(
        &mut self,
        document: TextDocumentItem,
        client: &mut Client,
    ) -> Result<(), ServerError> {
        let TextDocumentItem {
            uri,
            language_id,
            version,
            text,
        } = document;

        client.log(format!("Document opened: {}", uri));
        self.store.open(uri.clone(), language_id, version, text);
        self.validate(&uri, client);
        Ok(())
    }

    fn document_content_updated(
        &mut self,
        uri: Url,
        version: Option<i32>,
        changes: Vec<DocumentChange>,
        client: &mut Client,
    ) -> Result<(), ServerError> {
        let applied = changes
            .into_iter()
            .try_for_each(|change| self.store.apply(&uri, version, change));

        // changes before a failing one stay applied
        self.validate_all(client);
        Ok(applied?)
    }

    fn document_closed(&mut self, uri: Url, client: &mut Client) -> Result<(), ServerError> {
        self.store.close(&uri)?;
        client.log(format!("Document closed: {}", uri));
        self.compiler.clear(&uri, client);
        Ok(())
    }

    fn goto_definition(
        &self,
        at: DocumentPosition,
        _client: &mut Client,
    ) -> Result<Vec<Location>, ServerError> {
        Ok(self
            .resolver(&at.uri)?
            .map(|resolver| resolver.goto_definition(&at.uri, at.position))
            .unwrap_or_default())
    }

    fn semantic_highlight(
        &self,
        at: DocumentPosition,
        _client: &mut Client,
    ) -> Result<Vec<DocumentHighlight>, ServerError> {
        Ok(self
            .resolver(&at.uri)?
            .map(|resolver| resolver.semantic_highlight(&at.uri, at.position))
            .unwrap_or_default())
    }

    fn references(
        &self,
        at: DocumentPosition,
        include_declaration: bool,
        _client: &mut Client,
    ) -> Result<Vec<Location>, ServerError> {
        Ok(self
            .resolver(&at.uri)?
            .map(|resolver| resolver.references(&at.uri, at.position, include_declaration))
            .unwrap_or_default())
    }
}

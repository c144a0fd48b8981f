//! Compilation Orchestrator
//!
//! Turns the Document Store into whole-program compilations and fans the
//! resulting diagnostics out to the documents they belong to.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use indexmap::IndexMap;
use tower_lsp::lsp_types::{Diagnostic, MessageType, Url};
use tracing::{debug, info, warn};

use crate::compiler::diagnostics;
use crate::compiler::engine::{
    CompilerEngine, EngineDiagnostic, NodeKind, Severity, SourceLocation,
};
use crate::compiler::paths::SourcePaths;
use crate::compiler::reader::{FileReader, ReadFailure};
use crate::compiler::snapshot::ProgramSnapshot;
use crate::config::WorkspaceConfig;
use crate::lsp::client::Client;
use crate::vfs::DocumentStore;

/// Everything a compilation reads besides the engine itself
#[derive(Clone, Copy)]
pub struct CompileInputs<'a> {
    pub store: &'a DocumentStore,
    pub config: &'a WorkspaceConfig,
    pub paths: &'a SourcePaths,
}

pub struct Orchestrator<E> {
    engine: E,
    snapshot: Option<ProgramSnapshot>,
    /// Documents whose last published diagnostic list was non-empty
    published: BTreeSet<Url>,
    /// Last target version handed to the engine, accepted or not
    requested_target_version: Option<String>,
}

impl<E: CompilerEngine> Orchestrator<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            snapshot: None,
            published: BTreeSet::new(),
            requested_target_version: None,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Result of the latest compilation, if any
    pub fn snapshot(&self) -> Option<&ProgramSnapshot> {
        self.snapshot.as_ref()
    }

    /// Compiles every tracked document as one program and stores the snapshot
    pub fn compile(&mut self, inputs: CompileInputs<'_>, client: &mut Client) -> &ProgramSnapshot {
        let CompileInputs {
            store,
            config,
            paths,
        } = inputs;

        let sources: BTreeMap<String, String> = store
            .documents()
            .map(|document| {
                (
                    paths.source_name(document.uri()),
                    document.content().to_string(),
                )
            })
            .collect();

        self.engine.set_sources(sources.clone());
        self.engine.set_remappings(config.remappings.clone());
        self.apply_target_version(config, client);

        let mut reader = FileReader::new(store, paths, config);
        let output = self.engine.compile(&mut reader);
        let (loaded, failures) = reader.into_parts();

        info!(
            "Compiled {} sources ({} read on demand): {} units, {} diagnostics",
            sources.len(),
            loaded.len(),
            output.units.len(),
            output.diagnostics.len()
        );
        client.trace(
            format!("Compiled {} source units", output.units.len()),
            Some(sources.keys().cloned().collect::<Vec<_>>().join(", ")),
        );

        let mut all_sources = sources;
        all_sources.extend(loaded);

        let mut snapshot = ProgramSnapshot::new(output, all_sources);
        synthesize_read_failures(&mut snapshot, &failures);
        report_unlocated(&snapshot, client);

        self.snapshot.insert(snapshot)
    }

    /// Compiles and publishes the diagnostics of a single document
    pub fn validate(&mut self, uri: &Url, inputs: CompileInputs<'_>, client: &mut Client) {
        let source_name = inputs.paths.source_name(uri);
        let version = inputs.store.get(uri).and_then(|document| document.version());
        let engine_name = self.engine.name().to_string();

        let snapshot = self.compile(inputs, client);
        let mut grouped = group_by_source(snapshot, inputs.paths, &engine_name);
        let diagnostics = grouped.remove(&source_name).unwrap_or_default();

        self.publish(uri.clone(), version, diagnostics, client);
    }

    /// Compiles once and publishes diagnostics for every tracked document and
    /// every other source the engine reported on, clearing documents that had
    /// diagnostics before and have none now
    pub fn validate_all(&mut self, inputs: CompileInputs<'_>, client: &mut Client) {
        let engine_name = self.engine.name().to_string();

        let snapshot = self.compile(inputs, client);
        let mut grouped = group_by_source(snapshot, inputs.paths, &engine_name);

        // document URI -> source unit name
        let mut targets: IndexMap<Url, String> = inputs
            .store
            .documents()
            .map(|document| {
                let uri = document.uri().clone();
                let source_name = inputs.paths.source_name(&uri);
                (uri, source_name)
            })
            .collect();

        let mut reported: Vec<&String> = grouped.keys().collect();
        reported.sort();
        for source_name in reported {
            match inputs.paths.uri(source_name) {
                Some(uri) => {
                    targets.entry(uri).or_insert_with(|| source_name.clone());
                }
                None => debug!("No document URI for {}", source_name),
            }
        }

        for uri in &self.published {
            targets
                .entry(uri.clone())
                .or_insert_with(|| inputs.paths.source_name(uri));
        }

        for (uri, source_name) in targets {
            let diagnostics = grouped.remove(&source_name).unwrap_or_default();
            let version = inputs.store.get(&uri).and_then(|document| document.version());
            self.publish(uri, version, diagnostics, client);
        }
    }

    /// Publishes an empty diagnostic list for `uri`
    pub fn clear(&mut self, uri: &Url, client: &mut Client) {
        self.publish(uri.clone(), None, Vec::new(), client);
    }

    fn publish(
        &mut self,
        uri: Url,
        version: Option<i32>,
        diagnostics: Vec<Diagnostic>,
        client: &mut Client,
    ) {
        debug!("Publishing {} diagnostics for {}", diagnostics.len(), uri);

        if diagnostics.is_empty() {
            self.published.remove(&uri);
        } else {
            self.published.insert(uri.clone());
        }

        client.publish_diagnostics(uri, version, diagnostics);
    }

    fn apply_target_version(&mut self, config: &WorkspaceConfig, client: &mut Client) {
        let Some(version) = &config.target_version else {
            return;
        };
        if self.requested_target_version.as_ref() == Some(version) {
            return;
        }

        self.requested_target_version = Some(version.clone());
        if let Err(e) = self.engine.set_target_version(version) {
            warn!("Ignoring configured target version: {}", e);
            client.log_message(MessageType::WARNING, e.to_string());
        }
    }
}

/// Converts every located diagnostic and groups them by source unit name
fn group_by_source(
    snapshot: &ProgramSnapshot,
    paths: &SourcePaths,
    engine_name: &str,
) -> HashMap<String, Vec<Diagnostic>> {
    let mut grouped: HashMap<String, Vec<Diagnostic>> = HashMap::new();

    for diagnostic in snapshot.diagnostics() {
        let Some(location) = &diagnostic.location else {
            continue;
        };
        if let Some(converted) = diagnostics::to_lsp(diagnostic, snapshot, paths, engine_name) {
            grouped
                .entry(location.source_name.clone())
                .or_default()
                .push(converted);
        }
    }

    grouped
}

/// Adds an error at every import whose target could not be read, unless the
/// engine already reported something at that import
fn synthesize_read_failures(snapshot: &mut ProgramSnapshot, failures: &[ReadFailure]) {
    if failures.is_empty() {
        return;
    }

    let mut synthesized = Vec::new();
    for unit in snapshot.units() {
        for node in unit.root.descendants() {
            let NodeKind::Import { source_name, .. } = &node.kind else {
                continue;
            };
            let Some(failure) = failures.iter().find(|f| &f.source_name == source_name) else {
                continue;
            };

            let location = SourceLocation::new(unit.source_name.clone(), node.span);
            let already_reported = snapshot
                .diagnostics()
                .iter()
                .any(|d| d.location.as_ref() == Some(&location));

            if !already_reported {
                synthesized.push(EngineDiagnostic::error(
                    format!("Source \"{}\" not found: {}", source_name, failure.reason),
                    Some(location),
                ));
            }
        }
    }

    for diagnostic in synthesized {
        snapshot.push_diagnostic(diagnostic);
    }
}

/// Forwards diagnostics that have no source location as log messages
fn report_unlocated(snapshot: &ProgramSnapshot, client: &mut Client) {
    for diagnostic in snapshot.diagnostics() {
        if diagnostic.location.is_some() {
            continue;
        }
        let typ = match diagnostic.severity {
            Severity::Error => MessageType::ERROR,
            Severity::Warning => MessageType::WARNING,
            Severity::Info => MessageType::INFO,
            Severity::Hint => MessageType::LOG,
        };
        client.log_message(typ, diagnostic.message.clone());
    }
}

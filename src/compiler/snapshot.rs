//! Result of one whole-program compilation

use std::collections::{BTreeMap, HashMap};

use indexmap::IndexMap;
use tower_lsp::lsp_types::{Position, Range};

use crate::compiler::engine::{
    CompilerOutput, DeclarationId, EngineDiagnostic, NodeKind, SourceUnit, Span,
};
use crate::vfs::LineIndex;

/// Source text the engine compiled, with its line index
#[derive(Debug, Clone)]
pub struct SourceText {
    text: String,
    index: LineIndex,
}

impl SourceText {
    pub fn new(text: String) -> Self {
        let index = LineIndex::new(&text);
        Self { text, index }
    }

    pub fn offset(&self, position: Position) -> Option<usize> {
        self.index.offset(&self.text, position)
    }

    pub fn range(&self, span: Span) -> Range {
        self.index.range(&self.text, span.start, span.end)
    }
}

/// Where a declaration's name is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationSite {
    pub source_name: String,
    pub name: String,
    pub name_span: Span,
}

#[derive(Debug, Default)]
pub struct ProgramSnapshot {
    units: IndexMap<String, SourceUnit>,
    sources: HashMap<String, SourceText>,
    declarations: HashMap<DeclarationId, DeclarationSite>,
    diagnostics: Vec<EngineDiagnostic>,
}

impl ProgramSnapshot {
    /// Indexes compiler output against the sources it was produced from
    pub fn new(output: CompilerOutput, sources: BTreeMap<String, String>) -> Self {
        let mut declarations = HashMap::new();

        for unit in &output.units {
            for node in unit.root.descendants() {
                if let NodeKind::Declaration { id, name, name_span } = &node.kind {
                    declarations.insert(
                        *id,
                        DeclarationSite {
                            source_name: unit.source_name.clone(),
                            name: name.clone(),
                            name_span: *name_span,
                        },
                    );
                }
            }
        }

        Self {
            units: output
                .units
                .into_iter()
                .map(|unit| (unit.source_name.clone(), unit))
                .collect(),
            sources: sources
                .into_iter()
                .map(|(name, text)| (name, SourceText::new(text)))
                .collect(),
            declarations,
            diagnostics: output.diagnostics,
        }
    }

    pub fn unit(&self, source_name: &str) -> Option<&SourceUnit> {
        self.units.get(source_name)
    }

    /// Every compiled unit, in the order the engine reported them
    pub fn units(&self) -> impl Iterator<Item = &SourceUnit> {
        self.units.values()
    }

    pub fn source(&self, source_name: &str) -> Option<&SourceText> {
        self.sources.get(source_name)
    }

    pub fn declaration(&self, id: DeclarationId) -> Option<&DeclarationSite> {
        self.declarations.get(&id)
    }

    pub fn diagnostics(&self) -> &[EngineDiagnostic] {
        &self.diagnostics
    }

    pub(crate) fn push_diagnostic(&mut self, diagnostic: EngineDiagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Converts a span of `source_name` to an LSP range
    pub fn range(&self, source_name: &str, span: Span) -> Option<Range> {
        self.source(source_name).map(|source| source.range(span))
    }
}

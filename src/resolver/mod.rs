//! Symbol Resolver
//!
//! Answers navigation queries against the latest compiled program. Symbols are
//! matched by declaration identity, so shadowed names are never conflated.
//! - locate.rs: position -> node -> declaration
//! - references.rs: occurrence walk for one declaration

pub mod locate;
pub mod references;

use tower_lsp::lsp_types::{DocumentHighlight, DocumentHighlightKind, Location, Position, Range, Url};
use tracing::debug;

use crate::compiler::engine::{AstNode, DeclarationId, NodeKind};
use crate::compiler::paths::SourcePaths;
use crate::compiler::snapshot::ProgramSnapshot;

/// One place a declaration is named
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub source_name: String,
    pub range: Range,
    pub kind: DocumentHighlightKind,
}

pub struct SymbolResolver<'a> {
    snapshot: &'a ProgramSnapshot,
    paths: &'a SourcePaths,
}

impl<'a> SymbolResolver<'a> {
    pub fn new(snapshot: &'a ProgramSnapshot, paths: &'a SourcePaths) -> Self {
        Self { snapshot, paths }
    }

    /// Innermost node at `position` in `source_name`, with the byte offset the
    /// position translated to
    pub fn find_node(&self, position: Position, source_name: &str) -> Option<(&'a AstNode, usize)> {
        let offset = self.snapshot.source(source_name)?.offset(position)?;
        let unit = self.snapshot.unit(source_name)?;
        locate::find_node(&unit.root, offset).map(|node| (node, offset))
    }

    pub fn resolve_declaration(&self, node: &AstNode, offset: usize) -> Option<DeclarationId> {
        locate::resolve_declaration(node, offset)
    }

    /// Declaration referenced at `position` of `uri`
    pub fn declaration_at(&self, uri: &Url, position: Position) -> Option<DeclarationId> {
        let source_name = self.paths.source_name(uri);
        let (node, offset) = self.find_node(position, &source_name)?;
        self.resolve_declaration(node, offset)
    }

    pub fn goto_definition(&self, uri: &Url, position: Position) -> Vec<Location> {
        let source_name = self.paths.source_name(uri);
        let Some((node, offset)) = self.find_node(position, &source_name) else {
            return Vec::new();
        };

        if let NodeKind::Import { source_name, .. } = &node.kind {
            return self
                .paths
                .uri(source_name)
                .map(|uri| Location::new(uri, Range::default()))
                .into_iter()
                .collect();
        }

        let Some(id) = self.resolve_declaration(node, offset) else {
            debug!("No declaration at {}:{:?}", uri, position);
            return Vec::new();
        };

        self.declaration_location(id).into_iter().collect()
    }

    /// Every occurrence of the symbol at `position` across all compiled units
    pub fn references(&self, uri: &Url, position: Position, include_declaration: bool) -> Vec<Location> {
        let Some(id) = self.declaration_at(uri, position) else {
            return Vec::new();
        };

        self.occurrences(id, None)
            .into_iter()
            .filter(|occurrence| include_declaration || occurrence.kind != DocumentHighlightKind::TEXT)
            .filter_map(|occurrence| {
                Some(Location::new(
                    self.paths.uri(&occurrence.source_name)?,
                    occurrence.range,
                ))
            })
            .collect()
    }

    /// Occurrences of the symbol at `position`, restricted to the same document
    pub fn semantic_highlight(&self, uri: &Url, position: Position) -> Vec<DocumentHighlight> {
        let Some(id) = self.declaration_at(uri, position) else {
            return Vec::new();
        };

        let source_name = self.paths.source_name(uri);
        self.occurrences(id, Some(&source_name))
            .into_iter()
            .map(|occurrence| DocumentHighlight {
                range: occurrence.range,
                kind: Some(occurrence.kind),
            })
            .collect()
    }

    /// Occurrences of `target`, in every unit or only in `only_source`, sorted
    /// by source and position
    pub fn occurrences(&self, target: DeclarationId, only_source: Option<&str>) -> Vec<Occurrence> {
        let mut occurrences: Vec<Occurrence> = self
            .snapshot
            .units()
            .filter(|unit| only_source.is_none_or(|name| unit.source_name == name))
            .flat_map(|unit| {
                references::collect(&unit.root, target)
                    .into_iter()
                    .filter_map(|(span, kind)| {
                        Some(Occurrence {
                            source_name: unit.source_name.clone(),
                            range: self.snapshot.range(&unit.source_name, span)?,
                            kind,
                        })
                    })
            })
            .collect();

        occurrences.sort_by(|a, b| {
            (&a.source_name, a.range.start.line, a.range.start.character).cmp(&(
                &b.source_name,
                b.range.start.line,
                b.range.start.character,
            ))
        });
        occurrences.dedup_by(|a, b| a.source_name == b.source_name && a.range == b.range);
        occurrences
    }

    fn declaration_location(&self, id: DeclarationId) -> Option<Location> {
        let site = self.snapshot.declaration(id)?;
        Some(Location::new(
            self.paths.uri(&site.source_name)?,
            self.snapshot.range(&site.source_name, site.name_span)?,
        ))
    }
}

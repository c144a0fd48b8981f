//! Compiler Engine collaborator interface
//!
//! The engine owns parsing, name resolution and type checking. This crate only
//! hands it a source map and reads back syntax trees and diagnostics.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::config::Remapping;

/// Read kind requested for ordinary source files
pub const READ_KIND_SOURCE: &str = "source";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("Unsupported target version: {0}")]
    UnsupportedTargetVersion(String),
}

/// Opaque handle of a declaration, stable for one compilation run.
///
/// Identity comparisons between occurrences always go through this handle,
/// never through names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclarationId(pub u64);

/// Byte span in a source unit, end-exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Span inside a named source unit
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub source_name: String,
    pub span: Span,
}

impl SourceLocation {
    pub fn new(source_name: impl Into<String>, span: Span) -> Self {
        Self {
            source_name: source_name.into(),
            span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    SourceUnit,
    /// A named binding site
    Declaration {
        id: DeclarationId,
        name: String,
        name_span: Span,
    },
    /// A name use, bound to a declaration when resolution succeeded
    Identifier {
        name: String,
        declaration: Option<DeclarationId>,
    },
    /// `base.member`; the base expression is the first child
    MemberAccess {
        member: String,
        member_span: Span,
        declaration: Option<DeclarationId>,
    },
    /// The first child is the assignment target
    Assignment,
    /// `base[index]`; the base expression is the first child
    IndexAccess,
    /// An import directive; `source_name` is the unit it resolved to
    Import { path: String, source_name: String },
    /// Any other syntax node
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AstNode {
    pub kind: NodeKind,
    pub span: Span,
    pub children: Vec<AstNode>,
}

impl AstNode {
    pub fn new(kind: NodeKind, span: Span) -> Self {
        Self {
            kind,
            span,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<AstNode>) -> Self {
        self.children = children;
        self
    }

    /// Pre-order traversal of this node and everything below it
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }
}

/// Iterator returned by [`AstNode::descendants`]
pub struct Descendants<'a> {
    stack: Vec<&'a AstNode>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a AstNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Syntax tree of one compiled source unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    pub source_name: String,
    pub root: AstNode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineTag {
    Unnecessary,
    Deprecated,
}

/// A diagnostic as reported by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineDiagnostic {
    pub severity: Severity,
    pub code: Option<u64>,
    pub message: String,
    /// Primary location; `None` for whole-program problems
    pub location: Option<SourceLocation>,
    /// Secondary locations with their explanations
    pub secondary: Vec<(String, SourceLocation)>,
    pub tags: Vec<EngineTag>,
}

impl EngineDiagnostic {
    pub fn error(message: impl Into<String>, location: Option<SourceLocation>) -> Self {
        Self {
            severity: Severity::Error,
            code: None,
            message: message.into(),
            location,
            secondary: Vec::new(),
            tags: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompilerOutput {
    pub units: Vec<SourceUnit>,
    pub diagnostics: Vec<EngineDiagnostic>,
}

/// On-demand file access for sources missing from the source map
pub trait ReadCallback {
    /// Returns the content of `path`, or a human-readable reason why it cannot be read
    fn read_file(&mut self, kind: &str, path: &str) -> Result<String, String>;
}

/// The compiler engine driven by the orchestrator
pub trait CompilerEngine {
    /// Short name used as the `source` of published diagnostics
    fn name(&self) -> &str;

    fn version(&self) -> String;

    /// Replaces the whole source map, keyed by source unit name
    fn set_sources(&mut self, sources: BTreeMap<String, String>);

    fn set_remappings(&mut self, remappings: Vec<Remapping>);

    fn set_target_version(&mut self, version: &str) -> Result<(), EngineError>;

    /// Compiles the current source map as a whole program
    fn compile(&mut self, reader: &mut dyn ReadCallback) -> CompilerOutput;
}

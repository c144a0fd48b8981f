//! A tiny compiler used to drive the server end to end.
//!
//! ```text
//! import "other.toy";
//! let x = 1;
//! fn f() {
//!     x = x + 1;
//!     let x = true;
//!     x;
//! }
//! ```
//!
//! Top-level `let` and `fn` names are visible in the whole unit and in units
//! importing it. Block-level `let` shadows from its statement on. `+` only
//! accepts integers and assignments must keep the type of their target.

use std::collections::{BTreeMap, HashMap};

use compiler_lsp::compiler::engine::{
    AstNode, CompilerEngine, CompilerOutput, DeclarationId, EngineDiagnostic, EngineError,
    NodeKind, READ_KIND_SOURCE, ReadCallback, SourceLocation, SourceUnit, Span,
};
use compiler_lsp::config::{Remapping, WorkspaceConfig};

pub const SUPPORTED_TARGETS: [&str; 2] = ["v1", "v2"];

#[derive(Debug, Default)]
pub struct ToyEngine {
    sources: BTreeMap<String, String>,
    config: WorkspaceConfig,
    target_version: Option<String>,
    pub compiles: usize,
}

impl ToyEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target_version(&self) -> Option<&str> {
        self.target_version.as_deref()
    }

    fn resolve_import(&self, importer: &str, path: &str) -> String {
        self.config.remap(importer, path)
    }
}

impl CompilerEngine for ToyEngine {
    fn name(&self) -> &str {
        "toyc"
    }

    fn version(&self) -> String {
        "0.3.0".to_string()
    }

    fn set_sources(&mut self, sources: BTreeMap<String, String>) {
        self.sources = sources;
    }

    fn set_remappings(&mut self, remappings: Vec<Remapping>) {
        self.config.remappings = remappings;
    }

    fn set_target_version(&mut self, version: &str) -> Result<(), EngineError> {
        if !SUPPORTED_TARGETS.contains(&version) {
            return Err(EngineError::UnsupportedTargetVersion(version.to_string()));
        }
        self.target_version = Some(version.to_string());
        Ok(())
    }

    fn compile(&mut self, reader: &mut dyn ReadCallback) -> CompilerOutput {
        self.compiles += 1;

        let mut sources = self.sources.clone();
        let mut parsed: BTreeMap<String, Vec<Stmt>> = BTreeMap::new();
        let mut diagnostics = Vec::new();
        let mut pending: Vec<String> = sources.keys().rev().cloned().collect();

        while let Some(name) = pending.pop() {
            if parsed.contains_key(&name) {
                continue;
            }
            let Some(text) = sources.get(&name) else {
                continue;
            };

            let stmts = match parse(text) {
                Ok(stmts) => stmts,
                Err((message, span)) => {
                    diagnostics.push(EngineDiagnostic::error(
                        message,
                        Some(SourceLocation::new(name.clone(), span)),
                    ));
                    continue;
                }
            };

            for stmt in &stmts {
                let Stmt::Import { path, .. } = stmt else {
                    continue;
                };
                let target = self.resolve_import(&name, path);
                if sources.contains_key(&target) {
                    continue;
                }
                // failures are reported at the import by the caller
                if let Ok(content) = reader.read_file(READ_KIND_SOURCE, &target) {
                    sources.insert(target.clone(), content);
                    pending.push(target);
                }
            }

            parsed.insert(name, stmts);
        }

        let mut next_id = 1;
        let mut globals: BTreeMap<&str, Vec<(String, DeclarationId)>> = BTreeMap::new();
        for (name, stmts) in &parsed {
            let declared = stmts
                .iter()
                .filter_map(|stmt| match stmt {
                    Stmt::Let { name, .. } | Stmt::Fn { name, .. } => Some(name.clone()),
                    _ => None,
                })
                .map(|name| {
                    let id = DeclarationId(next_id);
                    next_id += 1;
                    (name, id)
                })
                .collect();
            globals.insert(name.as_str(), declared);
        }

        let mut types = HashMap::new();
        let mut units = Vec::new();
        for (name, stmts) in &parsed {
            let own = globals.get(name.as_str()).cloned().unwrap_or_default();

            let mut visible = HashMap::new();
            for stmt in stmts {
                if let Stmt::Import { path, .. } = stmt {
                    let target = self.resolve_import(name, path);
                    for (global, id) in globals.get(target.as_str()).into_iter().flatten() {
                        visible.insert(global.clone(), *id);
                    }
                }
            }
            visible.extend(own.iter().cloned());

            let mut lowering = Lowering {
                unit: name,
                config: &self.config,
                scopes: vec![visible],
                global_ids: own.into_iter().map(|(_, id)| id).collect::<Vec<_>>().into_iter(),
                next_id: &mut next_id,
                types: &mut types,
                diagnostics: &mut diagnostics,
            };
            let children: Vec<AstNode> = stmts.iter().map(|stmt| lowering.stmt(stmt, true)).collect();

            let len = sources.get(name).map_or(0, String::len);
            units.push(SourceUnit {
                source_name: name.clone(),
                root: AstNode::new(NodeKind::SourceUnit, Span::new(0, len)).with_children(children),
            });
        }

        CompilerOutput { units, diagnostics }
    }
}

#[derive(Debug, Clone)]
enum Expr {
    Int(Span),
    Bool(Span),
    Name(String, Span),
    Add(Box<Expr>, Box<Expr>, Span),
}

impl Expr {
    fn span(&self) -> Span {
        match self {
            Expr::Int(span) | Expr::Bool(span) | Expr::Name(_, span) | Expr::Add(_, _, span) => {
                *span
            }
        }
    }
}

#[derive(Debug, Clone)]
enum Stmt {
    Import {
        path: String,
        span: Span,
    },
    Let {
        name: String,
        name_span: Span,
        value: Expr,
        span: Span,
    },
    Fn {
        name: String,
        name_span: Span,
        body: Vec<Stmt>,
        body_span: Span,
        span: Span,
    },
    Assign {
        target: String,
        target_span: Span,
        value: Expr,
        span: Span,
    },
    Expr {
        expr: Expr,
        span: Span,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Int,
    Str(String),
    Sym(char),
    Eof,
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    span: Span,
}

type ParseResult<T> = Result<T, (String, Span)>;

fn lex(text: &str) -> ParseResult<Vec<Token>> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;

        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if c == b'/' && bytes.get(i + 1) == Some(&b'/') {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }
        if c == b'/' && bytes.get(i + 1) == Some(&b'*') {
            i += 2;
            while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                i += 1;
            }
            if i >= bytes.len() {
                return Err(("Unterminated comment".to_string(), Span::new(start, bytes.len())));
            }
            i += 2;
            continue;
        }

        let tok = if c.is_ascii_digit() {
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            Tok::Int
        } else if c.is_ascii_alphabetic() || c == b'_' {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            Tok::Ident(text[start..i].to_string())
        } else if c == b'"' {
            i += 1;
            while i < bytes.len() && bytes[i] != b'"' {
                i += 1;
            }
            if i == bytes.len() {
                return Err(("Unterminated string".to_string(), Span::new(start, i)));
            }
            i += 1;
            Tok::Str(text[start + 1..i - 1].to_string())
        } else if b";=+(){}".contains(&c) {
            i += 1;
            Tok::Sym(c as char)
        } else {
            let width = text[start..].chars().next().map_or(1, char::len_utf8);
            return Err(("Invalid character".to_string(), Span::new(start, start + width)));
        };

        tokens.push(Token {
            tok,
            span: Span::new(start, i),
        });
    }

    tokens.push(Token {
        tok: Tok::Eof,
        span: Span::new(text.len(), text.len()),
    });
    Ok(tokens)
}

fn parse(text: &str) -> ParseResult<Vec<Stmt>> {
    let tokens = lex(text)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
    };
    parser.stmts(true)
}

fn is_keyword(name: &str) -> bool {
    matches!(name, "let" | "fn" | "import" | "true" | "false")
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Parser<'t> {
    fn peek(&self) -> &'t Token {
        let tokens = self.tokens;
        &tokens[self.pos]
    }

    fn bump(&mut self) -> &'t Token {
        let token = self.peek();
        if token.tok != Tok::Eof {
            self.pos += 1;
        }
        token
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(&self.peek().tok, Tok::Ident(name) if name == keyword)
    }

    fn expect_sym(&mut self, sym: char) -> ParseResult<Span> {
        let token = self.bump();
        if token.tok == Tok::Sym(sym) {
            Ok(token.span)
        } else {
            Err((format!("Expected '{}'", sym), token.span))
        }
    }

    fn expect_ident(&mut self) -> ParseResult<(String, Span)> {
        let token = self.bump();
        match &token.tok {
            Tok::Ident(name) if !is_keyword(name) => Ok((name.clone(), token.span)),
            _ => Err(("Expected identifier".to_string(), token.span)),
        }
    }

    fn stmts(&mut self, top_level: bool) -> ParseResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        loop {
            match &self.peek().tok {
                Tok::Eof if top_level => break,
                Tok::Eof => return Err(("Expected '}'".to_string(), self.peek().span)),
                Tok::Sym('}') if !top_level => break,
                _ => stmts.push(self.stmt(top_level)?),
            }
        }
        Ok(stmts)
    }

    fn stmt(&mut self, top_level: bool) -> ParseResult<Stmt> {
        let start = self.peek().span.start;

        if self.at_keyword("import") {
            let keyword = self.bump();
            if !top_level {
                return Err(("Imports are only allowed at top level".to_string(), keyword.span));
            }
            let token = self.bump();
            let Tok::Str(path) = &token.tok else {
                return Err(("Expected import path".to_string(), token.span));
            };
            let end = self.expect_sym(';')?.end;
            return Ok(Stmt::Import {
                path: path.clone(),
                span: Span::new(start, end),
            });
        }

        if self.at_keyword("let") {
            self.bump();
            let (name, name_span) = self.expect_ident()?;
            self.expect_sym('=')?;
            let value = self.expr()?;
            let end = self.expect_sym(';')?.end;
            return Ok(Stmt::Let {
                name,
                name_span,
                value,
                span: Span::new(start, end),
            });
        }

        if self.at_keyword("fn") {
            let keyword = self.bump();
            if !top_level {
                return Err(("Functions are only allowed at top level".to_string(), keyword.span));
            }
            let (name, name_span) = self.expect_ident()?;
            self.expect_sym('(')?;
            self.expect_sym(')')?;
            let open = self.expect_sym('{')?;
            let body = self.stmts(false)?;
            let close = self.expect_sym('}')?;
            return Ok(Stmt::Fn {
                name,
                name_span,
                body,
                body_span: Span::new(open.start, close.end),
                span: Span::new(start, close.end),
            });
        }

        let expr = self.expr()?;
        if self.peek().tok == Tok::Sym('=') {
            self.bump();
            let span = expr.span();
            let Expr::Name(target, target_span) = expr else {
                return Err(("Invalid assignment target".to_string(), span));
            };
            let value = self.expr()?;
            let end = self.expect_sym(';')?.end;
            return Ok(Stmt::Assign {
                target,
                target_span,
                value,
                span: Span::new(start, end),
            });
        }

        let end = self.expect_sym(';')?.end;
        Ok(Stmt::Expr {
            expr,
            span: Span::new(start, end),
        })
    }

    fn expr(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.term()?;
        while self.peek().tok == Tok::Sym('+') {
            self.bump();
            let rhs = self.term()?;
            let span = Span::new(lhs.span().start, rhs.span().end);
            lhs = Expr::Add(Box::new(lhs), Box::new(rhs), span);
        }
        Ok(lhs)
    }

    fn term(&mut self) -> ParseResult<Expr> {
        let token = self.bump();
        match &token.tok {
            Tok::Int => Ok(Expr::Int(token.span)),
            Tok::Ident(name) if name == "true" || name == "false" => Ok(Expr::Bool(token.span)),
            Tok::Ident(name) if !is_keyword(name) => Ok(Expr::Name(name.clone(), token.span)),
            Tok::Sym('(') => {
                let inner = self.expr()?;
                self.expect_sym(')')?;
                Ok(inner)
            }
            _ => Err(("Expected expression".to_string(), token.span)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Type {
    Int,
    Bool,
    Function,
    Unknown,
}

impl Type {
    fn name(self) -> &'static str {
        match self {
            Type::Int => "int",
            Type::Bool => "bool",
            Type::Function => "function",
            Type::Unknown => "unknown",
        }
    }
}

/// Name resolution and type checking of one parsed unit
struct Lowering<'a> {
    unit: &'a str,
    config: &'a WorkspaceConfig,
    scopes: Vec<HashMap<String, DeclarationId>>,
    global_ids: std::vec::IntoIter<DeclarationId>,
    next_id: &'a mut u64,
    types: &'a mut HashMap<DeclarationId, Type>,
    diagnostics: &'a mut Vec<EngineDiagnostic>,
}

impl Lowering<'_> {
    fn error(&mut self, message: impl Into<String>, span: Span) {
        self.diagnostics.push(EngineDiagnostic::error(
            message,
            Some(SourceLocation::new(self.unit, span)),
        ));
    }

    fn declare(&mut self, name: &str, top_level: bool) -> DeclarationId {
        if top_level {
            if let Some(id) = self.global_ids.next() {
                return id;
            }
        }

        let id = DeclarationId(*self.next_id);
        *self.next_id += 1;
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), id);
        }
        id
    }

    fn declaration(id: DeclarationId, name: &str, name_span: Span, span: Span) -> AstNode {
        AstNode::new(
            NodeKind::Declaration {
                id,
                name: name.to_string(),
                name_span,
            },
            span,
        )
    }

    fn stmt(&mut self, stmt: &Stmt, top_level: bool) -> AstNode {
        match stmt {
            Stmt::Import { path, span } => AstNode::new(
                NodeKind::Import {
                    path: path.clone(),
                    source_name: self.config.remap(self.unit, path),
                },
                *span,
            ),
            Stmt::Let {
                name,
                name_span,
                value,
                span,
            } => {
                let (value, value_type) = self.expr(value);
                let id = self.declare(name, top_level);
                self.types.insert(id, value_type);
                Self::declaration(id, name, *name_span, *span).with_children(vec![value])
            }
            Stmt::Fn {
                name,
                name_span,
                body,
                body_span,
                span,
            } => {
                let id = self.declare(name, top_level);
                self.types.insert(id, Type::Function);

                self.scopes.push(HashMap::new());
                let children: Vec<AstNode> = body.iter().map(|stmt| self.stmt(stmt, false)).collect();
                self.scopes.pop();

                let block = AstNode::new(NodeKind::Other("Block".to_string()), *body_span)
                    .with_children(children);
                Self::declaration(id, name, *name_span, *span).with_children(vec![block])
            }
            Stmt::Assign {
                target,
                target_span,
                value,
                span,
            } => {
                let (target_node, target_type) = self.name(target, *target_span);
                let (value_node, value_type) = self.expr(value);
                let known = |ty| matches!(ty, Type::Int | Type::Bool);
                if known(target_type) && known(value_type) && target_type != value_type {
                    self.error(
                        format!(
                            "Type {} is not implicitly convertible to expected type {}.",
                            value_type.name(),
                            target_type.name()
                        ),
                        value.span(),
                    );
                }
                AstNode::new(NodeKind::Assignment, *span).with_children(vec![target_node, value_node])
            }
            Stmt::Expr { expr, span } => {
                let (node, _) = self.expr(expr);
                AstNode::new(NodeKind::Other("ExpressionStatement".to_string()), *span)
                    .with_children(vec![node])
            }
        }
    }

    fn name(&mut self, name: &str, span: Span) -> (AstNode, Type) {
        let declaration = self
            .scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied());

        let ty = match declaration {
            Some(id) => self.types.get(&id).copied().unwrap_or(Type::Unknown),
            None => {
                self.error("Undeclared identifier.", span);
                Type::Unknown
            }
        };

        let node = AstNode::new(
            NodeKind::Identifier {
                name: name.to_string(),
                declaration,
            },
            span,
        );
        (node, ty)
    }

    fn expr(&mut self, expr: &Expr) -> (AstNode, Type) {
        match expr {
            Expr::Int(span) => (literal(*span), Type::Int),
            Expr::Bool(span) => (literal(*span), Type::Bool),
            Expr::Name(name, span) => self.name(name, *span),
            Expr::Add(lhs, rhs, span) => {
                let (lhs_node, lhs_type) = self.expr(lhs);
                let (rhs_node, rhs_type) = self.expr(rhs);
                for (ty, operand) in [(lhs_type, lhs), (rhs_type, rhs)] {
                    if matches!(ty, Type::Bool | Type::Function) {
                        self.error(
                            format!("Operator + not compatible with type {}.", ty.name()),
                            operand.span(),
                        );
                    }
                }
                let node = AstNode::new(NodeKind::Other("BinaryOperation".to_string()), *span)
                    .with_children(vec![lhs_node, rhs_node]);
                (node, Type::Int)
            }
        }
    }
}

fn literal(span: Span) -> AstNode {
    AstNode::new(NodeKind::Other("Literal".to_string()), span)
}

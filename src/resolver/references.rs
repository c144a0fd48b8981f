//! Occurrence collection by declaration identity

use tower_lsp::lsp_types::DocumentHighlightKind;

use crate::compiler::engine::{AstNode, DeclarationId, NodeKind, Span};

/// Syntactic role of an expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Write,
}

impl Access {
    fn highlight_kind(self) -> DocumentHighlightKind {
        match self {
            Access::Read => DocumentHighlightKind::READ,
            Access::Write => DocumentHighlightKind::WRITE,
        }
    }
}

/// Role of the `index`-th child of `node`, given the role of `node` itself
fn child_access(node: &AstNode, access: Access, index: usize) -> Access {
    match node.kind {
        NodeKind::Assignment if index == 0 => Access::Write,
        NodeKind::IndexAccess | NodeKind::MemberAccess { .. } if index == 0 => access,
        _ => Access::Read,
    }
}

/// Every span in `root` that names `target`: its declaration site as `Text`,
/// uses as `Read` or `Write`.
pub fn collect(root: &AstNode, target: DeclarationId) -> Vec<(Span, DocumentHighlightKind)> {
    let mut found = Vec::new();
    let mut stack = vec![(root, Access::Read)];

    while let Some((node, access)) = stack.pop() {
        match &node.kind {
            NodeKind::Declaration { id, name_span, .. } if *id == target => {
                found.push((*name_span, DocumentHighlightKind::TEXT));
            }
            NodeKind::Identifier {
                declaration: Some(id),
                ..
            } if *id == target => {
                found.push((node.span, access.highlight_kind()));
            }
            NodeKind::MemberAccess {
                declaration: Some(id),
                member_span,
                ..
            } if *id == target => {
                found.push((*member_span, access.highlight_kind()));
            }
            _ => {}
        }

        stack.extend(
            node.children
                .iter()
                .enumerate()
                .rev()
                .map(|(index, child)| (child, child_access(node, access, index))),
        );
    }

    found
}

//! Position to syntax node resolution

use crate::compiler::engine::{AstNode, DeclarationId, NodeKind};

/// Innermost node whose span contains `offset`.
///
/// Descends one level at a time, preferring the smallest containing child and
/// the earlier one on ties.
pub fn find_node(root: &AstNode, offset: usize) -> Option<&AstNode> {
    if !root.span.contains(offset) {
        return None;
    }

    let mut current = root;
    while let Some(child) = current
        .children
        .iter()
        .filter(|child| child.span.contains(offset))
        .min_by_key(|child| child.span.len())
    {
        current = child;
    }

    Some(current)
}

/// Declaration bound by `node` at `offset`.
///
/// Declarations resolve to themselves only when `offset` is on their name, so a
/// cursor inside a function header does not select the whole function.
pub fn resolve_declaration(node: &AstNode, offset: usize) -> Option<DeclarationId> {
    match &node.kind {
        NodeKind::Identifier { declaration, .. } => *declaration,
        NodeKind::MemberAccess {
            member_span,
            declaration,
            ..
        } if member_span.contains(offset) => *declaration,
        NodeKind::Declaration { id, name_span, .. } if name_span.contains(offset) => Some(*id),
        _ => None,
    }
}

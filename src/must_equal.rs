// Copyright 2025 StrongDM Inc
// SPDX-License-Identifier: Apache-2.0

//! Determining the values a field is required to equal.

use crate::ast::Node;

/// Returns the values that `field` must match for equality at the top level
/// of the tree, or an empty vector if no such constraint is guaranteed.
///
/// Useful e.g. for checking whether a filter pins a field that corresponds
/// to a search index, making it possible to reduce the set of indexes to
/// query.
pub fn has_must_equal(ast: &Node, field: &str) -> Vec<String> {
    match ast {
        // non-`is` conjuncts cannot weaken an equality that another conjunct
        // guarantees, so they are skipped
        Node::And { nodes } => nodes
            .iter()
            .filter(|node| matches!(node, Node::Is { .. }))
            .flat_map(|node| is_values(node, field))
            .collect(),
        // a disjunction only guarantees equality when every branch does
        Node::Or { nodes } => {
            let mut values = Vec::new();
            for node in nodes {
                if !matches!(node, Node::Is { .. }) {
                    return Vec::new();
                }
                let branch = is_values(node, field);
                if branch.is_empty() {
                    return Vec::new();
                }
                values.extend(branch);
            }
            values
        }
        Node::Is { .. } => is_values(ast, field),
        _ => Vec::new(),
    }
}

fn is_values(node: &Node, field: &str) -> Vec<String> {
    let Node::Is { identifier, value } = node else {
        return Vec::new();
    };
    if identifier != field {
        return Vec::new();
    }
    match value.as_ref() {
        Node::Literal { value } => vec![value.clone()],
        Node::Or { nodes } => nodes
            .iter()
            .filter_map(|node| match node {
                Node::Literal { value } => Some(value.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

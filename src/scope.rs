//! Names visible at a source position.

use indexmap::IndexSet;
use serde::Serialize;

use crate::source::Position;
use crate::syntax::{ScopeNode, ScopeTree};

/// Identifier names in scope-chain order, outermost scope first.
///
/// A name declared in several enclosing scopes appears once, at the place
/// of its outermost declaration. That is enough for the snapshot: the
/// generated code reads each identifier in the live scope chain, where the
/// innermost declaration wins.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct NameSet(IndexSet<String>);

impl NameSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the name was already present.
    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.0.insert(name.into())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for NameSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut names = NameSet::new();
        for name in iter {
            names.insert(name);
        }
        names
    }
}

impl<S: Into<String>> Extend<S> for NameSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for name in iter {
            self.insert(name);
        }
    }
}

/// Scopes enclosing `position`, from the program root down to the innermost
/// one. The root is always included.
pub fn scope_chain(tree: &ScopeTree, position: Position) -> Vec<&ScopeNode> {
    let mut chain = vec![&tree.root];
    let mut current = &tree.root;
    while let Some(child) = current
        .children
        .iter()
        .find(|child| child.range.contains(position))
    {
        chain.push(child);
        current = child;
    }
    chain
}

pub fn extract_names(tree: &ScopeTree, position: Position) -> NameSet {
    let mut names = NameSet::new();
    for scope in scope_chain(tree, position) {
        names.extend(scope.declared.iter().cloned());
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceRange;
    use crate::syntax::ScopeKind;

    fn range(start: (u32, u32), end: (u32, u32)) -> SourceRange {
        SourceRange::new(Position::new(start.0, start.1), Position::new(end.0, end.1))
    }

    fn sample_tree() -> ScopeTree {
        // line 1..20: program { outer (2..10) { inner (4..6) }, sibling (12..15) }
        let inner =
            ScopeNode::new(ScopeKind::Function, range((4, 1), (6, 2))).with_names(["x", "a"]);
        let outer = ScopeNode::new(ScopeKind::Function, range((2, 1), (10, 2)))
            .with_names(["a", "b"])
            .with_child(inner);
        let sibling =
            ScopeNode::new(ScopeKind::Function, range((12, 1), (15, 2))).with_names(["s"]);
        let root = ScopeNode::new(ScopeKind::Program, range((1, 1), (20, 1)))
            .with_names(["g", "outer", "sibling"])
            .with_child(outer)
            .with_child(sibling);
        ScopeTree { root }
    }

    #[test]
    fn unions_scopes_outer_first() {
        let names = extract_names(&sample_tree(), Position::new(5, 3));
        assert_eq!(
            names.iter().collect::<Vec<_>>(),
            vec!["g", "outer", "sibling", "a", "b", "x"]
        );
    }

    #[test]
    fn excludes_sibling_scopes() {
        let names = extract_names(&sample_tree(), Position::new(8, 1));
        assert!(names.contains("b"));
        assert!(!names.contains("x"));
        assert!(!names.contains("s"));
    }

    #[test]
    fn program_root_always_applies() {
        let tree = sample_tree();
        let chain = scope_chain(&tree, Position::new(99, 1));
        assert_eq!(chain.len(), 1);
        assert_eq!(extract_names(&tree, Position::new(99, 1)).len(), 3);
    }

    #[test]
    fn empty_scope_yields_empty_names() {
        let tree = ScopeTree {
            root: ScopeNode::new(ScopeKind::Program, range((1, 1), (1, 1))),
        };
        assert!(extract_names(&tree, Position::new(1, 1)).is_empty());
    }

    #[test]
    fn name_set_deduplicates() {
        let mut names: NameSet = ["a", "b"].into_iter().collect();
        assert!(!names.insert("a"));
        assert!(names.insert("c"));
        assert_eq!(names.to_vec(), vec!["a", "b", "c"]);
    }
}

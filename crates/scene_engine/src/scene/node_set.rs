//! Eager node queries

use super::node::Node;
use crate::foundation::Uuid;
use std::collections::HashSet;

/// Ordered, de-duplicated set of nodes
///
/// Every query returns a new set computed immediately; later changes to the
/// graph are not reflected.
#[derive(Debug, Clone, Default)]
pub struct NodeSet {
    nodes: Vec<Node>,
}

impl NodeSet {
    /// Set holding a single node
    pub fn new(node: &Node) -> Self {
        Self { nodes: vec![node.clone()] }
    }

    /// Set holding `nodes`, keeping the first occurrence of each
    pub fn from_nodes(nodes: impl IntoIterator<Item = Node>) -> Self {
        let mut seen = HashSet::new();
        Self {
            nodes: nodes.into_iter().filter(|n| seen.insert(n.uuid())).collect(),
        }
    }

    /// Every descendant of every node, in pre-order
    pub fn descendants(&self, include_self: bool) -> Self {
        self.expand(|node| {
            let mut subtree = node.subtree();
            if !include_self {
                subtree.remove(0);
            }
            subtree
        })
    }

    /// Every ancestor of every node, nearest first
    pub fn ancestors(&self, include_self: bool) -> Self {
        self.expand(|node| {
            let mut out = Vec::new();
            if include_self {
                out.push(node.clone());
            }
            let mut current = node.parent();
            while let Some(parent) = current {
                current = parent.parent();
                out.push(parent);
            }
            out
        })
    }

    /// Root of every node
    pub fn roots(&self) -> Self {
        self.expand(|node| vec![node.root()])
    }

    /// Direct children of every node
    pub fn children(&self, include_self: bool) -> Self {
        self.expand(|node| {
            let mut out = Vec::new();
            if include_self {
                out.push(node.clone());
            }
            out.extend(node.children());
            out
        })
    }

    /// Nodes matching `predicate`
    pub fn filter(&self, predicate: impl Fn(&Node) -> bool) -> Self {
        Self {
            nodes: self.nodes.iter().filter(|n| predicate(n)).cloned().collect(),
        }
    }

    fn expand(&self, f: impl Fn(&Node) -> Vec<Node>) -> Self {
        Self::from_nodes(self.nodes.iter().flat_map(f))
    }

    /// Nodes in order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Iterate over the nodes
    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.nodes.iter()
    }

    /// Whether a node with this uuid is in the set
    pub fn contains(&self, uuid: Uuid) -> bool {
        self.nodes.iter().any(|n| n.uuid() == uuid)
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the set is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl IntoIterator for NodeSet {
    type Item = Node;
    type IntoIter = std::vec::IntoIter<Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.into_iter()
    }
}

impl<'a> IntoIterator for &'a NodeSet {
    type Item = &'a Node;
    type IntoIter = std::slice::Iter<'a, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(set: &NodeSet) -> Vec<String> {
        set.iter().map(Node::name).collect()
    }

    fn tree() -> (Node, Node, Node, Node) {
        let root = Node::new("root");
        let a = Node::new("a");
        let b = Node::new("b");
        let a1 = Node::new("a1");
        root.add_child(&a).unwrap();
        root.add_child(&b).unwrap();
        a.add_child(&a1).unwrap();
        (root, a, b, a1)
    }

    #[test]
    fn test_descendants_pre_order() {
        let (root, ..) = tree();
        assert_eq!(names(&NodeSet::new(&root).descendants(true)), vec!["root", "a", "a1", "b"]);
        assert_eq!(names(&NodeSet::new(&root).descendants(false)), vec!["a", "a1", "b"]);
    }

    #[test]
    fn test_ancestors_and_roots_deduplicate() {
        let (root, _a, b, a1) = tree();
        let set = NodeSet::from_nodes([a1.clone(), b.clone()]);
        assert_eq!(names(&set.ancestors(false)), vec!["a", "root"]);
        assert_eq!(set.roots().len(), 1);
        assert!(set.roots().contains(root.uuid()));
    }

    #[test]
    fn test_children_and_filter() {
        let (root, ..) = tree();
        let children = NodeSet::new(&root).children(false);
        assert_eq!(names(&children), vec!["a", "b"]);

        let with_kids = NodeSet::new(&root)
            .descendants(true)
            .filter(|n| !n.children().is_empty());
        assert_eq!(names(&with_kids), vec!["root", "a"]);
    }
}

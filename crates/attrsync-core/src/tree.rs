//! Ordered n-ary trees stored in an arena.
//!
//! [`Tree<T>`] keeps every node in a [`SlotMap`] and addresses them by
//! [`NodeId`]. Each node owns its payload and an ordered list of child ids,
//! and records its parent id as a plain (non-owning) back-reference. Moving,
//! copying or removing subtrees never invalidates the ids of nodes that stay
//! in the tree.
//!
//! # Example
//!
//! ```
//! use attrsync_core::tree::Tree;
//!
//! let mut tree = Tree::new("root");
//! let root = tree.root();
//! let a = tree.push_back(root, "a").unwrap();
//! let b = tree.push_back(root, "b").unwrap();
//! tree.push_back(a, "a.0").unwrap();
//!
//! assert_eq!(tree.index(b), Some(1));
//! assert_eq!(tree.total_size(root), 4);
//! assert!(tree.contains(root, b));
//! ```
//!
//! # Invariant
//!
//! For every non-root node `n`, `child(parent(n), index(n)) == Some(n)`.
//! All mutating operations restore parent back-references for the subtrees
//! they touch before returning.

use std::cmp::Ordering;
use std::ops::Range;

use slotmap::{SlotMap, new_key_type};

new_key_type! {
    /// A stable identifier for a node in a [`Tree`].
    pub struct NodeId;
}

#[derive(Debug, Clone)]
struct Node<T> {
    data: T,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl<T> Node<T> {
    fn new(data: T, parent: Option<NodeId>) -> Self {
        Self {
            data,
            parent,
            children: Vec::new(),
        }
    }
}

/// An ordered n-ary tree with arena storage.
///
/// Cloning a tree deep-copies every node; the clone uses the same node ids,
/// so ids taken from the original remain meaningful in the copy.
#[derive(Debug, Clone)]
pub struct Tree<T> {
    nodes: SlotMap<NodeId, Node<T>>,
    root: NodeId,
}

impl<T: Default> Default for Tree<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Tree<T> {
    /// Create a tree holding a single root node.
    pub fn new(root_value: T) -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node::new(root_value, None));
        Self { nodes, root }
    }

    /// The root node. It exists for the whole lifetime of the tree.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Total number of nodes in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// A tree always holds its root, so it is never empty.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns true if `id` refers to a live node of this tree.
    pub fn is_valid(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn data(&self, id: NodeId) -> Option<&T> {
        self.nodes.get(id).map(|n| &n.data)
    }

    pub fn data_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.nodes.get_mut(id).map(|n| &mut n.data)
    }

    /// Replace a node's payload, returning the previous one.
    pub fn set_data(&mut self, id: NodeId, value: T) -> Option<T> {
        self.nodes
            .get_mut(id)
            .map(|n| std::mem::replace(&mut n.data, value))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    /// The ordered children of `id`. Unknown ids have no children.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.children(id).len()
    }

    /// The child at `index`, or `None` when out of range.
    pub fn child(&self, parent: NodeId, index: usize) -> Option<NodeId> {
        self.children(parent).get(index).copied()
    }

    /// Position of `id` among its siblings. `None` for the root.
    pub fn index(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&c| c == id)
    }

    /// Number of ancestors between `id` and the root.
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.parent(id);
        while let Some(p) = current {
            depth += 1;
            current = self.parent(p);
        }
        depth
    }

    /// Insert `value` as a child of `parent` at `position`.
    ///
    /// Positions past the end append.
    pub fn insert(&mut self, parent: NodeId, position: usize, value: T) -> Option<NodeId> {
        if !self.nodes.contains_key(parent) {
            return None;
        }
        let id = self.nodes.insert(Node::new(value, Some(parent)));
        let children = &mut self.nodes[parent].children;
        let position = position.min(children.len());
        children.insert(position, id);
        Some(id)
    }

    pub fn push_back(&mut self, parent: NodeId, value: T) -> Option<NodeId> {
        let position = self.child_count(parent);
        self.insert(parent, position, value)
    }

    /// Number of nodes in the subtree rooted at `id`, including `id`.
    pub fn total_size(&self, id: NodeId) -> usize {
        if !self.is_valid(id) {
            return 0;
        }
        self.descendants(id).count()
    }

    /// Returns true if `node` lies in the subtree rooted at `ancestor`
    /// (a node contains itself).
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        if !self.is_valid(ancestor) || !self.is_valid(node) {
            return false;
        }
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Move the children of `source` in `range` under `dest` at `position`.
    ///
    /// When `dest == source`, `position` is interpreted after the moved range
    /// has been taken out. Returns false (and changes nothing) if either node
    /// is unknown, the range is out of bounds, or the move would make a node
    /// its own ancestor.
    pub fn splice(
        &mut self,
        dest: NodeId,
        position: usize,
        source: NodeId,
        range: Range<usize>,
    ) -> bool {
        if !self.is_valid(dest) || !self.is_valid(source) {
            return false;
        }
        let source_len = self.child_count(source);
        if range.start > range.end || range.end > source_len {
            return false;
        }
        if self.children(source)[range.clone()]
            .iter()
            .any(|&m| self.contains(m, dest))
        {
            return false;
        }

        let moving: Vec<NodeId> = self.nodes[source].children.drain(range).collect();
        let children = &mut self.nodes[dest].children;
        let position = position.min(children.len());
        for (offset, &id) in moving.iter().enumerate() {
            children.insert(position + offset, id);
        }
        for id in moving {
            self.nodes[id].parent = Some(dest);
        }
        true
    }

    /// Move every child of `source` under `dest` at `position`.
    pub fn splice_all(&mut self, dest: NodeId, position: usize, source: NodeId) -> bool {
        let count = self.child_count(source);
        self.splice(dest, position, source, 0..count)
    }

    /// Move a single node (with its subtree) under `new_parent`.
    pub fn move_node(&mut self, node: NodeId, new_parent: NodeId, position: usize) -> bool {
        let (Some(parent), Some(index)) = (self.parent(node), self.index(node)) else {
            return false;
        };
        self.splice(new_parent, position, parent, index..index + 1)
    }

    /// Remove the subtree rooted at `id` and return its payload.
    ///
    /// The root cannot be removed; use [`clear_children`](Self::clear_children).
    pub fn remove(&mut self, id: NodeId) -> Option<T> {
        if id == self.root || !self.is_valid(id) {
            return None;
        }
        if let Some(parent) = self.parent(id) {
            self.nodes[parent].children.retain(|&c| c != id);
        }
        let doomed: Vec<NodeId> = self.descendants(id).collect();
        let mut removed = None;
        for node in doomed {
            if let Some(n) = self.nodes.remove(node)
                && node == id
            {
                removed = Some(n.data);
            }
        }
        removed
    }

    /// Remove up to `count` children of `parent` starting at `row`.
    ///
    /// Returns the number of children removed.
    pub fn remove_children(&mut self, parent: NodeId, row: usize, count: usize) -> usize {
        let mut removed = 0;
        while removed < count {
            let Some(child) = self.child(parent, row) else {
                break;
            };
            self.remove(child);
            removed += 1;
        }
        removed
    }

    pub fn clear_children(&mut self, id: NodeId) {
        let count = self.child_count(id);
        self.remove_children(id, 0, count);
    }

    /// Stable-sort the children of `parent` with `compare`.
    pub fn do_sort<F>(&mut self, parent: NodeId, mut compare: F)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        let Some(node) = self.nodes.get_mut(parent) else {
            return;
        };
        let mut children = std::mem::take(&mut node.children);
        children.sort_by(|&a, &b| compare(&self.nodes[a].data, &self.nodes[b].data));
        self.nodes[parent].children = children;
    }

    /// Stable-sort the children of every node in the subtree of `id`.
    pub fn sort_recursive<F>(&mut self, id: NodeId, mut compare: F)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        let parents: Vec<NodeId> = self
            .descendants(id)
            .filter(|&n| self.child_count(n) > 1)
            .collect();
        for parent in parents {
            self.do_sort(parent, &mut compare);
        }
    }

    /// Pre-order iterator over the subtree rooted at `id`.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_, T> {
        let stack = if self.is_valid(id) { vec![id] } else { Vec::new() };
        Descendants { tree: self, stack }
    }

    /// First node in pre-order below (and including) `id` whose payload
    /// satisfies `predicate`.
    pub fn find<P>(&self, id: NodeId, mut predicate: P) -> Option<NodeId>
    where
        P: FnMut(&T) -> bool,
    {
        self.descendants(id)
            .find(|&n| self.data(n).is_some_and(&mut predicate))
    }

    /// Checks the parent/child back-reference invariant for every node.
    pub fn is_consistent(&self) -> bool {
        self.nodes.iter().all(|(id, node)| {
            let children_ok = node
                .children
                .iter()
                .all(|&c| self.nodes.get(c).is_some_and(|n| n.parent == Some(id)));
            let parent_ok = match node.parent {
                None => id == self.root,
                Some(p) => self
                    .index(id)
                    .and_then(|i| self.child(p, i))
                    .is_some_and(|c| c == id),
            };
            children_ok && parent_ok
        })
    }
}

impl<T: Clone> Tree<T> {
    /// Deep-copy the subtree `other_node` of `other` under `parent` at
    /// `position`. Returns the id of the copied subtree root.
    pub fn graft(
        &mut self,
        parent: NodeId,
        position: usize,
        other: &Tree<T>,
        other_node: NodeId,
    ) -> Option<NodeId> {
        let value = other.data(other_node)?.clone();
        let new_root = self.insert(parent, position, value)?;
        self.copy_children(new_root, other, other_node);
        Some(new_root)
    }

    /// Deep-copy the subtree rooted at `id` into a new tree.
    pub fn subtree(&self, id: NodeId) -> Option<Tree<T>> {
        let mut tree = Tree::new(self.data(id)?.clone());
        let root = tree.root();
        tree.copy_children(root, self, id);
        Some(tree)
    }

    fn copy_children(&mut self, dest: NodeId, other: &Tree<T>, source: NodeId) {
        let mut pending = vec![(source, dest)];
        while let Some((src, dst)) = pending.pop() {
            for &child in other.children(src) {
                let Some(value) = other.data(child) else {
                    continue;
                };
                if let Some(copy) = self.push_back(dst, value.clone()) {
                    pending.push((child, copy));
                }
            }
        }
    }
}

/// Pre-order traversal of a subtree. See [`Tree::descendants`].
pub struct Descendants<'a, T> {
    tree: &'a Tree<T>,
    stack: Vec<NodeId>,
}

impl<T> Iterator for Descendants<'_, T> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.tree.children(id).iter().rev().copied());
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Tree<&'static str>, NodeId, NodeId, NodeId) {
        let mut tree = Tree::new("root");
        let root = tree.root();
        let a = tree.push_back(root, "a").unwrap();
        let b = tree.push_back(root, "b").unwrap();
        tree.push_back(a, "a0").unwrap();
        tree.push_back(a, "a1").unwrap();
        tree.push_back(b, "b0").unwrap();
        (tree, root, a, b)
    }

    fn labels(tree: &Tree<&'static str>, id: NodeId) -> Vec<&'static str> {
        tree.descendants(id).map(|n| *tree.data(n).unwrap()).collect()
    }

    #[test]
    fn test_insert_and_index() {
        let (mut tree, root, a, b) = sample();
        let mid = tree.insert(root, 1, "mid").unwrap();
        assert_eq!(tree.index(a), Some(0));
        assert_eq!(tree.index(mid), Some(1));
        assert_eq!(tree.index(b), Some(2));
        assert_eq!(tree.index(root), None);

        let end = tree.insert(root, 99, "end").unwrap();
        assert_eq!(tree.index(end), Some(3));
        assert!(tree.is_consistent());
    }

    #[test]
    fn test_child_out_of_range() {
        let (tree, root, _, _) = sample();
        assert!(tree.child(root, 0).is_some());
        assert!(tree.child(root, 2).is_none());
    }

    #[test]
    fn test_total_size_and_contains() {
        let (tree, root, a, b) = sample();
        assert_eq!(tree.total_size(root), 6);
        assert_eq!(tree.total_size(a), 3);
        assert!(tree.contains(root, tree.child(a, 1).unwrap()));
        assert!(!tree.contains(b, tree.child(a, 1).unwrap()));
        assert!(tree.contains(a, a));
    }

    #[test]
    fn test_preorder() {
        let (tree, root, _, _) = sample();
        assert_eq!(labels(&tree, root), vec!["root", "a", "a0", "a1", "b", "b0"]);
    }

    #[test]
    fn test_splice_between_parents() {
        let (mut tree, root, a, b) = sample();
        assert!(tree.splice(b, 0, a, 0..2));
        assert_eq!(tree.child_count(a), 0);
        assert_eq!(labels(&tree, b), vec!["b", "a0", "a1", "b0"]);
        assert!(tree.is_consistent());
        assert_eq!(tree.total_size(root), 6);
    }

    #[test]
    fn test_splice_rejects_cycles() {
        let (mut tree, root, a, _) = sample();
        let a0 = tree.child(a, 0).unwrap();
        assert!(!tree.splice(a0, 0, root, 0..1));
        assert!(!tree.splice(a, 0, root, 0..5));
        assert!(tree.is_consistent());
    }

    #[test]
    fn test_move_node_within_parent() {
        let (mut tree, root, a, b) = sample();
        assert!(tree.move_node(a, root, 1));
        assert_eq!(tree.children(root), &[b, a]);
        assert!(tree.is_consistent());
    }

    #[test]
    fn test_remove_subtree() {
        let (mut tree, root, a, _) = sample();
        assert_eq!(tree.remove(a), Some("a"));
        assert_eq!(tree.len(), 3);
        assert_eq!(labels(&tree, root), vec!["root", "b", "b0"]);
        assert_eq!(tree.remove(root), None);
        assert!(tree.is_consistent());
    }

    #[test]
    fn test_remove_children_range() {
        let (mut tree, root, _, b) = sample();
        assert_eq!(tree.remove_children(root, 0, 1), 1);
        assert_eq!(tree.children(root), &[b]);
        assert_eq!(tree.remove_children(root, 0, 10), 1);
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_graft_and_subtree() {
        let (tree, _, a, _) = sample();
        let copy = tree.subtree(a).unwrap();
        assert_eq!(labels(&copy, copy.root()), vec!["a", "a0", "a1"]);

        let mut other = Tree::new("other");
        let other_root = other.root();
        let grafted = other.graft(other_root, 0, &tree, a).unwrap();
        assert_eq!(labels(&other, grafted), vec!["a", "a0", "a1"]);
        assert!(other.is_consistent());
    }

    #[test]
    fn test_clone_is_deep() {
        let (tree, root, a, _) = sample();
        let mut copy = tree.clone();
        *copy.data_mut(a).unwrap() = "changed";
        assert_eq!(tree.data(a), Some(&"a"));
        assert_eq!(copy.index(a), Some(0));
        assert_eq!(copy.parent(a), Some(root));
        assert!(copy.is_consistent());
    }

    #[test]
    fn test_stable_sort() {
        let mut tree = Tree::new((0, "root"));
        let root = tree.root();
        for item in [(2, "x"), (1, "y"), (2, "z"), (1, "w")] {
            tree.push_back(root, item);
        }
        tree.do_sort(root, |a, b| a.0.cmp(&b.0));
        let order: Vec<&str> = tree
            .children(root)
            .iter()
            .map(|&c| tree.data(c).unwrap().1)
            .collect();
        assert_eq!(order, vec!["y", "w", "x", "z"]);
        assert!(tree.is_consistent());
    }

    #[test]
    fn test_find_and_depth() {
        let (tree, root, a, _) = sample();
        let found = tree.find(root, |v| *v == "a1").unwrap();
        assert_eq!(tree.parent(found), Some(a));
        assert_eq!(tree.depth(found), 2);
        assert!(tree.find(root, |v| *v == "missing").is_none());
    }
}

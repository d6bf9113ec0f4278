//! ## grenverk-core::rbtree
//! **Red-black tree ordered index**
//!
//! Drives timer expiry and other sorted lookups. The tree owns its nodes in a
//! [`NodePool`] and hands out [`NodeHandle`]s; insert and delete only rewire
//! links and recolor, so a handle stays valid until its own node is deleted.
//!
//! A single sentinel slot stands in for every external leaf. It is always
//! black and its links point back at itself, so reading the color or parent of
//! a leaf never needs a null check.
//!
//! Invariants restored before any public operation returns:
//! 1. the root is black;
//! 2. no red node has a red parent;
//! 3. every path from a node down to the sentinel crosses the same number of
//!    black nodes;
//! 4. in-order traversal is non-decreasing under the tree's [`KeyOrder`].

mod delete;
mod insert;
mod invariants;
pub mod order;

use std::sync::atomic::{AtomicU32, Ordering};

use crate::alloc::{NodePool, PoolKey, DEFAULT_PAGE_SIZE};

pub use invariants::InvariantViolation;
pub use order::{KeyOrder, OrderBy, TimerOrder, ValueOrder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Red,
    Black,
}

static NEXT_TREE_ID: AtomicU32 = AtomicU32::new(1);

/// Handle to a node stored in an [`RbTree`].
///
/// Carries the id of the tree that issued it, so a handle is never accepted
/// by another tree even when the slot and generation happen to line up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle(PoolKey, u32);

#[derive(Debug)]
struct RbNode<K, T> {
    color: Color,
    parent: PoolKey,
    left: PoolKey,
    right: PoolKey,
    /// `None` only for the sentinel.
    entry: Option<(K, T)>,
}

/// Red-black tree keyed by `K`, carrying a `T` per node, ordered by `O`.
#[derive(Debug)]
pub struct RbTree<K, T, O = ValueOrder> {
    id: u32,
    nodes: NodePool<RbNode<K, T>>,
    root: PoolKey,
    sentinel: PoolKey,
    order: O,
    len: usize,
}

impl<K, T, O: KeyOrder<K> + Default> RbTree<K, T, O> {
    pub fn new() -> Self {
        Self::with_order(O::default())
    }
}

impl<K, T, O: KeyOrder<K> + Default> Default for RbTree<K, T, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T, O: KeyOrder<K>> RbTree<K, T, O> {
    /// Creates an empty tree using `order` as its insertion strategy.
    pub fn with_order(order: O) -> Self {
        let mut nodes = NodePool::new(DEFAULT_PAGE_SIZE);
        let sentinel = Self::alloc_sentinel(&mut nodes);

        Self {
            id: NEXT_TREE_ID.fetch_add(1, Ordering::Relaxed),
            nodes,
            root: sentinel,
            sentinel,
            order,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.root == self.sentinel
    }

    pub fn order(&self) -> &O {
        &self.order
    }

    /// Returns `true` if `handle` refers to a node currently in this tree.
    pub fn contains(&self, handle: NodeHandle) -> bool {
        self.owns(handle) && self.nodes.contains(handle.0)
    }

    pub fn get(&self, handle: NodeHandle) -> Option<(&K, &T)> {
        if !self.owns(handle) {
            return None;
        }
        let (key, value) = self.nodes.get(handle.0)?.entry.as_ref()?;
        Some((key, value))
    }

    /// Mutable access to the payload. The key stays immutable since changing it
    /// would break the ordering.
    pub fn get_mut(&mut self, handle: NodeHandle) -> Option<(&K, &mut T)> {
        if !self.owns(handle) {
            return None;
        }
        let (key, value) = self.nodes.get_mut(handle.0)?.entry.as_mut()?;
        Some((&*key, value))
    }

    /// Key of a live node.
    ///
    /// # Panics
    ///
    /// Panics if `handle` is stale.
    pub fn key(&self, handle: NodeHandle) -> &K {
        self.assert_live(handle);
        self.key_of(handle.0)
    }

    /// Node holding the least key, or `None` for an empty tree.
    pub fn minimum(&self) -> Option<NodeHandle> {
        if self.is_empty() {
            return None;
        }
        Some(self.handle(self.subtree_min(self.root)))
    }

    pub fn maximum(&self) -> Option<NodeHandle> {
        if self.is_empty() {
            return None;
        }
        Some(self.handle(self.subtree_max(self.root)))
    }

    /// Leftmost node of the subtree rooted at `handle`.
    pub fn subtree_minimum(&self, handle: NodeHandle) -> NodeHandle {
        self.assert_live(handle);
        self.handle(self.subtree_min(handle.0))
    }

    /// In-order successor of `handle`, `None` if it holds the greatest key.
    pub fn successor(&self, handle: NodeHandle) -> Option<NodeHandle> {
        self.assert_live(handle);
        let mut node = handle.0;

        if self.right(node) != self.sentinel {
            return Some(self.handle(self.subtree_min(self.right(node))));
        }

        loop {
            if node == self.root {
                return None;
            }
            let parent = self.parent(node);
            if node == self.left(parent) {
                return Some(self.handle(parent));
            }
            node = parent;
        }
    }

    /// In-order predecessor of `handle`, `None` if it holds the least key.
    pub fn predecessor(&self, handle: NodeHandle) -> Option<NodeHandle> {
        self.assert_live(handle);
        let mut node = handle.0;

        if self.left(node) != self.sentinel {
            return Some(self.handle(self.subtree_max(self.left(node))));
        }

        loop {
            if node == self.root {
                return None;
            }
            let parent = self.parent(node);
            if node == self.right(parent) {
                return Some(self.handle(parent));
            }
            node = parent;
        }
    }

    /// In-order iterator over `(handle, key, payload)`.
    pub fn iter(&self) -> Iter<'_, K, T, O> {
        Iter {
            tree: self,
            next: self.minimum(),
            remaining: self.len,
        }
    }

    /// Removes every node. Outstanding handles become stale.
    pub fn clear(&mut self) {
        let nodes: Vec<PoolKey> = self.iter().map(|(handle, _, _)| handle.0).collect();
        for node in nodes {
            self.nodes.release(node);
        }
        self.root = self.sentinel;
        self.len = 0;
    }

    fn alloc_sentinel(nodes: &mut NodePool<RbNode<K, T>>) -> PoolKey {
        let placeholder = nodes
            .allocate(RbNode {
                color: Color::Black,
                parent: PoolKey::dangling(),
                left: PoolKey::dangling(),
                right: PoolKey::dangling(),
                entry: None,
            })
            .unwrap_or_else(|err| panic!("red-black tree sentinel allocation failed: {err}"));
        let sentinel = &mut nodes[placeholder];
        sentinel.parent = placeholder;
        sentinel.left = placeholder;
        sentinel.right = placeholder;
        placeholder
    }

    #[inline]
    fn handle(&self, node: PoolKey) -> NodeHandle {
        NodeHandle(node, self.id)
    }

    #[inline]
    fn owns(&self, handle: NodeHandle) -> bool {
        handle.1 == self.id && handle.0 != self.sentinel
    }

    fn assert_live(&self, handle: NodeHandle) {
        assert!(
            self.contains(handle),
            "node handle {handle:?} is not in this tree"
        );
    }

    #[inline]
    fn key_of(&self, node: PoolKey) -> &K {
        match &self.nodes[node].entry {
            Some((key, _)) => key,
            None => unreachable!("the sentinel carries no key"),
        }
    }

    #[inline]
    fn color(&self, node: PoolKey) -> Color {
        self.nodes[node].color
    }

    #[inline]
    fn is_red(&self, node: PoolKey) -> bool {
        self.color(node) == Color::Red
    }

    #[inline]
    fn is_black(&self, node: PoolKey) -> bool {
        self.color(node) == Color::Black
    }

    #[inline]
    fn set_color(&mut self, node: PoolKey, color: Color) {
        self.nodes[node].color = color;
    }

    #[inline]
    fn parent(&self, node: PoolKey) -> PoolKey {
        self.nodes[node].parent
    }

    #[inline]
    fn left(&self, node: PoolKey) -> PoolKey {
        self.nodes[node].left
    }

    #[inline]
    fn right(&self, node: PoolKey) -> PoolKey {
        self.nodes[node].right
    }

    #[inline]
    fn set_parent(&mut self, node: PoolKey, parent: PoolKey) {
        self.nodes[node].parent = parent;
    }

    #[inline]
    fn set_left(&mut self, node: PoolKey, left: PoolKey) {
        self.nodes[node].left = left;
    }

    #[inline]
    fn set_right(&mut self, node: PoolKey, right: PoolKey) {
        self.nodes[node].right = right;
    }

    fn subtree_min(&self, mut node: PoolKey) -> PoolKey {
        while self.left(node) != self.sentinel {
            node = self.left(node);
        }
        node
    }

    fn subtree_max(&self, mut node: PoolKey) -> PoolKey {
        while self.right(node) != self.sentinel {
            node = self.right(node);
        }
        node
    }

    /// Replaces `old` with `new` in the link held by `old`'s parent.
    fn replace_child(&mut self, old: PoolKey, new: PoolKey) {
        if old == self.root {
            self.root = new;
        } else {
            let parent = self.parent(old);
            if old == self.left(parent) {
                self.set_left(parent, new);
            } else {
                self.set_right(parent, new);
            }
        }
    }

    //        node                temp
    //       /    \              /    \
    //      a     temp   =>    node    c
    //           /    \       /    \
    //          b      c     a      b
    fn left_rotate(&mut self, node: PoolKey) {
        let temp = self.right(node);
        let inner = self.left(temp);

        self.set_right(node, inner);
        if inner != self.sentinel {
            self.set_parent(inner, node);
        }

        self.set_parent(temp, self.parent(node));
        self.replace_child(node, temp);

        self.set_left(temp, node);
        self.set_parent(node, temp);
    }

    fn right_rotate(&mut self, node: PoolKey) {
        let temp = self.left(node);
        let inner = self.right(temp);

        self.set_left(node, inner);
        if inner != self.sentinel {
            self.set_parent(inner, node);
        }

        self.set_parent(temp, self.parent(node));
        self.replace_child(node, temp);

        self.set_right(temp, node);
        self.set_parent(node, temp);
    }
}

/// In-order iterator returned by [`RbTree::iter`].
#[derive(Debug)]
pub struct Iter<'a, K, T, O> {
    tree: &'a RbTree<K, T, O>,
    next: Option<NodeHandle>,
    remaining: usize,
}

impl<'a, K, T, O: KeyOrder<K>> Iterator for Iter<'a, K, T, O> {
    type Item = (NodeHandle, &'a K, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let handle = self.next?;
        let tree = self.tree;
        self.next = tree.successor(handle);
        self.remaining -= 1;
        let (key, value) = tree.get(handle)?;
        Some((handle, key, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K, T, O: KeyOrder<K>> ExactSizeIterator for Iter<'a, K, T, O> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys<O: KeyOrder<u32>>(tree: &RbTree<u32, &'static str, O>) -> Vec<u32> {
        tree.iter().map(|(_, key, _)| *key).collect()
    }

    fn build(keys: &[u32]) -> (RbTree<u32, &'static str>, Vec<NodeHandle>) {
        let mut tree = RbTree::new();
        let handles = keys.iter().map(|&k| tree.insert(k, "v")).collect();
        (tree, handles)
    }

    #[test]
    fn empty_tree() {
        let tree: RbTree<u32, ()> = RbTree::new();
        assert!(tree.is_empty());
        assert_eq!(tree.len(), 0);
        assert!(tree.minimum().is_none());
        assert!(tree.maximum().is_none());
        assert_eq!(tree.iter().count(), 0);
        assert_eq!(tree.check_invariants(), Ok(0));
    }

    #[test]
    fn first_insert_becomes_black_root() {
        let (tree, handles) = build(&[42]);
        assert_eq!(tree.root, handles[0].0);
        assert_eq!(tree.color(tree.root), Color::Black);
        assert_eq!(tree.check_invariants(), Ok(1));
    }

    #[test]
    fn round_trip_scenario() {
        let (mut tree, handles) = build(&[50, 30, 70, 20, 40, 60, 80]);
        assert_eq!(keys(&tree), vec![20, 30, 40, 50, 60, 70, 80]);
        tree.check_invariants().unwrap();

        assert_eq!(tree.delete(handles[1]), (30, "v"));
        assert_eq!(keys(&tree), vec![20, 40, 50, 60, 70, 80]);
        tree.check_invariants().unwrap();

        assert_eq!(tree.delete(handles[0]).0, 50);
        assert_eq!(keys(&tree), vec![20, 40, 60, 70, 80]);
        tree.check_invariants().unwrap();
        assert_eq!(tree.len(), 5);
    }

    #[test]
    fn minimum_and_successor_walk() {
        let (tree, _) = build(&[8, 3, 10, 1, 6, 14, 4, 7, 13]);
        let mut walked = Vec::new();
        let mut cursor = tree.minimum();
        while let Some(handle) = cursor {
            walked.push(*tree.key(handle));
            cursor = tree.successor(handle);
        }
        assert_eq!(walked, vec![1, 3, 4, 6, 7, 8, 10, 13, 14]);
    }

    #[test]
    fn predecessor_walk_mirrors_successor() {
        let (tree, _) = build(&[5, 2, 9, 1, 3, 7, 11]);
        let mut walked = Vec::new();
        let mut cursor = tree.maximum();
        while let Some(handle) = cursor {
            walked.push(*tree.key(handle));
            cursor = tree.predecessor(handle);
        }
        assert_eq!(walked, vec![11, 9, 7, 5, 3, 2, 1]);
    }

    #[test]
    fn duplicates_keep_insertion_order() {
        let mut tree: RbTree<u32, usize> = RbTree::new();
        for i in 0..6 {
            tree.insert(7, i);
        }
        tree.insert(1, 100);
        let payloads: Vec<usize> = tree.iter().map(|(_, _, v)| *v).collect();
        assert_eq!(payloads, vec![100, 0, 1, 2, 3, 4, 5]);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn handles_survive_rotations_and_other_deletes() {
        let keys_in: Vec<u32> = (0..64).collect();
        let (mut tree, handles) = build(&keys_in);

        for handle in handles.iter().step_by(2) {
            tree.delete(*handle);
        }
        for (i, handle) in handles.iter().enumerate() {
            if i % 2 == 0 {
                assert!(!tree.contains(*handle));
            } else {
                assert_eq!(*tree.key(*handle), i as u32);
            }
        }
        tree.check_invariants().unwrap();
    }

    #[test]
    fn delete_down_to_empty_and_reuse() {
        let (mut tree, handles) = build(&[3, 1, 2]);
        for handle in handles {
            tree.delete(handle);
            tree.check_invariants().unwrap();
        }
        assert!(tree.is_empty());

        tree.insert(9, "again");
        assert_eq!(keys(&tree), vec![9]);
        assert_eq!(tree.nodes.stats().snapshot().reused_allocations, 1);
    }

    #[test]
    fn get_mut_updates_payload() {
        let mut tree: RbTree<u32, String> = RbTree::new();
        let handle = tree.insert(1, "a".into());
        tree.get_mut(handle).unwrap().1.push('b');
        assert_eq!(tree.get(handle), Some((&1, &"ab".to_string())));
    }

    #[test]
    fn timer_order_sorts_across_wrap() {
        let mut tree: RbTree<u32, &'static str, TimerOrder> = RbTree::new();
        let base = u32::MAX - 100;
        for offset in [150u32, 10, 90, 200, 0, 101] {
            tree.insert(base.wrapping_add(offset), "t");
        }
        let offsets: Vec<u32> = keys(&tree)
            .into_iter()
            .map(|k| k.wrapping_sub(base))
            .collect();
        assert_eq!(offsets, vec![0, 10, 90, 101, 150, 200]);
        assert_eq!(
            tree.key(tree.minimum().unwrap()).wrapping_sub(base),
            0
        );
        tree.check_invariants().unwrap();
    }

    #[test]
    fn clear_resets_tree() {
        let (mut tree, handles) = build(&[1, 2, 3]);
        tree.clear();
        assert!(tree.is_empty());
        assert!(!tree.contains(handles[0]));
        tree.insert(4, "v");
        assert_eq!(keys(&tree), vec![4]);
    }

    #[test]
    #[should_panic(expected = "is not in this tree")]
    fn handle_from_another_tree_is_rejected() {
        let mut first: RbTree<u32, &'static str> = RbTree::new();
        let mut second: RbTree<u32, &'static str> = RbTree::new();
        first.insert(10, "first");
        let foreign = second.insert(99, "second");

        assert!(!first.contains(foreign));
        assert!(first.get(foreign).is_none());
        assert!(first.get_mut(foreign).is_none());
        first.delete(foreign);
    }

    #[test]
    fn foreign_handle_leaves_tree_untouched() {
        let mut first: RbTree<u32, &'static str> = RbTree::new();
        let mut second: RbTree<u32, &'static str> = RbTree::new();
        let own = first.insert(10, "first");
        let foreign = second.insert(99, "second");

        let deleted = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            first.delete(foreign);
        }));
        assert!(deleted.is_err());
        assert_eq!(first.len(), 1);
        assert_eq!(first.get(own), Some((&10, &"first")));
        assert_eq!(second.get(foreign), Some((&99, &"second")));
    }

    #[test]
    #[should_panic(expected = "is not in this tree")]
    fn deleting_twice_is_detected() {
        let (mut tree, handles) = build(&[1, 2]);
        tree.delete(handles[0]);
        tree.delete(handles[0]);
    }
}

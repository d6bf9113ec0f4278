//! ## grenverk-core::radix
//! **Binary radix trie with longest-prefix-match lookup**
//!
//! Keys are fixed-width integers walked from the most significant bit; a 1 bit
//! branches right, a 0 bit left. A prefix is written at the node reached after
//! consuming the leading set bits of its mask, so a node's depth is the prefix
//! length it represents. Lookups follow every key bit while nodes exist and
//! return the deepest value seen, which is the longest matching prefix.
//!
//! ### Allocation
//! Nodes live in a [`NodePool`]: released nodes are reused first, otherwise
//! slots come from the current page-sized slab. The first levels can be built
//! eagerly at construction ([`Preallocate`]).
//!
//! ### Root
//! The root always exists and is never pruned. It holds the value of the
//! zero-length prefix.

mod key;

use std::collections::VecDeque;
use std::mem;

use tracing::{debug, trace, warn};

use crate::alloc::{NodePool, PoolKey, StatsSnapshot, DEFAULT_PAGE_SIZE};
use crate::error::RadixError;

pub use key::{ipv4_key, ipv6_key, RadixKey};

/// Eager construction of the first trie levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Preallocate {
    #[default]
    None,
    /// Build every node down to this depth.
    Levels(u32),
    /// Depth picked from the number of nodes per slab: 6 levels when 128
    /// nodes fit, 7 when 256 fit, 8 otherwise.
    Auto,
}

/// Deepest pre-allocation honoured; deeper requests are cut down to it.
pub const MAX_PREALLOCATE_LEVELS: u32 = 16;

/// Construction parameters for a [`RadixTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadixOptions {
    pub page_size: usize,
    pub preallocate: Preallocate,
    /// Maximum number of live nodes, root included.
    pub node_limit: Option<usize>,
}

impl Default for RadixOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            preallocate: Preallocate::None,
            node_limit: None,
        }
    }
}

#[derive(Debug)]
struct RadixNode<V> {
    right: Option<PoolKey>,
    left: Option<PoolKey>,
    parent: Option<PoolKey>,
    value: Option<V>,
}

impl<V> RadixNode<V> {
    fn detached(parent: Option<PoolKey>) -> Self {
        Self {
            right: None,
            left: None,
            parent,
            value: None,
        }
    }

    fn is_leaf(&self) -> bool {
        self.right.is_none() && self.left.is_none()
    }

    fn child(&self, right: bool) -> Option<PoolKey> {
        if right {
            self.right
        } else {
            self.left
        }
    }

    fn child_mut(&mut self, right: bool) -> &mut Option<PoolKey> {
        if right {
            &mut self.right
        } else {
            &mut self.left
        }
    }
}

/// Longest-prefix-match trie over keys of type `K` carrying values of type `V`.
#[derive(Debug)]
pub struct RadixTree<K, V> {
    nodes: NodePool<RadixNode<V>>,
    root: PoolKey,
    len: usize,
    _key: std::marker::PhantomData<K>,
}

impl<K: RadixKey, V> Default for RadixTree<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: RadixKey, V> RadixTree<K, V> {
    /// Creates a trie holding only an unset root.
    ///
    /// # Panics
    ///
    /// Panics if the root node cannot be allocated.
    pub fn new() -> Self {
        let mut nodes = NodePool::new(DEFAULT_PAGE_SIZE);
        let root = nodes
            .allocate(RadixNode::detached(None))
            .unwrap_or_else(|err| panic!("radix root allocation failed: {err}"));

        Self {
            nodes,
            root,
            len: 0,
            _key: std::marker::PhantomData,
        }
    }

    /// Creates a trie with explicit slab size, node limit and pre-allocation.
    pub fn with_options(options: RadixOptions) -> Result<Self, RadixError> {
        let mut nodes = NodePool::new(options.page_size).with_limit(options.node_limit);
        let root = nodes.allocate(RadixNode::detached(None))?;

        let mut tree = Self {
            nodes,
            root,
            len: 0,
            _key: std::marker::PhantomData,
        };

        let requested = match options.preallocate {
            Preallocate::None => 0,
            Preallocate::Levels(levels) => levels,
            Preallocate::Auto => auto_levels(tree.nodes.slab_capacity()),
        };
        let levels = requested.min(K::BITS).min(MAX_PREALLOCATE_LEVELS);
        if levels < requested.min(K::BITS) {
            warn!(requested, levels, "radix preallocation capped");
        }
        tree.preallocate(levels)?;

        Ok(tree)
    }

    /// Writes `value` at the prefix of `key` selected by `mask`.
    ///
    /// Only the leading run of set mask bits counts. An existing value at that
    /// prefix is never overwritten.
    pub fn insert(&mut self, key: K, mask: K, value: V) -> Result<(), RadixError> {
        let mut node = self.root;
        let mut depth = 0;

        while depth < K::BITS && mask.bit(depth) {
            match self.nodes[node].child(key.bit(depth)) {
                Some(next) => {
                    node = next;
                    depth += 1;
                }
                None => break,
            }
        }

        if depth == K::BITS || !mask.bit(depth) {
            let slot = &mut self.nodes[node].value;
            if slot.is_some() {
                return Err(RadixError::KeyConflict);
            }
            *slot = Some(value);
            self.len += 1;
            return Ok(());
        }

        let leaf = self.grow_path(node, key, mask, depth)?;
        self.nodes[leaf].value = Some(value);
        self.len += 1;
        Ok(())
    }

    /// Like [`insert`](Self::insert) with a prefix length instead of a mask.
    pub fn insert_prefix(&mut self, key: K, prefix_len: u32, value: V) -> Result<(), RadixError> {
        self.insert(key, K::prefix_mask(prefix_len), value)
    }

    /// Removes the value stored at the exact prefix and returns it.
    ///
    /// A leaf left without a value is released together with every ancestor
    /// that becomes childless and valueless, stopping at the root.
    pub fn delete(&mut self, key: K, mask: K) -> Result<V, RadixError> {
        let mut node = self.root;
        let mut depth = 0;

        while depth < K::BITS && mask.bit(depth) {
            node = self.nodes[node]
                .child(key.bit(depth))
                .ok_or(RadixError::NotFound)?;
            depth += 1;
        }

        if node == self.root || !self.nodes[node].is_leaf() {
            let value = self.nodes[node].value.take().ok_or(RadixError::NotFound)?;
            self.len -= 1;
            return Ok(value);
        }

        let value = self.nodes[node].value.take().ok_or(RadixError::NotFound)?;
        self.len -= 1;

        let mut pruned = 0usize;
        loop {
            let Some(parent) = self.nodes[node].parent else {
                break;
            };

            let link = if self.nodes[parent].right == Some(node) {
                &mut self.nodes[parent].right
            } else {
                &mut self.nodes[parent].left
            };
            *link = None;
            self.nodes.release(node);
            pruned += 1;

            let parent_node = &self.nodes[parent];
            if parent == self.root || !parent_node.is_leaf() || parent_node.value.is_some() {
                break;
            }
            node = parent;
        }

        trace!(pruned, "radix prefix deleted");
        Ok(value)
    }

    /// Like [`delete`](Self::delete) with a prefix length instead of a mask.
    pub fn delete_prefix(&mut self, key: K, prefix_len: u32) -> Result<V, RadixError> {
        self.delete(key, K::prefix_mask(prefix_len))
    }

    /// Longest-prefix match: the value of the deepest valued node on the path
    /// of `key`.
    pub fn find(&self, key: K) -> Option<&V> {
        let mut found = None;
        let mut node = Some(self.root);
        let mut depth = 0;

        while let Some(current) = node {
            let entry = &self.nodes[current];
            if let Some(value) = &entry.value {
                found = Some(value);
            }
            if depth == K::BITS {
                break;
            }
            node = entry.child(key.bit(depth));
            depth += 1;
        }

        found
    }

    /// Value stored at exactly this prefix, without falling back to shorter
    /// ones.
    pub fn get_exact(&self, key: K, mask: K) -> Option<&V> {
        let mut node = self.root;
        let mut depth = 0;

        while depth < K::BITS && mask.bit(depth) {
            node = self.nodes[node].child(key.bit(depth))?;
            depth += 1;
        }

        self.nodes[node].value.as_ref()
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Live nodes, root and valueless interior nodes included.
    pub fn node_count(&self) -> usize {
        self.nodes.allocated_count()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.nodes.stats().snapshot()
    }

    /// Allocates the missing nodes below `attach` for the remaining mask bits
    /// and links them in one step, returning the new leaf.
    ///
    /// On failure every node allocated so far is released and the trie is left
    /// exactly as it was.
    fn grow_path(
        &mut self,
        attach: PoolKey,
        key: K,
        mask: K,
        mut depth: u32,
    ) -> Result<PoolKey, RadixError> {
        let first_right = key.bit(depth);
        let first = self.nodes.allocate(RadixNode::detached(Some(attach)))?;
        let mut tail = first;
        depth += 1;

        while depth < K::BITS && mask.bit(depth) {
            let right = key.bit(depth);
            match self.nodes.allocate(RadixNode::detached(Some(tail))) {
                Ok(next) => {
                    *self.nodes[tail].child_mut(right) = Some(next);
                    tail = next;
                    depth += 1;
                }
                Err(err) => {
                    self.release_chain(first);
                    return Err(err.into());
                }
            }
        }

        *self.nodes[attach].child_mut(first_right) = Some(first);
        Ok(tail)
    }

    /// Releases a detached single-child chain starting at `head`.
    fn release_chain(&mut self, head: PoolKey) {
        let mut next = Some(head);
        while let Some(node) = next {
            let released = self.nodes.release(node);
            next = released.right.or(released.left);
        }
    }

    /// Builds every node of the first `levels` levels, breadth first.
    fn preallocate(&mut self, levels: u32) -> Result<(), RadixError> {
        if levels == 0 {
            return Ok(());
        }

        let mut frontier = VecDeque::from([self.root]);
        for _ in 0..levels {
            let mut next_level = VecDeque::with_capacity(frontier.len() * 2);
            for node in mem::take(&mut frontier) {
                for right in [false, true] {
                    let child = self.nodes.allocate(RadixNode::detached(Some(node)))?;
                    *self.nodes[node].child_mut(right) = Some(child);
                    next_level.push_back(child);
                }
            }
            frontier = next_level;
        }

        debug!(
            levels,
            nodes = self.nodes.allocated_count(),
            slabs = self.nodes.slab_count(),
            "radix levels preallocated"
        );
        Ok(())
    }
}

/// Pre-allocation depth for `Preallocate::Auto`.
///
/// Only the exact 128 and 256 nodes-per-slab cases get a tree sized to the
/// slab; every other layout gets 8 levels (511 nodes) even when that spans
/// several slabs.
fn auto_levels(nodes_per_page: usize) -> u32 {
    match nodes_per_page {
        128 => 6,
        256 => 7,
        _ => 8,
    }
}

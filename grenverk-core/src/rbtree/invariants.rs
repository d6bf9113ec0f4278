use thiserror::Error;

use super::{KeyOrder, RbTree};
use crate::alloc::PoolKey;

/// First structural defect found by [`RbTree::check_invariants`].
///
/// `node` fields carry the pool index of the offending node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("root node {node} is red")]
    RedRoot { node: u32 },

    #[error("red node {node} has a red parent")]
    RedRedParent { node: u32 },

    #[error("black height differs below node {node}: left {left}, right {right}")]
    BlackHeightMismatch { node: u32, left: usize, right: usize },

    #[error("node {node} is ordered before its in-order predecessor")]
    OutOfOrder { node: u32 },

    #[error("node {node} does not point back at its parent")]
    BrokenParentLink { node: u32 },

    #[error("tree reports {reported} nodes but {reachable} are reachable")]
    LengthMismatch { reported: usize, reachable: usize },
}

impl<K, T, O: KeyOrder<K>> RbTree<K, T, O> {
    /// Walks the whole tree and verifies every red-black property.
    ///
    /// Returns the black height of the tree (black nodes on any root-to-leaf
    /// path, the sentinel excluded). Meant for tests and debug assertions; the
    /// walk is linear in the number of nodes.
    pub fn check_invariants(&self) -> Result<usize, InvariantViolation> {
        if self.is_empty() {
            return if self.len == 0 {
                Ok(0)
            } else {
                Err(InvariantViolation::LengthMismatch {
                    reported: self.len,
                    reachable: 0,
                })
            };
        }

        if self.is_red(self.root) {
            return Err(InvariantViolation::RedRoot {
                node: self.root.index(),
            });
        }
        if self.parent(self.root) != self.sentinel {
            return Err(InvariantViolation::BrokenParentLink {
                node: self.root.index(),
            });
        }

        let mut in_order = Vec::with_capacity(self.len);
        let black_height = self.check_subtree(self.root, &mut in_order)?;

        if in_order.len() != self.len {
            return Err(InvariantViolation::LengthMismatch {
                reported: self.len,
                reachable: in_order.len(),
            });
        }

        for pair in in_order.windows(2) {
            if self.order.precedes(self.key_of(pair[1]), self.key_of(pair[0])) {
                return Err(InvariantViolation::OutOfOrder {
                    node: pair[1].index(),
                });
            }
        }

        Ok(black_height)
    }

    fn check_subtree(
        &self,
        node: PoolKey,
        in_order: &mut Vec<PoolKey>,
    ) -> Result<usize, InvariantViolation> {
        if node == self.sentinel {
            return Ok(0);
        }

        let (left, right) = (self.left(node), self.right(node));
        for child in [left, right] {
            if child == self.sentinel {
                continue;
            }
            if self.parent(child) != node {
                return Err(InvariantViolation::BrokenParentLink {
                    node: child.index(),
                });
            }
            if self.is_red(node) && self.is_red(child) {
                return Err(InvariantViolation::RedRedParent {
                    node: child.index(),
                });
            }
        }

        let left_height = self.check_subtree(left, in_order)?;
        in_order.push(node);
        let right_height = self.check_subtree(right, in_order)?;

        if left_height != right_height {
            return Err(InvariantViolation::BlackHeightMismatch {
                node: node.index(),
                left: left_height,
                right: right_height,
            });
        }

        Ok(left_height + usize::from(self.is_black(node)))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::rbtree::{Color, NodeHandle, TimerOrder};

    #[test]
    fn detects_red_root() {
        let mut tree: RbTree<u32, ()> = RbTree::new();
        tree.insert(1, ());
        let root = tree.root;
        tree.set_color(root, Color::Red);
        assert_eq!(
            tree.check_invariants(),
            Err(InvariantViolation::RedRoot { node: root.index() })
        );
    }

    #[test]
    fn detects_black_height_mismatch() {
        let mut tree: RbTree<u32, ()> = RbTree::new();
        tree.insert(2, ());
        let left = tree.insert(1, ());
        tree.insert(3, ());
        tree.set_color(left.0, Color::Black);
        assert!(matches!(
            tree.check_invariants(),
            Err(InvariantViolation::BlackHeightMismatch { .. })
        ));
    }

    #[test]
    fn black_height_grows_logarithmically() {
        let mut tree: RbTree<u32, ()> = RbTree::new();
        for key in 0..1024 {
            tree.insert(key, ());
        }
        let height = tree.check_invariants().unwrap();
        // A red-black tree with n nodes has black height at most log2(n + 1).
        assert!(height >= 5 && height <= 11, "black height {height}");
    }

    #[derive(Debug, Clone)]
    enum Op {
        Insert(u32),
        Delete(usize),
    }

    fn ops() -> impl Strategy<Value = Vec<Op>> {
        prop::collection::vec(
            prop_oneof![
                3 => (0u32..256).prop_map(Op::Insert),
                2 => any::<usize>().prop_map(Op::Delete),
            ],
            1..300,
        )
    }

    proptest! {
        #[test]
        fn random_insert_delete_keeps_invariants(ops in ops()) {
            let mut tree: RbTree<u32, u32> = RbTree::new();
            let mut live: Vec<(NodeHandle, u32)> = Vec::new();

            for op in ops {
                match op {
                    Op::Insert(key) => live.push((tree.insert(key, key * 2), key)),
                    Op::Delete(pick) if !live.is_empty() => {
                        let (handle, key) = live.swap_remove(pick % live.len());
                        prop_assert_eq!(tree.delete(handle), (key, key * 2));
                    }
                    Op::Delete(_) => {}
                }
                prop_assert!(tree.check_invariants().is_ok());
            }

            let mut expected: Vec<u32> = live.iter().map(|(_, key)| *key).collect();
            expected.sort_unstable();
            let actual: Vec<u32> = tree.iter().map(|(_, key, _)| *key).collect();
            prop_assert_eq!(actual, expected);
            for (handle, key) in &live {
                prop_assert_eq!(tree.key(*handle), key);
            }
        }

        #[test]
        fn timer_keys_near_wrap_keep_invariants(
            base in (u32::MAX - 4096)..=u32::MAX,
            offsets in prop::collection::vec(0u32..(1 << 20), 1..200),
            drop_every in 2usize..5,
        ) {
            let mut tree: RbTree<u32, u32, TimerOrder> = RbTree::new();
            let mut live = Vec::new();
            for (i, offset) in offsets.iter().enumerate() {
                let handle = tree.insert(base.wrapping_add(*offset), *offset);
                if i % drop_every == 0 {
                    tree.delete(handle);
                } else {
                    live.push(*offset);
                }
                prop_assert!(tree.check_invariants().is_ok());
            }

            live.sort_unstable();
            let actual: Vec<u32> = tree.iter().map(|(_, _, offset)| *offset).collect();
            prop_assert_eq!(actual, live);
        }
    }
}

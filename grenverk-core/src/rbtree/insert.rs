use tracing::trace;

use super::{Color, KeyOrder, NodeHandle, RbNode, RbTree};
use crate::alloc::PoolKey;

impl<K, T, O: KeyOrder<K>> RbTree<K, T, O> {
    /// Inserts `key` with its payload and returns the handle of the new node.
    ///
    /// Duplicate keys are allowed; a new key equal to an existing one is placed
    /// after it.
    pub fn insert(&mut self, key: K, value: T) -> NodeHandle {
        let sentinel = self.sentinel;
        let node = self
            .nodes
            .allocate(RbNode {
                color: Color::Red,
                parent: sentinel,
                left: sentinel,
                right: sentinel,
                entry: Some((key, value)),
            })
            .unwrap_or_else(|err| panic!("red-black tree node allocation failed: {err}"));
        self.len += 1;

        if self.root == sentinel {
            self.set_color(node, Color::Black);
            self.root = node;
            return self.handle(node);
        }

        self.insert_by_order(node);
        self.insert_fixup(node);

        self.handle(node)
    }

    /// Plain binary-search-tree descent using the configured order.
    fn insert_by_order(&mut self, node: PoolKey) {
        let sentinel = self.sentinel;
        let mut temp = self.root;
        let mut depth = 0usize;

        loop {
            let go_left = self.order.precedes(self.key_of(node), self.key_of(temp));
            let next = if go_left {
                self.left(temp)
            } else {
                self.right(temp)
            };

            if next == sentinel {
                if go_left {
                    self.set_left(temp, node);
                } else {
                    self.set_right(temp, node);
                }
                break;
            }

            temp = next;
            depth += 1;
        }

        self.set_parent(node, temp);
        trace!(depth, "rbtree node linked");
    }

    fn insert_fixup(&mut self, mut node: PoolKey) {
        while node != self.root && self.is_red(self.parent(node)) {
            let parent = self.parent(node);
            let grandparent = self.parent(parent);

            if parent == self.left(grandparent) {
                let uncle = self.right(grandparent);

                if self.is_red(uncle) {
                    self.set_color(parent, Color::Black);
                    self.set_color(uncle, Color::Black);
                    self.set_color(grandparent, Color::Red);
                    node = grandparent;
                } else {
                    if node == self.right(parent) {
                        node = parent;
                        self.left_rotate(node);
                    }

                    let parent = self.parent(node);
                    let grandparent = self.parent(parent);
                    self.set_color(parent, Color::Black);
                    self.set_color(grandparent, Color::Red);
                    self.right_rotate(grandparent);
                }
            } else {
                let uncle = self.left(grandparent);

                if self.is_red(uncle) {
                    self.set_color(parent, Color::Black);
                    self.set_color(uncle, Color::Black);
                    self.set_color(grandparent, Color::Red);
                    node = grandparent;
                } else {
                    if node == self.left(parent) {
                        node = parent;
                        self.right_rotate(node);
                    }

                    let parent = self.parent(node);
                    let grandparent = self.parent(parent);
                    self.set_color(parent, Color::Black);
                    self.set_color(grandparent, Color::Red);
                    self.left_rotate(grandparent);
                }
            }
        }

        let root = self.root;
        self.set_color(root, Color::Black);
    }
}

use tracing::trace;

use super::{Color, KeyOrder, NodeHandle, RbTree};
use crate::alloc::PoolKey;

impl<K, T, O: KeyOrder<K>> RbTree<K, T, O> {
    /// Unlinks the node behind `handle` and returns its key and payload.
    ///
    /// Every other handle stays valid: when the node has two children its
    /// in-order successor is moved into its position rather than swapping
    /// entries between nodes.
    ///
    /// # Panics
    ///
    /// Panics if `handle` was already deleted or belongs to another tree.
    pub fn delete(&mut self, handle: NodeHandle) -> (K, T) {
        self.assert_live(handle);

        let sentinel = self.sentinel;
        let node = handle.0;

        let (subst, temp) = if self.left(node) == sentinel {
            (node, self.right(node))
        } else if self.right(node) == sentinel {
            (node, self.left(node))
        } else {
            let subst = self.subtree_min(self.right(node));
            (subst, self.right(subst))
        };

        if subst == self.root {
            self.root = temp;
            self.set_color(temp, Color::Black);
            self.set_parent(temp, sentinel);
            return self.release(node);
        }

        let removed_red = self.is_red(subst);

        let subst_parent = self.parent(subst);
        if subst == self.left(subst_parent) {
            self.set_left(subst_parent, temp);
        } else {
            self.set_right(subst_parent, temp);
        }

        if subst == node {
            // May write the sentinel's parent; the fixup below reads it back.
            self.set_parent(temp, subst_parent);
        } else {
            if subst_parent == node {
                self.set_parent(temp, subst);
            } else {
                self.set_parent(temp, subst_parent);
            }

            let (left, right, parent) = (self.left(node), self.right(node), self.parent(node));
            self.set_left(subst, left);
            self.set_right(subst, right);
            self.set_parent(subst, parent);
            self.set_color(subst, self.color(node));

            self.replace_child(node, subst);

            if left != sentinel {
                self.set_parent(left, subst);
            }
            if right != sentinel {
                self.set_parent(right, subst);
            }
        }

        let entry = self.release(node);

        if !removed_red {
            self.delete_fixup(temp);
        }
        self.set_parent(sentinel, sentinel);

        entry
    }

    fn release(&mut self, node: PoolKey) -> (K, T) {
        self.len -= 1;
        trace!(remaining = self.len, "rbtree node released");
        match self.nodes.release(node).entry {
            Some(entry) => entry,
            None => unreachable!("attempted to release the sentinel"),
        }
    }

    fn delete_fixup(&mut self, mut temp: PoolKey) {
        while temp != self.root && self.is_black(temp) {
            let parent = self.parent(temp);

            if temp == self.left(parent) {
                let mut sibling = self.right(parent);

                if self.is_red(sibling) {
                    self.set_color(sibling, Color::Black);
                    self.set_color(parent, Color::Red);
                    self.left_rotate(parent);
                    sibling = self.right(self.parent(temp));
                }

                if self.is_black(self.left(sibling)) && self.is_black(self.right(sibling)) {
                    self.set_color(sibling, Color::Red);
                    temp = self.parent(temp);
                } else {
                    if self.is_black(self.right(sibling)) {
                        let near = self.left(sibling);
                        self.set_color(near, Color::Black);
                        self.set_color(sibling, Color::Red);
                        self.right_rotate(sibling);
                        sibling = self.right(self.parent(temp));
                    }

                    let parent = self.parent(temp);
                    self.set_color(sibling, self.color(parent));
                    self.set_color(parent, Color::Black);
                    let far = self.right(sibling);
                    self.set_color(far, Color::Black);
                    self.left_rotate(parent);
                    temp = self.root;
                }
            } else {
                let mut sibling = self.left(parent);

                if self.is_red(sibling) {
                    self.set_color(sibling, Color::Black);
                    self.set_color(parent, Color::Red);
                    self.right_rotate(parent);
                    sibling = self.left(self.parent(temp));
                }

                if self.is_black(self.left(sibling)) && self.is_black(self.right(sibling)) {
                    self.set_color(sibling, Color::Red);
                    temp = self.parent(temp);
                } else {
                    if self.is_black(self.left(sibling)) {
                        let near = self.right(sibling);
                        self.set_color(near, Color::Black);
                        self.set_color(sibling, Color::Red);
                        self.left_rotate(sibling);
                        sibling = self.left(self.parent(temp));
                    }

                    let parent = self.parent(temp);
                    self.set_color(sibling, self.color(parent));
                    self.set_color(parent, Color::Black);
                    let far = self.left(sibling);
                    self.set_color(far, Color::Black);
                    self.right_rotate(parent);
                    temp = self.root;
                }
            }
        }

        self.set_color(temp, Color::Black);
    }
}

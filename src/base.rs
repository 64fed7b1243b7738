//! Unbalanced ordered-tree walks: search, leftmost/rightmost descent, ordered visitation and
//! teardown. None of these touch heights.

use core::{borrow::Borrow, cmp::Ordering, ptr::NonNull};

use crate::{AvlTree, Dir, Link, Links, TreeNode};

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    pub(crate) fn get_raw<Q>(&self, key: &Q) -> Link<T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut opt_cur = self.root;

        loop {
            let cur = opt_cur?;

            unsafe {
                match key.cmp(cur.as_ref().key().borrow()) {
                    Ordering::Less => opt_cur = T::links(cur).as_ref().left(),
                    Ordering::Equal => return Some(cur),
                    Ordering::Greater => opt_cur = T::links(cur).as_ref().right(),
                }
            }
        }
    }

    // Returns the leftmost (`Dir::Left`) or rightmost (`Dir::Right`) node in the subtree.
    #[inline]
    pub(crate) unsafe fn extreme(&self, root: NonNull<T>, dir: Dir) -> NonNull<T> {
        let mut cur = root;

        while let Some(next) = unsafe { T::links(cur).as_ref().child(dir) } {
            cur = next;
        }

        cur
    }

    /// Visits every element in key order.
    ///
    /// Visitation recurses left-node-right, so its depth is bounded by the height of the tree.
    pub fn for_each_inorder<'a, F>(&'a self, mut f: F)
    where
        F: FnMut(&'a T),
    {
        fn walk<'a, T, F>(node: Link<T>, f: &mut F)
        where
            T: TreeNode<Links<T>> + ?Sized + 'a,
            F: FnMut(&'a T),
        {
            let Some(node) = node else {
                return;
            };

            unsafe {
                walk(T::links(node).as_ref().left(), f);
                f(node.as_ref());
                walk(T::links(node).as_ref().right(), f);
            }
        }

        walk(self.root, &mut f);
    }

    /// Visits every element in pre-order: node, left subtree, right subtree.
    pub fn for_each_preorder<'a, F>(&'a self, mut f: F)
    where
        F: FnMut(&'a T),
    {
        fn walk<'a, T, F>(node: Link<T>, f: &mut F)
        where
            T: TreeNode<Links<T>> + ?Sized + 'a,
            F: FnMut(&'a T),
        {
            let Some(node) = node else {
                return;
            };

            unsafe {
                f(node.as_ref());
                walk(T::links(node).as_ref().left(), f);
                walk(T::links(node).as_ref().right(), f);
            }
        }

        walk(self.root, &mut f);
    }

    // Releases every node without recursion or rebalancing, leaving the tree empty.
    pub(crate) unsafe fn drain_nodes(&mut self) {
        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            unsafe {
                // Descend to the minimum node.
                let cur = self.extreme(cur, Dir::Left);
                let parent = T::links(cur).as_ref().parent();
                let right = T::links(cur).as_ref().right();

                // Elevate the node's right child (which may be None) into its slot.
                match parent {
                    Some(parent) => {
                        T::links(parent).as_mut().set_left(right);
                    }
                    None => self.root = right,
                }
                self.maybe_set_parent(right, parent);

                drop(T::from_ptr(cur));
                self.len -= 1;

                // If the node had no right child, climb to the parent. If the node had no parent,
                // the tree is empty.
                opt_cur = right.or(parent);
            }
        }
    }
}

use core::iter::FusedIterator;

use crate::{AvlTree, Dir, Link, Links, TreeNode};

enum CameFrom {
    Parent,
    LeftChild,
    Here,
    RightChild,
}

/// An in-order iterator over the elements of an [`AvlTree`].
///
/// Walks child and parent links directly, so each step is _O(1)_ amortized and no stack is kept.
pub struct Iter<'tree, T: TreeNode<Links<T>> + ?Sized> {
    tree: &'tree AvlTree<T>,

    front_cur: Link<T>,
    front_from: CameFrom,

    len: usize,
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Iter<'tree, T> {
    pub(crate) fn new(tree: &'tree AvlTree<T>) -> Self {
        Iter {
            tree,

            front_cur: tree.root,
            front_from: CameFrom::Parent,
            len: tree.len(),
        }
    }
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Iterator for Iter<'tree, T> {
    type Item = &'tree T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }

        let mut cur = self.front_cur?;

        loop {
            match self.front_from {
                CameFrom::Parent => {
                    // Upon entering a new subtree, find the minimum element.
                    cur = unsafe { self.tree.extreme(cur, Dir::Left) };

                    // Once the minimum is found, its (empty) left subtree has been exhausted.
                    self.front_from = CameFrom::LeftChild;
                }

                CameFrom::LeftChild => {
                    self.front_cur = Some(cur);
                    self.front_from = CameFrom::Here;
                    self.len -= 1;

                    return Some(unsafe { cur.as_ref() });
                }

                CameFrom::Here => {
                    if let Some(right) = unsafe { T::links(cur).as_ref().right() } {
                        self.front_from = CameFrom::Parent;

                        cur = right;
                    } else if let Some(parent) = unsafe { T::links(cur).as_ref().parent() } {
                        self.front_from = match unsafe { self.tree.which_child(parent, cur) } {
                            Dir::Left => CameFrom::LeftChild,
                            Dir::Right => CameFrom::RightChild,
                        };

                        cur = parent;
                    } else {
                        // The root was yielded last and has no right subtree.
                        unreachable!("iterator outlived the tree's length")
                    }
                }

                CameFrom::RightChild => {
                    // Ascend until we find the successor element.
                    while let Some(parent) = unsafe { T::links(cur).as_ref().parent() } {
                        let dir = unsafe { self.tree.which_child(parent, cur) };
                        cur = parent;

                        if dir == Dir::Left {
                            break;
                        }
                    }

                    self.front_from = CameFrom::LeftChild;
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<T: TreeNode<Links<T>> + ?Sized> ExactSizeIterator for Iter<'_, T> {}

impl<T: TreeNode<Links<T>> + ?Sized> FusedIterator for Iter<'_, T> {}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> IntoIterator for &'tree AvlTree<T> {
    type Item = &'tree T;
    type IntoIter = Iter<'tree, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

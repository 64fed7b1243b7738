//! Full-tree consistency checks.
//!
//! These walk every node and are meant for tests and debugging; no mutating operation calls
//! them.

use core::ptr::NonNull;

use crate::{AvlTree, Link, Links, TreeNode};

/// The first structural property found broken in an [`AvlTree`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    #[error("cached height {cached} does not match computed height {computed}")]
    Height { cached: i8, computed: i8 },

    #[error("balance factor {balance} is outside -1..=1")]
    Balance { balance: i8 },

    #[error("in-order keys are not non-decreasing")]
    Order,

    #[error("child's parent link does not point at the node holding it")]
    ParentMismatch,

    #[error("root node has a parent link")]
    RootHasParent,

    #[error("tree holds {counted} nodes but records a length of {len}")]
    Len { counted: usize, len: usize },
}

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Checks every invariant of the tree, reporting the first violation found.
    ///
    /// This operation completes in _O(n)_ time.
    pub fn check_invariants(&self) -> Result<(), Violation> {
        let Some(root) = self.root else {
            return match self.len {
                0 => Ok(()),
                len => Err(Violation::Len { counted: 0, len }),
            };
        };

        unsafe {
            if T::links(root).as_ref().parent().is_some() {
                return Err(Violation::RootHasParent);
            }

            let mut prev = None;
            let mut counted = 0;
            self.check_at(root, &mut prev, &mut counted)?;

            if counted != self.len {
                return Err(Violation::Len {
                    counted,
                    len: self.len,
                });
            }
        }

        Ok(())
    }

    /// Returns `true` if every invariant of the tree holds.
    pub fn is_valid(&self) -> bool {
        self.check_invariants().is_ok()
    }

    #[doc(hidden)]
    #[track_caller]
    pub fn assert_invariants(&self) {
        if let Err(violation) = self.check_invariants() {
            panic!("AVL invariant violated: {violation}");
        }
    }

    /// Returns `true` if in-order keys are non-decreasing, ignoring heights and parent links.
    pub fn is_ordered(&self) -> bool {
        let mut prev: Option<&T::Key> = None;
        let mut ordered = true;

        self.for_each_inorder(|node| {
            let key = node.key();
            if prev.is_some_and(|prev| prev > key) {
                ordered = false;
            }
            prev = Some(key);
        });

        ordered
    }

    // Checks the subtree rooted at `node` in order, returning its computed height.
    //
    // `prev` holds the last key visited, `counted` the number of nodes visited so far.
    #[allow(clippy::only_used_in_recursion)]
    unsafe fn check_at<'a>(
        &'a self,
        node: NonNull<T>,
        prev: &mut Option<&'a T::Key>,
        counted: &mut usize,
    ) -> Result<i8, Violation> {
        unsafe {
            let links = T::links(node).as_ref();

            let left = self.check_child(node, links.left(), prev, counted)?;

            let key = node.as_ref().key();
            if prev.is_some_and(|prev| prev > key) {
                return Err(Violation::Order);
            }
            *prev = Some(key);
            *counted += 1;

            let right = self.check_child(node, links.right(), prev, counted)?;

            let computed = 1 + left.max(right);
            let cached = links.height();
            if cached != computed {
                return Err(Violation::Height { cached, computed });
            }

            let balance = left - right;
            if !(-1..=1).contains(&balance) {
                return Err(Violation::Balance { balance });
            }

            Ok(computed)
        }
    }

    unsafe fn check_child<'a>(
        &'a self,
        parent: NonNull<T>,
        child: Link<T>,
        prev: &mut Option<&'a T::Key>,
        counted: &mut usize,
    ) -> Result<i8, Violation> {
        let Some(child) = child else {
            return Ok(-1);
        };

        unsafe {
            if T::links(child).as_ref().parent() != Some(parent) {
                return Err(Violation::ParentMismatch);
            }

            self.check_at(child, prev, counted)
        }
    }
}

//! An intrusive AVL tree.
//!
//! Every node caches the height of its subtree. An absent child has height `-1`, so a leaf has
//! height `0` and the height of any node `x` is `1 + max(h(left(x)), h(right(x)))`.
//!
//! The balance factor of a node is `h(left) - h(right)`. The tree maintains, after every public
//! operation returns:
//!
//! 1. In-order keys are non-decreasing. Equal keys are inserted to the right.
//! 2. Every balance factor is in `-1..=1`.
//! 3. Every cached height is correct.
//! 4. Every non-root node's parent link points at the node whose child slot holds it, and the
//!    root has no parent.
//!
//! Mutation is done by recursive descent. Each level returns the (possibly rotated) root of its
//! subtree to the caller, which reattaches it. Parent links are kept in sync inside the rotation
//! primitive but are never consulted to make a balancing decision.
#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

use core::{
    borrow::Borrow, cell::UnsafeCell, cmp::Ordering, fmt, marker::PhantomPinned, mem, ops::Not,
    pin::Pin, ptr::NonNull,
};

use cordyceps::Linked;

mod base;
mod debug;
mod iter;
pub mod validate;

#[cfg(feature = "alloc")]
mod set;

#[cfg(any(all(test, feature = "std"), feature = "model"))]
pub mod model;

#[cfg(all(test, feature = "std"))]
mod tests;

pub use iter::Iter;
pub use validate::Violation;

#[cfg(feature = "alloc")]
pub use set::{AvlSet, NodeRef};

pub trait TreeNode<L>: Linked<L> {
    type Key: Ord;

    fn key(&self) -> &Self::Key;
}

/// An intrusive AVL tree.
///
/// The tree owns every node reachable from its root through child links. Nodes enter the tree as
/// a [`Linked::Handle`] and leave it the same way.
pub struct AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    root: Link<T>,
    len: usize,
}

pub struct Links<T: ?Sized> {
    inner: UnsafeCell<LinksInner<T>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Dir {
    Left = 0,
    Right = 1,
}

impl Not for Dir {
    type Output = Dir;

    fn not(self) -> Self::Output {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }
}

#[repr(C)]
struct LinksInner<T: ?Sized> {
    parent: Link<T>,
    children: [Link<T>; 2],
    height: i8,
    _unpin: PhantomPinned,
}

type Link<T> = Option<NonNull<T>>;

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns a new empty tree.
    pub const fn new() -> AvlTree<T> {
        AvlTree { root: None, len: 0 }
    }

    /// Returns `true` if the tree contains no elements.
    pub const fn is_empty(&self) -> bool {
        let empty = self.len() == 0;

        if cfg!(debug_assertions) {
            // Can't use assert_eq!() in const fn.
            assert!(empty == self.root.is_none());
        }

        empty
    }

    /// Returns the number of elements in the tree.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns the height of the tree, or `-1` if it is empty.
    pub fn height(&self) -> i8 {
        unsafe { self.height_of(self.root) }
    }

    /// Returns a reference to a node whose key compares equal to `key`.
    ///
    /// If several nodes share the key, the one closest to the root is returned.
    pub fn get<Q>(&self, key: &Q) -> Option<Pin<&T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let ptr = self.get_raw(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_ref())) }
    }

    /// Returns `true` if the tree contains a node whose key compares equal to `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get_raw(key).is_some()
    }

    /// Returns the minimum element of the tree.
    pub fn first(&self) -> Option<Pin<&T>> {
        let first = unsafe { self.extreme(self.root?, Dir::Left) };
        unsafe { Some(Pin::new_unchecked(first.as_ref())) }
    }

    /// Returns the maximum element of the tree.
    pub fn last(&self) -> Option<Pin<&T>> {
        let last = unsafe { self.extreme(self.root?, Dir::Right) };
        unsafe { Some(Pin::new_unchecked(last.as_ref())) }
    }

    /// Returns an in-order iterator over the tree.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self)
    }

    /// Inserts an item into the tree.
    ///
    /// Items whose key compares equal to an existing key are placed to its right. Insertion is
    /// never rejected.
    ///
    /// This operation completes in _O(log(n))_ time and performs at most one single or double
    /// rotation.
    pub fn insert(&mut self, item: T::Handle) {
        let ptr = T::into_ptr(item);

        unsafe {
            let root = self.insert_at(self.root, None, ptr);
            self.set_root(Some(root));
        }

        self.len += 1;
    }

    // Inserts `item` into the subtree rooted at `opt_node`, whose parent is `parent`.
    //
    // Returns the root of the rebalanced subtree. Its parent link is already set to `parent`.
    unsafe fn insert_at(
        &mut self,
        opt_node: Link<T>,
        parent: Link<T>,
        item: NonNull<T>,
    ) -> NonNull<T> {
        let Some(node) = opt_node else {
            unsafe {
                let links = T::links(item).as_mut();
                links.set_parent(parent);
                links.set_left(None);
                links.set_right(None);
                links.set_height(0);
            }

            return item;
        };

        unsafe {
            let dir = match item.as_ref().key().cmp(node.as_ref().key()) {
                Ordering::Less => Dir::Left,
                Ordering::Equal | Ordering::Greater => Dir::Right,
            };

            let child = T::links(node).as_ref().child(dir);
            let new_child = self.insert_at(child, Some(node), item);
            T::links(node).as_mut().set_child(dir, Some(new_child));

            self.rebalance(node)
        }
    }

    /// Removes a node whose key compares equal to `key`, returning it.
    ///
    /// If several nodes share the key, the one closest to the root is removed. Returns `None` if
    /// no node matches.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<T::Handle>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        unsafe {
            let (root, removed) = self.remove_at(self.root, key);
            let removed = removed?;
            self.set_root(root);
            Some(self.release(removed))
        }
    }

    /// Removes and returns the minimum element of the tree.
    pub fn pop_first(&mut self) -> Option<T::Handle> {
        self.pop_extreme(Dir::Left)
    }

    /// Removes and returns the maximum element of the tree.
    pub fn pop_last(&mut self) -> Option<T::Handle> {
        self.pop_extreme(Dir::Right)
    }

    fn pop_extreme(&mut self, dir: Dir) -> Option<T::Handle> {
        let root = self.root?;

        unsafe {
            let (root, removed) = self.remove_extreme_at(root, dir);
            self.set_root(root);
            Some(self.release(removed))
        }
    }

    // Removes the node matching `key` from the subtree rooted at `opt_node`.
    //
    // Returns the root of the rebalanced subtree and the unlinked node, if any. When nothing is
    // removed the subtree is left untouched.
    unsafe fn remove_at<Q>(&mut self, opt_node: Link<T>, key: &Q) -> (Link<T>, Link<T>)
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let Some(node) = opt_node else {
            return (None, None);
        };

        unsafe {
            let dir = match key.cmp(node.as_ref().key().borrow()) {
                Ordering::Less => Dir::Left,
                Ordering::Greater => Dir::Right,
                Ordering::Equal => return (self.unlink(node), Some(node)),
            };

            let child = T::links(node).as_ref().child(dir);
            let (new_child, removed) = self.remove_at(child, key);
            if removed.is_none() {
                return (Some(node), None);
            }

            T::links(node).as_mut().set_child(dir, new_child);
            self.maybe_set_parent(new_child, Some(node));

            (Some(self.rebalance(node)), removed)
        }
    }

    // Removes the leftmost (`Dir::Left`) or rightmost (`Dir::Right`) node of the subtree rooted
    // at `node`.
    //
    // Returns the root of the rebalanced subtree and the unlinked node.
    unsafe fn remove_extreme_at(&mut self, node: NonNull<T>, dir: Dir) -> (Link<T>, NonNull<T>) {
        unsafe {
            let Some(child) = T::links(node).as_ref().child(dir) else {
                // `node` is the extreme. It has at most one child, on the opposite side.
                let other = T::links(node).as_ref().child(!dir);
                self.maybe_set_parent(other, T::links(node).as_ref().parent());
                return (other, node);
            };

            let (new_child, removed) = self.remove_extreme_at(child, dir);
            T::links(node).as_mut().set_child(dir, new_child);
            self.maybe_set_parent(new_child, Some(node));

            (Some(self.rebalance(node)), removed)
        }
    }

    // Detaches `node` from its subtree, returning the root of what replaces it.
    //
    // The replacement's parent link is set to `node`'s parent.
    unsafe fn unlink(&mut self, node: NonNull<T>) -> Link<T> {
        unsafe {
            let links = T::links(node).as_ref();
            let parent = links.parent();

            match (links.left(), links.right()) {
                (None, None) => None,

                (Some(child), None) | (None, Some(child)) => {
                    T::links(child).as_mut().set_parent(parent);
                    Some(child)
                }

                (Some(left), Some(right)) => {
                    // The in-order successor takes the place of `node`. Removing it from the right
                    // subtree rebalances that path first.
                    let (new_right, successor) = self.remove_extreme_at(right, Dir::Left);

                    let successor_links = T::links(successor).as_mut();
                    successor_links.set_parent(parent);
                    successor_links.set_left(Some(left));
                    successor_links.set_right(new_right);
                    T::links(left).as_mut().set_parent(Some(successor));
                    self.maybe_set_parent(new_right, Some(successor));

                    Some(self.rebalance(successor))
                }
            }
        }
    }

    // Recomputes the height of `node` and restores its balance with at most two rotations.
    //
    // Returns the new root of the subtree formerly rooted at `node`. Both children of `node` must
    // already be balanced with correct heights.
    unsafe fn rebalance(&mut self, node: NonNull<T>) -> NonNull<T> {
        unsafe {
            self.update_height(node);

            let balance = self.balance(node);
            let heavy = match balance {
                -1..=1 => return node,
                2.. => Dir::Left,
                _ => Dir::Right,
            };

            let child = T::links(node)
                .as_ref()
                .child(heavy)
                .expect("heavy side of an unbalanced node must be present");

            // The heavy child leans away from `node`'s heavy side: zig-zag, rotate it first. A
            // child with balance 0 only occurs on removal and takes the single rotation.
            let child_balance = self.balance(child);
            let zig_zag = match heavy {
                Dir::Left => child_balance < 0,
                Dir::Right => child_balance > 0,
            };

            tracing::trace!(?heavy, balance, child_balance, zig_zag, "rebalance");

            if zig_zag {
                let new_child = self.rotate(child, heavy);
                T::links(node).as_mut().set_child(heavy, Some(new_child));
            }

            let up = self.rotate(node, !heavy);
            debug_assert!(
                (-1..=1).contains(&self.balance(up)),
                "subtree still unbalanced after rotation"
            );

            up
        }
    }

    // Rotates the subtree rooted at `down` in direction `dir`.
    //
    // The child of `down` on the side opposite `dir` moves up to take its place. For a left
    // rotation at `z` with right child `y`: `y` becomes the subtree root, `y`'s left child becomes
    // `z`'s right child, and `z` becomes `y`'s left child.
    //
    // Parent links of the three affected nodes are resynchronized, and the heights of `down` and
    // then the new root are recomputed. The slot that pointed at `down` is not updated; the new
    // root is returned for the caller to reattach.
    unsafe fn rotate(&mut self, down: NonNull<T>, dir: Dir) -> NonNull<T> {
        unsafe {
            let up = T::links(down)
                .as_ref()
                .child(!dir)
                .expect("rotation pivot must have a child to lift");

            let across = T::links(up).as_ref().child(dir);
            T::links(down).as_mut().set_child(!dir, across);
            self.maybe_set_parent(across, Some(down));

            T::links(up).as_mut().set_child(dir, Some(down));
            let parent = T::links(down).as_mut().set_parent(Some(up));
            T::links(up).as_mut().set_parent(parent);

            self.update_height(down);
            self.update_height(up);

            tracing::trace!(?dir, height = T::links(up).as_ref().height(), "rotate");

            up
        }
    }

    /// Clears the tree, removing all elements.
    pub fn clear(&mut self) {
        let released = self.len;

        unsafe { self.drain_nodes() };

        tracing::debug!(released, "clear");

        debug_assert!(self.root.is_none());
        debug_assert_eq!(self.len(), 0);
    }

    // Support methods ========================================================

    #[inline]
    unsafe fn set_root(&mut self, root: Link<T>) {
        if root != self.root {
            tracing::trace!(empty = root.is_none(), "replace root");
        }

        self.maybe_set_parent(root, None);
        self.root = root;
    }

    // Converts an unlinked node back into its handle.
    unsafe fn release(&mut self, node: NonNull<T>) -> T::Handle {
        unsafe {
            let links = T::links(node).as_mut();
            links.set_parent(None);
            links.set_left(None);
            links.set_right(None);
            links.set_height(0);

            self.len -= 1;

            T::from_ptr(node)
        }
    }

    unsafe fn maybe_set_parent(&mut self, opt_node: Link<T>, parent: Link<T>) {
        let Some(node) = opt_node else {
            return;
        };

        unsafe { T::links(node).as_mut().set_parent(parent) };
    }

    /// Returns the height of the pointed-to node, or `-1` if there is none.
    unsafe fn height_of(&self, node: Link<T>) -> i8 {
        node.map(|n| unsafe { T::links(n).as_ref().height() })
            .unwrap_or(-1)
    }

    unsafe fn balance(&self, node: NonNull<T>) -> i8 {
        unsafe {
            let links = T::links(node).as_ref();
            self.height_of(links.left()) - self.height_of(links.right())
        }
    }

    #[inline]
    unsafe fn update_height(&mut self, node: NonNull<T>) {
        unsafe {
            let links = T::links(node).as_mut();
            let tallest = self.height_of(links.left()).max(self.height_of(links.right()));
            let height = tallest.checked_add(1).expect("tree height overflow");
            links.set_height(height);
        }
    }

    unsafe fn which_child(&self, parent: NonNull<T>, child: NonNull<T>) -> Dir {
        if unsafe { T::links(parent).as_ref().left() } == Some(child) {
            Dir::Left
        } else {
            Dir::Right
        }
    }
}

impl<T> Default for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T: ?Sized> Links<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: UnsafeCell::new(LinksInner {
                parent: None,
                children: [None; 2],
                height: 0,
                _unpin: PhantomPinned,
            }),
        }
    }

    #[inline]
    fn height(&self) -> i8 {
        unsafe { (*self.inner.get()).height }
    }

    #[inline]
    fn parent(&self) -> Link<T> {
        unsafe { (*self.inner.get()).parent }
    }

    #[inline]
    fn child(&self, dir: Dir) -> Link<T> {
        unsafe { (*self.inner.get()).children[dir as usize] }
    }

    #[inline]
    fn left(&self) -> Link<T> {
        self.child(Dir::Left)
    }

    #[inline]
    fn right(&self) -> Link<T> {
        self.child(Dir::Right)
    }

    #[inline]
    fn set_parent(&mut self, parent: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().parent, parent)
    }

    #[inline]
    fn set_child(&mut self, dir: Dir, child: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().children[dir as usize], child)
    }

    #[inline]
    fn set_left(&mut self, left: Link<T>) -> Link<T> {
        self.set_child(Dir::Left, left)
    }

    #[inline]
    fn set_right(&mut self, right: Link<T>) -> Link<T> {
        self.set_child(Dir::Right, right)
    }

    #[inline]
    fn set_height(&mut self, height: i8) {
        self.inner.get_mut().height = height;
    }
}

impl<T: ?Sized> Default for Links<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Links<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Links")
            .field("parent", &self.parent())
            .field("left", &self.left())
            .field("right", &self.right())
            .field("height", &self.height())
            .finish()
    }
}

use alloc::{boxed::Box, vec::Vec};
use core::{borrow::Borrow, fmt, marker::PhantomData, pin::Pin, ptr::NonNull};

use cordyceps::Linked;

use crate::{AvlTree, Iter, Link, Links, TreeNode, Violation};

/// An ordered multiset based on an [AVL tree].
///
/// Values equal to one already present are kept alongside it, so a value inserted `k` times is
/// contained until it has been removed `k` times.
///
/// [AVL tree]: https://en.wikipedia.org/wiki/AVL_tree
pub struct AvlSet<V: Ord> {
    tree: AvlTree<SetNode<V>>,
}

struct SetNode<V> {
    links: Links<SetNode<V>>,
    value: V,
}

unsafe impl<V> Linked<Links<SetNode<V>>> for SetNode<V> {
    type Handle = Box<Self>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        Box::leak(r).into()
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<SetNode<V>>> {
        let ptr = ptr.as_ptr();
        unsafe { NonNull::new_unchecked(core::ptr::addr_of_mut!((*ptr).links)) }
    }
}

impl<V: Ord> TreeNode<Links<SetNode<V>>> for SetNode<V> {
    type Key = V;

    fn key(&self) -> &Self::Key {
        &self.value
    }
}

impl<V: Ord> AvlSet<V> {
    /// Creates a new, empty `AvlSet`.
    pub const fn new() -> Self {
        Self {
            tree: AvlTree::new(),
        }
    }

    /// Returns `true` if the set contains no elements.
    pub const fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns the number of elements in the set, counting duplicates.
    pub const fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns the height of the underlying tree, or `-1` if the set is empty.
    pub fn height(&self) -> i8 {
        self.tree.height()
    }

    /// Adds a value to the set.
    ///
    /// Duplicates are always accepted.
    #[inline]
    pub fn insert(&mut self, value: V) {
        self.tree.insert(Box::new(SetNode {
            links: Links::new(),
            value,
        }));
    }

    /// Removes one copy of `value` from the set.
    ///
    /// Returns `true` if a matching value was present.
    #[inline]
    pub fn remove<Q>(&mut self, value: &Q) -> bool
    where
        V: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.remove(value).is_some()
    }

    /// Removes one copy of `value` from the set and returns it.
    #[inline]
    pub fn take<Q>(&mut self, value: &Q) -> Option<V>
    where
        V: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.remove(value).map(|node| node.value)
    }

    /// Returns `true` if the set contains `value`.
    #[inline]
    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        V: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.contains_key(value)
    }

    /// Returns the minimum value in the set.
    #[inline]
    pub fn min(&self) -> Option<&V> {
        self.tree.first().map(|node| &Pin::get_ref(node).value)
    }

    /// Returns the maximum value in the set.
    #[inline]
    pub fn max(&self) -> Option<&V> {
        self.tree.last().map(|node| &Pin::get_ref(node).value)
    }

    /// Removes and returns the minimum value in the set.
    #[inline]
    pub fn pop_first(&mut self) -> Option<V> {
        self.tree.pop_first().map(|node| node.value)
    }

    /// Removes and returns the maximum value in the set.
    #[inline]
    pub fn pop_last(&mut self) -> Option<V> {
        self.tree.pop_last().map(|node| node.value)
    }

    /// Clears the set, removing all elements.
    #[inline]
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Returns an iterator over the values of the set, in ascending order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &V> + '_ {
        SetIter {
            inner: self.tree.iter(),
        }
    }

    /// Returns every value of the set in ascending order.
    pub fn inorder(&self) -> Vec<V>
    where
        V: Clone,
    {
        let mut values = Vec::with_capacity(self.len());
        self.tree
            .for_each_inorder(|node| values.push(node.value.clone()));
        values
    }

    /// Returns `true` if every structural invariant of the underlying tree holds.
    ///
    /// Walks the whole tree; intended for tests and debugging.
    pub fn validate(&self) -> bool {
        self.tree.is_valid()
    }

    /// Checks every structural invariant of the underlying tree, reporting the first violation.
    pub fn check_invariants(&self) -> Result<(), Violation> {
        self.tree.check_invariants()
    }

    /// Returns `true` if values are in order, without checking balance or links.
    pub fn is_valid_bst(&self) -> bool {
        self.tree.is_ordered()
    }

    /// Returns a read-only view of the root node, or `None` if the set is empty.
    pub fn root(&self) -> Option<NodeRef<'_, V>> {
        NodeRef::new(self.tree.root)
    }

    /// Renders the underlying tree as a Graphviz digraph.
    pub fn dotgraph<W>(&self, name: &str, w: W) -> fmt::Result
    where
        V: fmt::Display,
        W: fmt::Write,
    {
        self.tree.dotgraph(name, w)
    }
}

impl<V: Ord> Default for AvlSet<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Ord> Extend<V> for AvlSet<V> {
    fn extend<I: IntoIterator<Item = V>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value);
        }
    }
}

impl<V: Ord> FromIterator<V> for AvlSet<V> {
    /// Inserts every value in iteration order. The resulting shape depends on that order.
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        let mut set = AvlSet::new();
        set.extend(iter);
        set
    }
}

impl<V: Ord, const N: usize> From<[V; N]> for AvlSet<V> {
    fn from(values: [V; N]) -> Self {
        values.into_iter().collect()
    }
}

impl<V: Ord + fmt::Display> fmt::Display for AvlSet<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.tree.fmt_preorder(f)
    }
}

impl<V: Ord + fmt::Debug> fmt::Debug for AvlSet<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

struct SetIter<'a, V: Ord> {
    inner: Iter<'a, SetNode<V>>,
}

impl<'a, V: Ord> Iterator for SetIter<'a, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|node| &node.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<V: Ord> ExactSizeIterator for SetIter<'_, V> {}

/// A read-only view of one node of an [`AvlSet`].
pub struct NodeRef<'a, V> {
    node: NonNull<SetNode<V>>,
    _set: PhantomData<&'a SetNode<V>>,
}

impl<'a, V: Ord> NodeRef<'a, V> {
    fn new(link: Link<SetNode<V>>) -> Option<Self> {
        Some(NodeRef {
            node: link?,
            _set: PhantomData,
        })
    }

    fn links(&self) -> &'a Links<SetNode<V>> {
        unsafe { <SetNode<V> as Linked<Links<SetNode<V>>>>::links(self.node).as_ref() }
    }

    /// Returns the value stored in this node.
    pub fn value(&self) -> &'a V {
        unsafe { &self.node.as_ref().value }
    }

    /// Returns the cached height of this node's subtree. A leaf has height 0.
    pub fn height(&self) -> i8 {
        self.links().height()
    }

    /// Returns the balance factor, `height(left) - height(right)`, with an absent child counting
    /// as `-1`.
    pub fn balance(&self) -> i8 {
        let height = |child: Option<NodeRef<'a, V>>| child.map_or(-1, |c| c.height());
        height(self.left()) - height(self.right())
    }

    pub fn left(&self) -> Option<NodeRef<'a, V>> {
        NodeRef::new(self.links().left())
    }

    pub fn right(&self) -> Option<NodeRef<'a, V>> {
        NodeRef::new(self.links().right())
    }

    pub fn parent(&self) -> Option<NodeRef<'a, V>> {
        NodeRef::new(self.links().parent())
    }
}

impl<V> Clone for NodeRef<'_, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for NodeRef<'_, V> {}

impl<V: Ord + fmt::Debug> fmt::Debug for NodeRef<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("value", self.value())
            .field("height", &self.height())
            .finish()
    }
}

//! Reference-model equivalence testing against a `BTreeMap`-backed multiset.

extern crate std;

use std::{collections::BTreeMap, prelude::v1::*, ptr::NonNull};

use arbitrary::Arbitrary;
use cordyceps::Linked;
use proptest::strategy::{Just, Strategy};

use crate::{AvlTree, Links, TreeNode};

#[derive(Debug)]
#[repr(C)]
pub struct TestNode {
    pub links: Links<TestNode>,
    pub key: u32,
}

impl TestNode {
    pub fn new(key: u32) -> Box<TestNode> {
        Box::new(TestNode {
            links: Links::new(),
            key,
        })
    }
}

unsafe impl Linked<Links<TestNode>> for TestNode {
    type Handle = Box<TestNode>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        NonNull::new(Box::into_raw(r)).unwrap()
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<TestNode>> {
        // SAFETY: Self is #[repr(C)] and `links` is first field
        ptr.cast()
    }
}

impl TreeNode<Links<TestNode>> for TestNode {
    type Key = u32;

    fn key(&self) -> &Self::Key {
        &self.key
    }
}

/// A value operand: either an index into the values currently held, or an arbitrary value.
#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum ItemValue {
    Index(usize),
    Random(u32),
}

proptest::prop_compose! {
    fn index_strategy()(
        index in 0usize..1000,
    ) -> ItemValue {
        ItemValue::Index(index)
    }
}

proptest::prop_compose! {
    fn random_strategy()(
        random in 0u32..1000,
    ) -> ItemValue {
        ItemValue::Random(random)
    }
}

fn value_strategy() -> impl Strategy<Value = ItemValue> {
    proptest::prop_oneof![index_strategy(), random_strategy()]
}

#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum Op {
    Insert(ItemValue),
    Contains(ItemValue),
    Remove(ItemValue),
    First,
    PopFirst,
    Last,
    PopLast,
    Clear,
}

impl Op {
    fn finalize(self, sorted: &[u32]) -> FinalOp {
        fn get_value(v: &[u32], i: ItemValue) -> u32 {
            match i {
                ItemValue::Index(idx) => {
                    if v.is_empty() {
                        idx as u32
                    } else {
                        v[idx % v.len()]
                    }
                }
                ItemValue::Random(v) => v,
            }
        }

        match self {
            Op::Insert(item) => FinalOp::Insert(get_value(sorted, item)),
            Op::Contains(item) => FinalOp::Contains(get_value(sorted, item)),
            Op::Remove(item) => FinalOp::Remove(get_value(sorted, item)),
            Op::First => FinalOp::First,
            Op::PopFirst => FinalOp::PopFirst,
            Op::Last => FinalOp::Last,
            Op::PopLast => FinalOp::PopLast,
            Op::Clear => FinalOp::Clear,
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum FinalOp {
    Insert(u32),
    Contains(u32),
    Remove(u32),
    First,
    PopFirst,
    Last,
    PopLast,
    Clear,
}

pub fn op_strategy() -> impl Strategy<Value = Op> {
    proptest::prop_oneof![
        8 => value_strategy().prop_map(Op::Insert),
        4 => value_strategy().prop_map(Op::Contains),
        6 => value_strategy().prop_map(Op::Remove),
        1 => Just(Op::First),
        1 => Just(Op::PopFirst),
        1 => Just(Op::Last),
        1 => Just(Op::PopLast),
        1 => Just(Op::Clear),
    ]
}

/// A multiset of `u32` values that keeps the count of each value.
#[derive(Default)]
struct Multiset {
    counts: BTreeMap<u32, usize>,
    len: usize,
}

impl Multiset {
    fn insert(&mut self, value: u32) {
        *self.counts.entry(value).or_default() += 1;
        self.len += 1;
    }

    fn remove(&mut self, value: u32) -> bool {
        let Some(count) = self.counts.get_mut(&value) else {
            return false;
        };

        *count -= 1;
        if *count == 0 {
            self.counts.remove(&value);
        }
        self.len -= 1;

        true
    }

    fn first(&self) -> Option<u32> {
        self.counts.keys().next().copied()
    }

    fn last(&self) -> Option<u32> {
        self.counts.keys().next_back().copied()
    }

    fn pop(&mut self, value: Option<u32>) -> Option<u32> {
        let value = value?;
        self.remove(value);
        Some(value)
    }

    fn clear(&mut self) {
        self.counts.clear();
        self.len = 0;
    }

    fn values(&self) -> impl Iterator<Item = u32> + '_ {
        self.counts
            .iter()
            .flat_map(|(&value, &count)| std::iter::repeat(value).take(count))
    }
}

/// Upper bound on the height of an AVL tree holding `len` nodes: `1.4404 * log2(len + 2)`.
pub fn height_bound(len: usize) -> f64 {
    1.4404 * ((len + 2) as f64).log2()
}

pub fn run_btree_equivalence(ops: Vec<Op>) {
    let mut sorted_values = Vec::with_capacity(ops.len());
    let mut model = Multiset::default();
    let mut avl: AvlTree<TestNode> = AvlTree::new();

    fn insert_sorted(v: &mut Vec<u32>, value: u32) {
        let idx = v.partition_point(|&x| x <= value);
        v.insert(idx, value);
    }

    fn remove_sorted(v: &mut Vec<u32>, value: u32) {
        if let Ok(idx) = v.binary_search(&value) {
            v.remove(idx);
        }
    }

    #[inline]
    #[allow(clippy::boxed_local)]
    fn node_key(node: Box<TestNode>) -> u32 {
        node.key
    }

    for (op_id, op) in ops.into_iter().enumerate() {
        let final_op = op.finalize(&sorted_values);

        match final_op {
            FinalOp::Insert(value) => {
                insert_sorted(&mut sorted_values, value);
                model.insert(value);
                avl.insert(TestNode::new(value));
            }

            FinalOp::Contains(value) => {
                let from_model = model.counts.contains_key(&value);
                let from_avl = avl.contains_key(&value);

                assert_eq!(from_model, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Remove(value) => {
                remove_sorted(&mut sorted_values, value);

                let from_model = model.remove(value).then_some(value);
                let from_avl = avl.remove(&value).map(node_key);

                assert_eq!(from_model, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::First => {
                let from_avl = avl.first().map(|node| node.key);

                assert_eq!(model.first(), from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::PopFirst => {
                let from_model = model.pop(model.first());
                let from_avl = avl.pop_first().map(node_key);
                if let Some(value) = from_model {
                    remove_sorted(&mut sorted_values, value);
                }

                assert_eq!(from_model, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Last => {
                let from_avl = avl.last().map(|node| node.key);

                assert_eq!(model.last(), from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::PopLast => {
                let from_model = model.pop(model.last());
                let from_avl = avl.pop_last().map(node_key);
                if let Some(value) = from_model {
                    remove_sorted(&mut sorted_values, value);
                }

                assert_eq!(from_model, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Clear => {
                sorted_values.clear();
                model.clear();
                avl.clear();
            }
        }

        avl.assert_invariants();
        assert_eq!(model.len, avl.len());
        assert!(f64::from(avl.height()) <= height_bound(avl.len()));
        assert!(model.values().eq(avl.iter().map(|node| node.key)));
    }
}

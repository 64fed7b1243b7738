extern crate std;

use std::{format, ops::Range, prelude::v1::*, ptr::NonNull, string::String};

use cordyceps::Linked;
use proptest::prelude::*;

use crate::model::{self, TestNode};

use super::*;

fn insert_find_all(keys: &[u32]) {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for &key in keys {
        tree.insert(TestNode::new(key));
        tree.assert_invariants();
    }

    for key in keys {
        let node = tree.get(key).expect("item not found");
        assert_eq!(node.key(), key);
    }
}

#[test]
fn zero_elems_find() {
    insert_find_all(&[]);
}

#[test]
fn single_elem_find() {
    insert_find_all(&[0]);
}

#[test]
fn two_elems_find() {
    insert_find_all(&[0, 1]);
    insert_find_all(&[1, 0]);
}

#[test]
fn three_elems_find() {
    insert_find_all(&[0, 1, 2]);
    insert_find_all(&[0, 2, 1]);
    insert_find_all(&[1, 0, 2]);
    insert_find_all(&[1, 2, 0]);
    insert_find_all(&[2, 0, 1]);
    insert_find_all(&[2, 1, 0]);
}

#[test]
fn four_elems_find() {
    insert_find_all(&[0, 1, 2, 3]);
    insert_find_all(&[0, 1, 3, 2]);
    insert_find_all(&[0, 2, 1, 3]);
    insert_find_all(&[0, 2, 3, 1]);
    insert_find_all(&[0, 3, 1, 2]);
    insert_find_all(&[0, 3, 2, 1]);

    insert_find_all(&[1, 0, 2, 3]);
    insert_find_all(&[1, 0, 3, 2]);
    insert_find_all(&[1, 2, 0, 3]);
    insert_find_all(&[1, 2, 3, 0]);
    insert_find_all(&[1, 3, 0, 2]);
    insert_find_all(&[1, 3, 2, 0]);

    insert_find_all(&[2, 0, 1, 3]);
    insert_find_all(&[2, 0, 3, 1]);
    insert_find_all(&[2, 1, 0, 3]);
    insert_find_all(&[2, 1, 3, 0]);
    insert_find_all(&[2, 3, 0, 1]);
    insert_find_all(&[2, 3, 1, 0]);

    insert_find_all(&[3, 0, 1, 2]);
    insert_find_all(&[3, 0, 2, 1]);
    insert_find_all(&[3, 1, 0, 2]);
    insert_find_all(&[3, 1, 2, 0]);
    insert_find_all(&[3, 2, 0, 1]);
    insert_find_all(&[3, 2, 1, 0]);
}

fn insert_remove_all(keys: &[u32]) {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for &key in keys {
        tree.insert(TestNode::new(key));
        tree.assert_invariants();
    }

    for key in keys {
        let node = tree.remove(key).expect("item not found");
        assert_eq!(node.key, *key);
        assert!(!tree.contains_key(key));
        tree.assert_invariants();
    }

    assert!(tree.is_empty());

    for &key in keys {
        tree.insert(TestNode::new(key));
        tree.assert_invariants();
    }

    for key in keys.iter().rev() {
        tree.remove(key).expect("item not found");
        tree.assert_invariants();
    }

    assert!(tree.is_empty());
    assert_eq!(tree.height(), -1);
}

#[test]
fn remove_one() {
    insert_remove_all(&[0]);
}

#[test]
fn remove_two() {
    insert_remove_all(&[0, 1]);
    insert_remove_all(&[1, 0]);
}

#[test]
fn remove_three() {
    insert_remove_all(&[0, 1, 2]);
    insert_remove_all(&[0, 2, 1]);
    insert_remove_all(&[1, 0, 2]);
    insert_remove_all(&[1, 2, 0]);
    insert_remove_all(&[2, 0, 1]);
    insert_remove_all(&[2, 1, 0]);
}

#[test]
fn remove_four() {
    insert_remove_all(&[0, 1, 2, 3]);
    insert_remove_all(&[0, 1, 3, 2]);
    insert_remove_all(&[0, 2, 1, 3]);
    insert_remove_all(&[0, 2, 3, 1]);
    insert_remove_all(&[0, 3, 1, 2]);
    insert_remove_all(&[0, 3, 2, 1]);

    insert_remove_all(&[1, 0, 2, 3]);
    insert_remove_all(&[1, 0, 3, 2]);
    insert_remove_all(&[1, 2, 0, 3]);
    insert_remove_all(&[1, 2, 3, 0]);
    insert_remove_all(&[1, 3, 0, 2]);
    insert_remove_all(&[1, 3, 2, 0]);

    insert_remove_all(&[2, 0, 1, 3]);
    insert_remove_all(&[2, 0, 3, 1]);
    insert_remove_all(&[2, 1, 0, 3]);
    insert_remove_all(&[2, 1, 3, 0]);
    insert_remove_all(&[2, 3, 0, 1]);
    insert_remove_all(&[2, 3, 1, 0]);

    insert_remove_all(&[3, 0, 1, 2]);
    insert_remove_all(&[3, 0, 2, 1]);
    insert_remove_all(&[3, 1, 0, 2]);
    insert_remove_all(&[3, 1, 2, 0]);
    insert_remove_all(&[3, 2, 0, 1]);
    insert_remove_all(&[3, 2, 1, 0]);
}

// Returns `(value, height)` for the root and its two children.
fn shape(set: &AvlSet<u32>) -> [(u32, i8); 3] {
    let root = set.root().expect("set is empty");
    let left = root.left().expect("root has no left child");
    let right = root.right().expect("root has no right child");

    [
        (*root.value(), root.height()),
        (*left.value(), left.height()),
        (*right.value(), right.height()),
    ]
}

#[test]
fn ascending_triple_rotates_left() {
    let set = AvlSet::from([10, 20, 30]);

    assert_eq!(shape(&set), [(20, 1), (10, 0), (30, 0)]);
    assert!(set.validate());
}

#[test]
fn descending_triple_rotates_right() {
    let set = AvlSet::from([30, 20, 10]);

    assert_eq!(shape(&set), [(20, 1), (10, 0), (30, 0)]);
    assert!(set.validate());
}

#[test]
fn zig_zag_triples_rotate_twice() {
    let left_right = AvlSet::from([30, 10, 20]);
    assert_eq!(shape(&left_right), [(20, 1), (10, 0), (30, 0)]);
    assert!(left_right.validate());

    let right_left = AvlSet::from([10, 30, 20]);
    assert_eq!(shape(&right_left), [(20, 1), (10, 0), (30, 0)]);
    assert!(right_left.validate());
}

#[test]
fn remove_root_promotes_successor() {
    let mut set = AvlSet::from([20, 10, 30]);

    assert!(set.remove(&20));
    assert!(set.validate());
    assert_eq!(set.len(), 2);

    let root = set.root().unwrap();
    assert_eq!(*root.value(), 30);
    assert_eq!(root.height(), 1);
    assert_eq!(root.balance(), 1);
    assert!(root.parent().is_none());
    assert!(root.right().is_none());

    let left = root.left().unwrap();
    assert_eq!(*left.value(), 10);
    assert_eq!(left.height(), 0);
    assert_eq!(left.parent().map(|p| *p.value()), Some(30));
}

#[test]
fn remove_with_balanced_heavy_child_rotates_once() {
    // Removing 30 leaves 20 left-heavy with a left child of balance 0.
    let mut set = AvlSet::from([20, 10, 30, 5, 15]);

    assert!(set.remove(&30));
    assert!(set.validate());

    let root = set.root().unwrap();
    assert_eq!(*root.value(), 10);
    assert_eq!(root.height(), 2);

    let right = root.right().unwrap();
    assert_eq!(*right.value(), 20);
    assert_eq!(right.left().map(|n| *n.value()), Some(15));
    assert_eq!(root.left().map(|n| *n.value()), Some(5));
}

#[test]
fn removal_rebalances_every_level() {
    // A minimal AVL tree of height 4; removing from its short side triggers rotations at more
    // than one ancestor.
    let mut set = AvlSet::from([8, 5, 11, 3, 7, 10, 12, 2, 4, 6, 9, 1]);
    assert!(set.validate());
    assert_eq!(set.height(), 4);

    assert!(set.remove(&12));
    assert!(set.validate());
    assert_eq!(set.height(), 3);
    assert_eq!(set.inorder(), [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]);
}

#[test]
fn ascending_inserts_stay_logarithmic() {
    let set: AvlSet<u32> = (1..=1000).collect();

    assert!(set.validate());
    assert_eq!(set.len(), 1000);
    assert!(f64::from(set.height()) <= model::height_bound(1000));
    assert!((1..=1000).all(|v| set.contains(&v)));
    assert_eq!(set.inorder(), (1..=1000).collect::<Vec<_>>());
}

#[test]
fn duplicates_are_counted() {
    let mut set = AvlSet::new();
    for value in [5, 3, 5, 8, 5] {
        set.insert(value);
        assert!(set.validate());
    }

    assert_eq!(set.inorder(), [3, 5, 5, 5, 8]);

    for remaining in [2, 1, 0] {
        assert!(set.remove(&5));
        assert!(set.validate());
        assert_eq!(set.contains(&5), remaining > 0);
    }

    assert!(!set.remove(&5));
    assert_eq!(set.inorder(), [3, 8]);
}

#[test]
fn equal_values_survive_rotation() {
    let set = AvlSet::from([7, 7, 7, 7, 7, 7, 7]);

    assert!(set.validate());
    assert!(set.is_valid_bst());
    assert_eq!(set.height(), 2);
    assert_eq!(set.iter().count(), 7);
}

#[test]
fn empty_set() {
    let mut set: AvlSet<u32> = AvlSet::new();

    assert!(set.is_empty());
    assert!(!set.contains(&1));
    assert!(!set.remove(&1));
    assert_eq!(set.min(), None);
    assert_eq!(set.max(), None);
    assert_eq!(set.pop_first(), None);
    assert_eq!(set.pop_last(), None);
    assert!(set.root().is_none());
    assert!(set.inorder().is_empty());
    assert!(set.validate());
    assert_eq!(set.height(), -1);
    assert_eq!(set.to_string(), "AVL pre-order {  }");
}

#[test]
fn min_max_and_pops() {
    let mut set = AvlSet::from([50, 20, 80, 10, 30, 70, 90]);

    assert_eq!(set.min(), Some(&10));
    assert_eq!(set.max(), Some(&90));

    assert_eq!(set.pop_first(), Some(10));
    assert!(set.validate());
    assert_eq!(set.pop_last(), Some(90));
    assert!(set.validate());

    assert_eq!(set.min(), Some(&20));
    assert_eq!(set.max(), Some(&80));
    assert_eq!(set.take(&50), Some(50));
    assert_eq!(set.take(&50), None);
    assert_eq!(set.len(), 4);
}

#[test]
fn clear_and_reuse() {
    let mut set: AvlSet<u32> = (0..64).collect();
    assert_eq!(set.len(), 64);

    set.clear();
    assert!(set.is_empty());
    assert!(set.root().is_none());
    assert!(set.validate());

    set.extend([3, 1, 2]);
    assert_eq!(set.inorder(), [1, 2, 3]);
    assert!(set.validate());
}

#[test]
fn preorder_rendering() {
    let set = AvlSet::from([10, 20, 30, 40]);

    assert_eq!(set.to_string(), "AVL pre-order { 20, 10, 30, 40 }");
    assert_eq!(format!("{set:?}"), "{10, 20, 30, 40}");
}

// `(id, label)` for every node declared in a rendered digraph.
fn dot_nodes(out: &str) -> Vec<(&str, &str)> {
    out.split("; ")
        .filter_map(|decl| {
            let (id, rest) = decl.split_once(" [label=\"")?;
            let id = &id[id.find('"')?..];
            Some((id, rest.strip_suffix("\"]")?))
        })
        .collect()
}

// `(from, to)` for every edge between two declared nodes.
fn dot_edges(out: &str) -> Vec<(&str, &str)> {
    out.lines()
        .filter_map(|line| line.trim().strip_suffix(';')?.split_once(" -> "))
        .filter(|(_, to)| !to.contains("-missing"))
        .collect()
}

#[test]
fn dotgraph_labels_heights() {
    let set = AvlSet::from([10, 20, 30]);

    let mut out = String::new();
    set.dotgraph("t", &mut out).unwrap();

    assert!(out.starts_with("digraph \"graph-t\""));

    let nodes = dot_nodes(&out);
    let id_of = |label: &str| {
        nodes
            .iter()
            .find(|(_, l)| *l == label)
            .map(|(id, _)| *id)
            .unwrap_or_else(|| panic!("no node labelled {label} in {out}"))
    };
    assert_eq!(nodes.len(), 3);

    let edges = dot_edges(&out);
    assert_eq!(edges.len(), 2);
    assert!(edges.contains(&(id_of("20:1"), id_of("10:0"))));
    assert!(edges.contains(&(id_of("20:1"), id_of("30:0"))));
}

#[test]
fn dotgraph_keeps_equal_values_apart() {
    let set = AvlSet::from([7, 7, 7]);

    let mut out = String::new();
    set.dotgraph("dup", &mut out).unwrap();

    let nodes = dot_nodes(&out);
    let mut labels: Vec<&str> = nodes.iter().map(|(_, label)| *label).collect();
    labels.sort_unstable();
    assert_eq!(labels, ["7:0", "7:0", "7:1"]);

    let mut ids: Vec<&str> = nodes.iter().map(|(id, _)| *id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 3, "node ids collide: {out}");

    let edges = dot_edges(&out);
    assert_eq!(edges.len(), 2);
    assert!(edges.iter().all(|(from, to)| from != to), "self-loop: {out}");
    assert!(edges.iter().all(|(from, to)| ids.contains(from) && ids.contains(to)));
}

#[test]
fn iter_is_exact_and_ordered() {
    let set = AvlSet::from([4, 1, 3, 1, 2]);

    let mut iter = set.iter();
    assert_eq!(iter.len(), 5);
    iter.next();
    assert_eq!(iter.len(), 4);

    assert_eq!(set.iter().copied().collect::<Vec<_>>(), [1, 1, 2, 3, 4]);
}

#[test]
fn links_debug_shows_height() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    for key in [1, 2] {
        tree.insert(TestNode::new(key));
    }

    let leaf = tree.last().unwrap();
    let rendered = format!("{:?}", Pin::get_ref(leaf));
    assert!(rendered.starts_with("TestNode"));
    assert!(rendered.contains("Links"));
    assert!(rendered.contains("height: 0"));
    assert!(rendered.contains("key: 2"));

    let detached = format!("{:?}", Links::<TestNode>::new());
    assert!(detached.contains("parent: None"));
    assert!(detached.contains("height: 0"));
}

#[test]
fn every_rotation_leaves_subtree_balanced() {
    // Insertion orders that force each rotation shape at several depths, then removals from
    // alternating ends. Debug builds assert the balance of each rotated subtree root.
    let mut set = AvlSet::new();
    for v in (0..64).chain((64..128).rev()).chain([200, 150, 175, 300, 250]) {
        set.insert(v);
        assert!((-1..=1).contains(&set.root().unwrap().balance()));
    }
    assert!(set.validate());

    let mut take_low = true;
    while !set.is_empty() {
        if take_low {
            set.pop_first();
        } else {
            let max = *set.max().unwrap();
            assert!(set.remove(&max));
        }
        take_low = !take_low;

        if let Some(root) = set.root() {
            assert!((-1..=1).contains(&root.balance()));
        }
        assert!(set.validate());
    }
}

#[test]
fn arbitrary_ops_match_btree() {
    use arbitrary::{Arbitrary, Unstructured};

    let bytes: Vec<u8> = (0u32..4096)
        .map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8)
        .collect();
    let mut u = Unstructured::new(&bytes);

    let mut ops = Vec::new();
    while !u.is_empty() {
        ops.push(model::Op::arbitrary(&mut u).unwrap());
    }
    assert!(ops.len() > 100);
    model::run_btree_equivalence(ops);
}

#[test]
fn validator_reports_corruption() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    for key in [2, 1, 3] {
        tree.insert(TestNode::new(key));
    }
    assert_eq!(tree.check_invariants(), Ok(()));

    let root = tree.root.unwrap();
    let left = unsafe { links_of(root).left().unwrap() };

    unsafe { links_mut(root).set_height(5) };
    assert_eq!(
        tree.check_invariants(),
        Err(Violation::Height {
            cached: 5,
            computed: 1
        })
    );
    unsafe { links_mut(root).set_height(1) };

    unsafe { links_mut(left).set_parent(None) };
    assert_eq!(tree.check_invariants(), Err(Violation::ParentMismatch));
    assert!(!tree.is_valid());
    unsafe { links_mut(left).set_parent(Some(root)) };

    unsafe { links_mut(root).set_parent(Some(left)) };
    assert_eq!(tree.check_invariants(), Err(Violation::RootHasParent));
    unsafe { links_mut(root).set_parent(None) };

    tree.len = 4;
    assert_eq!(
        tree.check_invariants(),
        Err(Violation::Len { counted: 3, len: 4 })
    );
    tree.len = 3;

    assert!(tree.is_valid());
}

#[test]
fn validator_reports_imbalance() {
    // Hang a chain off a leaf behind the engine's back.
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    tree.insert(TestNode::new(1));

    let root = tree.root.unwrap();
    let two: NonNull<TestNode> = Box::leak(TestNode::new(2)).into();
    let three: NonNull<TestNode> = Box::leak(TestNode::new(3)).into();
    unsafe {
        links_mut(root).set_right(Some(two));
        links_mut(root).set_height(2);
        links_mut(two).set_parent(Some(root));
        links_mut(two).set_right(Some(three));
        links_mut(two).set_height(1);
        links_mut(three).set_parent(Some(two));
    }
    tree.len = 3;

    assert_eq!(
        tree.check_invariants(),
        Err(Violation::Balance { balance: -2 })
    );
    assert!(tree.is_ordered());
}

unsafe fn links_of<'a>(node: NonNull<TestNode>) -> &'a Links<TestNode> {
    unsafe { TestNode::links(node).as_ref() }
}

unsafe fn links_mut<'a>(node: NonNull<TestNode>) -> &'a mut Links<TestNode> {
    unsafe { TestNode::links(node).as_mut() }
}

#[cfg(miri)]
const FUZZ_RANGE: Range<usize> = 0..10;

#[cfg(not(miri))]
const FUZZ_RANGE: Range<usize> = 0..1000;

// Cases that validate the whole tree after every step.
#[cfg(miri)]
const VALIDATED_RANGE: Range<usize> = 0..10;

#[cfg(not(miri))]
const VALIDATED_RANGE: Range<usize> = 0..200;

proptest::proptest! {
    #![proptest_config(ProptestConfig {
        max_shrink_iters: 65536,
        .. ProptestConfig::default()
    })]

    #[test]
    fn btree_equivalence(ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE)) {
        model::run_btree_equivalence(ops);
    }

    #[test]
    fn inserted_values_are_found(values in proptest::collection::vec(any::<u16>(), FUZZ_RANGE)) {
        let set: AvlSet<u16> = values.iter().copied().collect();

        prop_assert!(set.validate());
        prop_assert!(f64::from(set.height()) <= model::height_bound(set.len()));
        prop_assert!(values.iter().all(|v| set.contains(v)));

        let mut sorted = values.clone();
        sorted.sort_unstable();
        prop_assert_eq!(set.inorder(), sorted);
    }

    #[test]
    fn removed_values_are_gone(
        values in proptest::collection::btree_set(0u32..10_000, VALIDATED_RANGE),
        keep_every in 2usize..5,
    ) {
        let mut set: AvlSet<u32> = values.iter().copied().collect();

        for (i, v) in values.iter().enumerate() {
            if i % keep_every != 0 {
                prop_assert!(set.remove(v));
                prop_assert!(!set.contains(v));
                prop_assert!(set.validate());
            }
        }

        let kept: Vec<u32> = values.iter().copied().step_by(keep_every).collect();
        prop_assert_eq!(set.inorder(), kept);
    }
}

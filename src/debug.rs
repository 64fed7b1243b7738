use core::fmt;

use crate::{AvlTree, Links, TreeNode};

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
    T::Key: fmt::Display,
{
    /// Writes the keys of the tree in pre-order as `AVL pre-order { k1, k2, ... }`.
    pub fn fmt_preorder<W>(&self, mut w: W) -> fmt::Result
    where
        W: fmt::Write,
    {
        w.write_str("AVL pre-order { ")?;

        let mut result = Ok(());
        let mut first = true;
        self.for_each_preorder(|node| {
            let sep = if first { "" } else { ", " };
            first = false;
            result = result.and_then(|()| write!(w, "{sep}{}", node.key()));
        });
        result?;

        w.write_str(" }")
    }
}

#[cfg(feature = "alloc")]
mod dot {
    use alloc::{collections::VecDeque, string::String};
    use core::{fmt, ptr::NonNull};

    use crate::{AvlTree, Links, TreeNode};

    impl<T> AvlTree<T>
    where
        T: TreeNode<Links<T>>,
        T::Key: fmt::Display,
    {
        /// Renders the tree as a Graphviz digraph, one rank per tree level.
        ///
        /// Nodes are labelled `key:height` and identified by address, so equal keys get distinct
        /// vertices. Missing children are drawn as points.
        pub fn dotgraph<W>(&self, name: &str, mut w: W) -> fmt::Result
        where
            W: fmt::Write,
        {
            let root = match self.root {
                Some(r) => r,
                None => return write!(w, "digraph \"graph-{name}\" {{}}"),
            };

            enum Item<T: TreeNode<Links<T>>> {
                Node(NonNull<T>),
                Missing(u32),
            }

            let mut queue = VecDeque::new();
            queue.push_back(Item::Node(root));

            write!(
                w,
                "digraph \"graph-{name}\" {{\n subgraph \"subgraph-{name}\" {{"
            )?;

            let mut missing = 0;
            let mut links = String::new();

            while !queue.is_empty() {
                use fmt::Write;

                write!(w, "{{rank=same; ")?;

                for _ in 0..queue.len() {
                    let node = match queue.pop_front() {
                        Some(Item::Node(node)) => node,
                        Some(Item::Missing(id)) => {
                            write!(w, "\"graph{name}-missing{id}\" [shape=point]; ")?;
                            continue;
                        }
                        None => break,
                    };

                    let id = node_id(node);
                    let key = unsafe { node.as_ref().key() };
                    let height = unsafe { T::links(node).as_ref().height() };
                    write!(w, "\"graph{name}-{id:x}\" [label=\"{key}:{height}\"]; ")?;

                    let children = unsafe {
                        let node_links = T::links(node).as_ref();
                        [node_links.left(), node_links.right()]
                    };

                    for child in children {
                        match child {
                            Some(child) => {
                                let child_id = node_id(child);

                                queue.push_back(Item::Node(child));
                                writeln!(
                                    links,
                                    "\"graph{name}-{id:x}\" -> \"graph{name}-{child_id:x}\";"
                                )?;
                            }
                            None => {
                                queue.push_back(Item::Missing(missing));
                                writeln!(
                                    links,
                                    "\"graph{name}-{id:x}\" -> \"graph{name}-missing{missing}\";"
                                )?;
                                missing += 1;
                            }
                        }
                    }
                }

                writeln!(w, "}}")?;
            }

            w.write_str(&links)?;

            w.write_str(" }\n}")
        }
    }

    fn node_id<T>(node: NonNull<T>) -> usize {
        node.as_ptr() as usize
    }
}

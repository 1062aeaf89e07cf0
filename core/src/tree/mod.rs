//! Order-statistics trees for weighted sampling.
//!
//! Both levels use the implicit complete-binary-tree layout: 1-based heap
//! position `p` has children `2p` and `2p + 1`. Each node stores aggregates of
//! its *left* subtree only, so a point update walks from the node to the root
//! and touches just the ancestors it is a left descendant of.
//!
//! ```text
//!                  WeightedGroupTree (one per tier)
//!         inner nodes: left deviation sum / left count per combo
//!                 /                 |                  \
//!   WeightedSubtree (combo 0)  WeightedSubtree (1)  …  WeightedSubtree (k)
//!    nodes: one per effect, weight = shared_weight + weight_deviation
//! ```

mod group_tree;
mod subtree;

pub use group_tree::WeightedGroupTree;
pub use subtree::WeightedSubtree;

/// Location of an effect inside a group tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot {
    /// Leaf (combo subtree) index
    pub subgroup: usize,
    /// Node index inside the subtree
    pub node: usize,
}

/// Change of a subtree's counted aggregates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Delta {
    pub deviation: f64,
    pub count: isize,
}

impl Delta {
    pub fn negate(self) -> Self {
        Self {
            deviation: -self.deviation,
            count: -self.count,
        }
    }
}

/// 1-based position in an implicit binary heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HeapPos(usize);

impl HeapPos {
    pub const ROOT: HeapPos = HeapPos(1);

    /// Position of the 0-based array slot `index`.
    pub fn of_index(index: usize) -> Self {
        Self(index + 1)
    }

    /// 0-based array slot, or `None` past the end of a tree of `len` nodes.
    pub fn index_in(self, len: usize) -> Option<usize> {
        (self.0 <= len).then(|| self.0 - 1)
    }

    pub fn get(self) -> usize {
        self.0
    }

    pub fn left(self) -> Self {
        Self(self.0 * 2)
    }

    pub fn right(self) -> Self {
        Self(self.0 * 2 + 1)
    }

    /// Calls `f` with every ancestor whose left subtree contains `self`.
    pub fn for_each_left_ancestor(self, mut f: impl FnMut(HeapPos)) {
        let mut pos = self.0;
        while pos > 1 {
            let parent = pos / 2;
            if pos % 2 == 0 {
                f(HeapPos(parent));
            }
            pos = parent;
        }
    }
}

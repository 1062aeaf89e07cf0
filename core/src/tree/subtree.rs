use crate::effect::EffectId;
use crate::error::ChaosError;

use super::{Delta, HeapPos};

#[derive(Debug, Clone, Copy, Default)]
struct Node {
    /// Signed offset from the group's shared weight
    weight_deviation: f64,
    /// Sum of `weight_deviation` over active nodes of the left subtree
    left_deviation_sum: f64,
    /// Number of active nodes in the left subtree
    left_count: usize,
    is_active: bool,
}

impl Node {
    fn left_weight(&self, shared_weight: f64) -> f64 {
        self.left_deviation_sum + self.left_count as f64 * shared_weight
    }

    fn weight(&self, shared_weight: f64) -> f64 {
        if self.is_active {
            shared_weight + self.weight_deviation
        } else {
            0.0
        }
    }

    fn counted(&self) -> Delta {
        if self.is_active {
            Delta {
                deviation: self.weight_deviation,
                count: 1,
            }
        } else {
            Delta::default()
        }
    }
}

/// Weighted sampling over the effects sharing one combo.
///
/// Slots are handed out during registration with [`reserve_slot`], the node
/// array is sized exactly once by [`alloc`], and [`init_tree`] fills the left
/// aggregates bottom-up. After that every query and update is O(log n).
///
/// [`reserve_slot`]: WeightedSubtree::reserve_slot
/// [`alloc`]: WeightedSubtree::alloc
/// [`init_tree`]: WeightedSubtree::init_tree
#[derive(Debug, Clone, Default)]
pub struct WeightedSubtree {
    effects: Vec<EffectId>,
    nodes: Vec<Node>,
    deviation_sum: f64,
    count: usize,
}

impl WeightedSubtree {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Construction ---

    /// Claim the next slot for `effect`. Only valid before `alloc`.
    pub fn reserve_slot(&mut self, effect: EffectId) -> usize {
        self.effects.push(effect);
        self.effects.len() - 1
    }

    /// Allocate exactly one node per reserved slot, all active.
    pub fn alloc(&mut self) -> Result<(), ChaosError> {
        let len = self.effects.len();
        self.nodes
            .try_reserve_exact(len)
            .map_err(|e| ChaosError::allocation("effect", len, e))?;
        self.nodes.resize(
            len,
            Node {
                is_active: true,
                ..Node::default()
            },
        );
        Ok(())
    }

    /// Recompute every left aggregate and the totals from the nodes' own
    /// deviations and active flags. O(n).
    pub fn init_tree(&mut self) {
        for node in &mut self.nodes {
            node.left_deviation_sum = 0.0;
            node.left_count = 0;
        }
        self.deviation_sum = 0.0;
        self.count = 0;

        for index in (0..self.nodes.len()).rev() {
            let counted = self.nodes[index].counted();
            self.propagate(HeapPos::of_index(index), counted);
            self.deviation_sum += counted.deviation;
            self.count += counted.count as usize;
        }
    }

    // --- Queries ---

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn effect(&self, node: usize) -> Option<EffectId> {
        self.effects.get(node).copied()
    }

    pub fn effects(&self) -> &[EffectId] {
        &self.effects
    }

    /// Number of active nodes.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Sum of deviations of active nodes.
    pub fn deviation_sum(&self) -> f64 {
        self.deviation_sum
    }

    /// Counted aggregates of the whole subtree.
    pub fn totals(&self) -> Delta {
        Delta {
            deviation: self.deviation_sum,
            count: self.count as isize,
        }
    }

    pub fn weight_sum(&self, shared_weight: f64) -> f64 {
        self.deviation_sum + self.count as f64 * shared_weight
    }

    pub fn is_active(&self, node: usize) -> bool {
        self.nodes.get(node).is_some_and(|n| n.is_active)
    }

    pub fn deviation(&self, node: usize) -> f64 {
        self.nodes.get(node).map_or(0.0, |n| n.weight_deviation)
    }

    /// Sampling weight of `node`: zero unless active.
    pub fn weight(&self, node: usize, shared_weight: f64) -> f64 {
        self.nodes.get(node).map_or(0.0, |n| n.weight(shared_weight))
    }

    /// Active node whose cumulative weight range contains `weight`.
    ///
    /// `weight` must lie in `[0, weight_sum)`; `None` means the aggregates
    /// disagree with that precondition.
    pub fn get_node_by_weight(&self, weight: f64, shared_weight: f64) -> Option<usize> {
        let mut remaining = weight;
        let mut pos = HeapPos::ROOT;

        while let Some(index) = pos.index_in(self.nodes.len()) {
            let node = &self.nodes[index];
            let left = node.left_weight(shared_weight);
            if remaining < left {
                pos = pos.left();
                continue;
            }
            remaining -= left;

            let own = node.weight(shared_weight);
            if remaining < own {
                return Some(index);
            }
            remaining -= own;
            pos = pos.right();
        }
        None
    }

    // --- Updates ---

    /// Add `delta` to the node's deviation. Returns the change to the
    /// counted aggregates (zero when the node is inactive).
    pub fn update_deviation(&mut self, node: usize, delta: f64) -> Delta {
        let Some(n) = self.nodes.get_mut(node) else {
            return Delta::default();
        };
        n.weight_deviation += delta;
        if !n.is_active {
            return Delta::default();
        }

        let change = Delta {
            deviation: delta,
            count: 0,
        };
        self.apply(node, change);
        change
    }

    /// Set whether the node is counted. Returns the change to the counted
    /// aggregates, or `None` when the flag already had that value.
    pub fn update_active(&mut self, node: usize, active: bool) -> Option<Delta> {
        let n = self.nodes.get_mut(node)?;
        if n.is_active == active {
            return None;
        }

        let change = if active {
            n.is_active = true;
            n.counted()
        } else {
            let change = n.counted().negate();
            n.is_active = false;
            change
        };
        self.apply(node, change);
        Some(change)
    }

    fn apply(&mut self, node: usize, change: Delta) {
        self.propagate(HeapPos::of_index(node), change);
        self.deviation_sum += change.deviation;
        self.count = self.count.saturating_add_signed(change.count);
    }

    fn propagate(&mut self, pos: HeapPos, change: Delta) {
        let nodes = &mut self.nodes;
        pos.for_each_left_ancestor(|ancestor| {
            let parent = &mut nodes[ancestor.get() - 1];
            parent.left_deviation_sum += change.deviation;
            parent.left_count = parent.left_count.saturating_add_signed(change.count);
        });
    }
}

use hashbrown::HashMap;

use crate::effect::EffectId;
use crate::error::ChaosError;
use crate::tag::ComboId;

use super::{Delta, HeapPos, Slot, WeightedSubtree};

/// Left-subtree aggregates of an inner node, over the leaves below it.
#[derive(Debug, Clone, Copy, Default)]
struct Info {
    left_deviation_sum: f64,
    left_count: usize,
}

#[derive(Debug, Clone)]
struct Leaf {
    combo: ComboId,
    subtree: WeightedSubtree,
    /// Whether the combo's aggregate counts at this level
    is_active: bool,
}

/// Tree of per-combo subtrees.
///
/// With `k` combos the heap has `k - 1` inner nodes (positions `1..k`) and the
/// leaves occupy positions `k..2k`. A leaf's weight is its subtree's current
/// weight sum, so flipping a whole combo on or off is a single O(log k) walk
/// that never touches the effects inside it.
#[derive(Debug, Clone)]
pub struct WeightedGroupTree {
    /// Baseline weight every effect of the group shares
    shared_weight: f64,
    inner: Vec<Info>,
    leaves: Vec<Leaf>,
    positions: HashMap<ComboId, usize>,
    /// Sum of deviations over counted effects of active combos
    deviation_sum: f64,
    /// Number of counted effects in active combos
    count: usize,
}

impl Default for WeightedGroupTree {
    fn default() -> Self {
        Self::new()
    }
}

impl WeightedGroupTree {
    pub fn new() -> Self {
        Self {
            shared_weight: 1.0,
            inner: Vec::new(),
            leaves: Vec::new(),
            positions: HashMap::new(),
            deviation_sum: 0.0,
            count: 0,
        }
    }

    // --- Construction ---

    /// Claim a slot for `effect` in the subtree of `combo`, creating the
    /// subtree on first use.
    pub fn reserve_slot(&mut self, combo: ComboId, effect: EffectId) -> Slot {
        let subgroup = match self.positions.get(&combo) {
            Some(&leaf) => leaf,
            None => {
                self.leaves.push(Leaf {
                    combo,
                    subtree: WeightedSubtree::new(),
                    is_active: true,
                });
                let leaf = self.leaves.len() - 1;
                self.positions.insert(combo, leaf);
                leaf
            }
        };
        let node = self.leaves[subgroup].subtree.reserve_slot(effect);
        Slot { subgroup, node }
    }

    pub fn alloc(&mut self) -> Result<(), ChaosError> {
        let inner_len = self.leaves.len().saturating_sub(1);
        self.inner
            .try_reserve_exact(inner_len)
            .map_err(|e| ChaosError::allocation("combo", inner_len, e))?;
        self.inner.resize(inner_len, Info::default());

        for leaf in &mut self.leaves {
            leaf.subtree.alloc()?;
        }
        Ok(())
    }

    /// Rebuild every aggregate. `is_allowed` decides which combos count.
    pub fn init_tree(&mut self, is_allowed: impl Fn(ComboId) -> bool) {
        self.inner.fill(Info::default());
        self.deviation_sum = 0.0;
        self.count = 0;

        for leaf in 0..self.leaves.len() {
            let entry = &mut self.leaves[leaf];
            entry.subtree.init_tree();
            entry.is_active = is_allowed(entry.combo);
            if entry.is_active {
                let totals = entry.subtree.totals();
                self.apply(leaf, totals);
            }
        }
    }

    // --- Queries ---

    pub fn shared_weight(&self) -> f64 {
        self.shared_weight
    }

    /// Countable effects: active nodes inside active combos.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn weight_sum(&self) -> f64 {
        self.deviation_sum + self.count as f64 * self.shared_weight
    }

    /// Total number of registered effects, countable or not.
    pub fn len(&self) -> usize {
        self.leaves.iter().map(|l| l.subtree.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subgroup_count(&self) -> usize {
        self.leaves.len()
    }

    pub fn get_subgroup(&self, combo: ComboId) -> Option<usize> {
        self.positions.get(&combo).copied()
    }

    pub fn subtree(&self, subgroup: usize) -> Option<&WeightedSubtree> {
        self.leaves.get(subgroup).map(|l| &l.subtree)
    }

    pub fn combo(&self, subgroup: usize) -> Option<ComboId> {
        self.leaves.get(subgroup).map(|l| l.combo)
    }

    pub fn is_subgroup_active(&self, subgroup: usize) -> bool {
        self.leaves.get(subgroup).is_some_and(|l| l.is_active)
    }

    pub fn effect(&self, slot: Slot) -> Option<EffectId> {
        self.subtree(slot.subgroup)?.effect(slot.node)
    }

    /// Weight the effect contributes to sampling right now.
    pub fn effective_weight(&self, slot: Slot) -> f64 {
        match self.leaves.get(slot.subgroup) {
            Some(leaf) if leaf.is_active => leaf.subtree.weight(slot.node, self.shared_weight),
            _ => 0.0,
        }
    }

    /// `shared_weight + weight_deviation`, regardless of countability.
    pub fn raw_weight(&self, slot: Slot) -> f64 {
        self.subtree(slot.subgroup)
            .map_or(0.0, |s| self.shared_weight + s.deviation(slot.node))
    }

    /// Active combo whose weight range contains `weight`, together with the
    /// weight left over for the descent into its subtree.
    pub fn get_subgroup_by_weight(&self, weight: f64) -> Option<(usize, f64)> {
        let leaves = self.leaves.len();
        if leaves == 0 {
            return None;
        }

        let mut remaining = weight;
        let mut pos = HeapPos::ROOT;
        while pos.get() < leaves {
            let info = &self.inner[pos.get() - 1];
            let left = info.left_deviation_sum + info.left_count as f64 * self.shared_weight;
            if remaining < left {
                pos = pos.left();
            } else {
                remaining -= left;
                pos = pos.right();
            }
        }

        let subgroup = pos.get() - leaves;
        self.is_subgroup_active(subgroup)
            .then_some((subgroup, remaining))
    }

    pub fn get_effect_by_weight(&self, weight: f64) -> Option<Slot> {
        let (subgroup, remaining) = self.get_subgroup_by_weight(weight)?;
        let node = self.leaves[subgroup]
            .subtree
            .get_node_by_weight(remaining, self.shared_weight)?;
        Some(Slot { subgroup, node })
    }

    // --- Updates ---

    pub fn update_deviation(&mut self, slot: Slot, delta: f64) {
        let Some(leaf) = self.leaves.get_mut(slot.subgroup) else {
            return;
        };
        let change = leaf.subtree.update_deviation(slot.node, delta);
        if leaf.is_active {
            self.apply(slot.subgroup, change);
        }
    }

    pub fn update_active(&mut self, slot: Slot, active: bool) {
        let Some(leaf) = self.leaves.get_mut(slot.subgroup) else {
            return;
        };
        let Some(change) = leaf.subtree.update_active(slot.node, active) else {
            return;
        };
        if leaf.is_active {
            self.apply(slot.subgroup, change);
        }
    }

    /// Move `share_ratio` of the winner's weight onto every other countable
    /// effect. The winner loses exactly `share`, the others each gain
    /// `share / (count - 1)`, and the total is unchanged. No-op with fewer
    /// than two countable effects.
    pub fn share_weight(&mut self, winner: Slot, share_ratio: f64) {
        if self.count < 2 {
            return;
        }
        let share = self.effective_weight(winner) * share_ratio;
        let per_effect = share / (self.count - 1) as f64;

        self.shared_weight += per_effect;
        self.update_deviation(winner, -(share + per_effect));
    }

    pub fn activate_subgroup(&mut self, combo: ComboId) {
        self.set_subgroup_active(combo, true);
    }

    pub fn deactivate_subgroup(&mut self, combo: ComboId) {
        self.set_subgroup_active(combo, false);
    }

    fn set_subgroup_active(&mut self, combo: ComboId, active: bool) {
        let Some(&subgroup) = self.positions.get(&combo) else {
            return;
        };
        let leaf = &mut self.leaves[subgroup];
        if leaf.is_active == active {
            return;
        }
        leaf.is_active = active;

        let totals = leaf.subtree.totals();
        let change = if active { totals } else { totals.negate() };
        self.apply(subgroup, change);
    }

    fn apply(&mut self, subgroup: usize, change: Delta) {
        let pos = HeapPos::of_index(self.leaves.len() - 1 + subgroup);
        let inner = &mut self.inner;
        pos.for_each_left_ancestor(|ancestor| {
            let info = &mut inner[ancestor.get() - 1];
            info.left_deviation_sum += change.deviation;
            info.left_count = info.left_count.saturating_add_signed(change.count);
        });
        self.deviation_sum += change.deviation;
        self.count = self.count.saturating_add_signed(change.count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-9;

    fn combo(n: u32) -> ComboId {
        ComboId::from_raw(n)
    }

    /// Group with `per_combo[i]` effects in combo `i`.
    fn build(per_combo: &[usize]) -> (WeightedGroupTree, Vec<Slot>) {
        let mut tree = WeightedGroupTree::new();
        let mut slots = Vec::new();
        let mut next = 0;
        for (c, &n) in per_combo.iter().enumerate() {
            for _ in 0..n {
                slots.push(tree.reserve_slot(combo(c as u32), EffectId::from_index(next)));
                next += 1;
            }
        }
        tree.alloc().unwrap();
        tree.init_tree(|_| true);
        (tree, slots)
    }

    fn countable_sum(tree: &WeightedGroupTree, slots: &[Slot]) -> f64 {
        slots.iter().map(|&s| tree.effective_weight(s)).sum()
    }

    #[test]
    fn slots_group_by_combo() {
        let (tree, slots) = build(&[2, 3, 1]);
        assert_eq!(tree.subgroup_count(), 3);
        assert_eq!(tree.len(), 6);
        assert_eq!(tree.count(), 6);
        assert_eq!(slots[0], Slot { subgroup: 0, node: 0 });
        assert_eq!(slots[4], Slot { subgroup: 1, node: 2 });
        assert_eq!(slots[5], Slot { subgroup: 2, node: 0 });
        assert_eq!(tree.effect(slots[4]), Some(EffectId::from_index(4)));
    }

    #[test]
    fn weighted_lookup_covers_every_effect() {
        let (tree, slots) = build(&[2, 3, 1, 4]);
        let total = tree.weight_sum();
        assert!((total - 10.0).abs() < TOL);

        let mut hits = vec![0usize; slots.len()];
        for i in 0..100 {
            let w = (i as f64 + 0.5) * total / 100.0;
            let slot = tree.get_effect_by_weight(w).unwrap();
            let effect = tree.effect(slot).unwrap();
            hits[effect.index()] += 1;
        }
        // equal weights: every effect owns a tenth of the range
        assert!(hits.iter().all(|&h| h == 10), "{hits:?}");
    }

    #[test]
    fn deactivate_subgroup_removes_whole_combo() {
        let (mut tree, slots) = build(&[2, 3, 1]);
        let c1 = combo(1);
        tree.deactivate_subgroup(c1);
        assert_eq!(tree.count(), 3);
        assert!((tree.weight_sum() - 3.0).abs() < TOL);
        assert_eq!(tree.effective_weight(slots[2]), 0.0);

        for i in 0..30 {
            let w = (i as f64 + 0.5) * tree.weight_sum() / 30.0;
            let slot = tree.get_effect_by_weight(w).unwrap();
            assert_ne!(slot.subgroup, 1);
        }

        // updates inside an inactive combo stay local until reactivation
        tree.update_active(slots[2], false);
        assert_eq!(tree.count(), 3);
        tree.activate_subgroup(c1);
        assert_eq!(tree.count(), 5);
        tree.activate_subgroup(c1);
        assert_eq!(tree.count(), 5);
    }

    #[test]
    fn share_weight_conserves_total() {
        let (mut tree, slots) = build(&[3]);
        let before = countable_sum(&tree, &slots);
        tree.share_weight(slots[0], 0.5);
        let after = countable_sum(&tree, &slots);
        assert!((before - after).abs() < TOL);
        assert!((tree.effective_weight(slots[0]) - 0.5).abs() < TOL);
        assert!((tree.effective_weight(slots[1]) - 1.25).abs() < TOL);
        assert!((tree.effective_weight(slots[2]) - 1.25).abs() < TOL);
        assert!((tree.shared_weight() - 1.25).abs() < TOL);
        assert!((tree.weight_sum() - 3.0).abs() < TOL);
    }

    #[test]
    fn share_weight_needs_two_countable_effects() {
        let (mut tree, slots) = build(&[1, 1]);
        tree.update_active(slots[1], false);
        tree.share_weight(slots[0], 1.0);
        assert_eq!(tree.shared_weight(), 1.0);
        assert_eq!(tree.effective_weight(slots[0]), 1.0);
    }

    #[test]
    fn single_combo_tree_has_no_inner_nodes() {
        let (tree, _) = build(&[4]);
        assert_eq!(tree.subgroup_count(), 1);
        let (subgroup, rest) = tree.get_subgroup_by_weight(2.5).unwrap();
        assert_eq!(subgroup, 0);
        assert_eq!(rest, 2.5);
    }

    #[test]
    fn empty_tree_finds_nothing() {
        let (tree, _) = build(&[]);
        assert!(tree.is_empty());
        assert_eq!(tree.get_effect_by_weight(0.0), None);
        assert_eq!(tree.weight_sum(), 0.0);
    }
}

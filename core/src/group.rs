//! One disturbance tier of a machine.

use chaos_types::{Disturbance, GroupSettings};
use rand::Rng;

use crate::effect::EffectId;
use crate::error::ChaosError;
use crate::tag::ComboId;
use crate::tree::{Slot, WeightedGroupTree};

/// A severity tier: its roll probability, its decay policy, and the weighted
/// tree of the effects registered to it.
#[derive(Debug, Clone)]
pub struct ChaosGroup {
    tier: Disturbance,
    settings: GroupSettings,
    /// Current roll probability; only ever changed by `apply_on_pick_multiplier`
    probability: f64,
    tree: WeightedGroupTree,
}

impl ChaosGroup {
    pub fn new(tier: Disturbance, settings: GroupSettings) -> Self {
        Self {
            tier,
            settings,
            probability: settings.initial_probability,
            tree: WeightedGroupTree::new(),
        }
    }

    pub fn tier(&self) -> Disturbance {
        self.tier
    }

    pub fn settings(&self) -> &GroupSettings {
        &self.settings
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    pub fn apply_on_pick_multiplier(&mut self) {
        self.probability *= self.settings.on_pick_multiplier;
    }

    /// Effects that can currently be rolled.
    pub fn countable_effects(&self) -> usize {
        self.tree.count()
    }

    /// Every effect registered to this tier.
    pub fn effect_count(&self) -> usize {
        self.tree.len()
    }

    pub fn weight_sum(&self) -> f64 {
        self.tree.weight_sum()
    }

    pub fn effect_weight(&self, slot: Slot) -> f64 {
        self.tree.effective_weight(slot)
    }

    pub fn tree(&self) -> &WeightedGroupTree {
        &self.tree
    }

    // --- Registration ---

    pub(crate) fn reserve_effect_slot(&mut self, combo: ComboId, effect: EffectId) -> Slot {
        self.tree.reserve_slot(combo, effect)
    }

    pub(crate) fn alloc_effect_slots(&mut self) -> Result<(), ChaosError> {
        self.tree.alloc()
    }

    pub(crate) fn init_tree(&mut self, is_allowed: impl Fn(ComboId) -> bool) {
        self.tree.init_tree(is_allowed);
    }

    // --- Rolling ---

    pub fn get_effect_by_weight(&self, weight: f64) -> Option<EffectId> {
        let slot = self.tree.get_effect_by_weight(weight)?;
        self.tree.effect(slot)
    }

    /// Draw one effect proportionally to its weight and hand part of the
    /// winner's weight to the others. `Ok(None)` when nothing is countable.
    pub fn pick_effect(&mut self, rng: &mut impl Rng) -> Result<Option<EffectId>, ChaosError> {
        if self.tree.count() == 0 {
            return Ok(None);
        }

        let weight = rng.random::<f64>() * self.tree.weight_sum();
        self.pick_effect_at(weight)
    }

    /// Pick the effect whose weight range contains `weight` and redistribute.
    /// The draw is always below the total, so a failed lookup only happens
    /// when the aggregates drifted from the leaves; nothing is changed then.
    pub(crate) fn pick_effect_at(&mut self, weight: f64) -> Result<Option<EffectId>, ChaosError> {
        let total = self.tree.weight_sum();
        let slot = self
            .tree
            .get_effect_by_weight(weight)
            .ok_or(ChaosError::WeightLookup { weight, total })?;

        self.tree.share_weight(slot, self.settings.winner_weight_share);
        Ok(self.tree.effect(slot))
    }

    // --- Status plumbing ---

    pub(crate) fn set_effect_countable(&mut self, slot: Slot, countable: bool) {
        self.tree.update_active(slot, countable);
    }

    pub(crate) fn activate_subgroup(&mut self, combo: ComboId) {
        self.tree.activate_subgroup(combo);
    }

    pub(crate) fn deactivate_subgroup(&mut self, combo: ComboId) {
        self.tree.deactivate_subgroup(combo);
    }
}

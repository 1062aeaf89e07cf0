//! The engine context: every machine, every registered effect and the shared
//! tag registry, driven one tick at a time by the host.
//!
//! ```text
//! update(ctx)
//!   └─ for each machine
//!        1. cycle timer   ──► roll (tier, then effect) ──► start effect
//!        2. roll requests ──► roll per request (global, then per tier)
//!        3. active list   ──► tick callbacks, expire finished effects
//!        4. removal queue ──► tick + end for effects stopped from outside
//! ```
//!
//! Status changes to or from `Active` reserve or release the effect's tags,
//! and the combos they affect are toggled in every group of every machine.

mod builder;


pub use builder::EngineBuilder;

use chaos_types::{Disturbance, MachineSettings};
use rand::rngs::StdRng;

use crate::active::ActiveEffect;
use crate::effect::{EffectEntity, EffectId, EffectStatus};
use crate::group::ChaosGroup;
use crate::machine::{ChaosMachine, MachineId};
use crate::tag::{ComboId, TagRegistry};

/// A running chaos scheduler. `C` is the host context handed to effect
/// callbacks; the engine never looks inside it.
pub struct ChaosEngine<C> {
    machines: Vec<ChaosMachine>,
    effects: Vec<EffectEntity<C>>,
    tags: TagRegistry,
    rng: StdRng,
    rolling_disabled: bool,
}

impl<C> ChaosEngine<C> {
    pub fn builder() -> EngineBuilder<C> {
        EngineBuilder::new()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Tick
    // ─────────────────────────────────────────────────────────────────────

    /// Advance every machine by one tick.
    pub fn update(&mut self, ctx: &mut C) {
        for machine in 0..self.machines.len() {
            self.tick_machine(machine, ctx);
        }
    }

    /// Advance a single machine by one tick.
    pub fn update_machine(&mut self, machine: MachineId, ctx: &mut C) {
        if self.machine_index(machine, "update").is_some() {
            self.tick_machine(machine.index(), ctx);
        }
    }

    fn tick_machine(&mut self, m: usize, ctx: &mut C) {
        if self.machines[m].advance_cycle(self.rolling_disabled) {
            self.perform_roll(m, ctx);
        }

        for _ in 0..self.machines[m].take_roll_requests() {
            self.perform_roll(m, ctx);
        }
        for tier in Disturbance::ALL {
            for _ in 0..self.machines[m].take_group_roll_requests(tier) {
                tracing::debug!(machine = %self.machines[m].name(), %tier, "Beginning group roll");
                self.roll_group(m, tier, ctx);
            }
        }

        let effects = &mut self.effects;
        let expired = self.machines[m]
            .active
            .advance(|id| effects[id.index()].definition.tick(ctx));
        for node in expired {
            if self.effects[node.effect.index()].status == EffectStatus::Active {
                self.set_effect_status(node.effect, EffectStatus::Available);
            }
            self.effects[node.effect.index()].definition.end(ctx);
        }

        for node in self.machines[m].active.drain_removals() {
            let definition = &mut self.effects[node.effect.index()].definition;
            definition.tick(ctx);
            definition.end(ctx);
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Rolling
    // ─────────────────────────────────────────────────────────────────────

    /// Queue one full roll (tier, then effect) for the next update.
    pub fn request_roll(&mut self, machine: MachineId) {
        if let Some(m) = self.machine_index(machine, "request a roll in") {
            self.machines[m].request_roll();
            tracing::debug!(machine = %self.machines[m].name(), "Requested roll");
        }
    }

    /// Queue one roll inside `tier` for the next update.
    pub fn request_group_roll(&mut self, machine: MachineId, tier: Disturbance) {
        if let Some(m) = self.machine_index(machine, "request a roll in") {
            self.machines[m].request_group_roll(tier);
            tracing::debug!(machine = %self.machines[m].name(), %tier, "Requested group roll");
        }
    }

    fn perform_roll(&mut self, m: usize, ctx: &mut C) {
        let machine = &mut self.machines[m];
        tracing::debug!(machine = %machine.name(), "Beginning roll");

        match machine.pick_group(&mut self.rng) {
            Some(tier) => {
                tracing::debug!(
                    machine = %machine.name(),
                    %tier,
                    probability = machine.group(tier).probability(),
                    "Selected disturbance group"
                );
                self.roll_group(m, tier, ctx);
            }
            None => tracing::debug!(machine = %machine.name(), "Roll landed on empty space"),
        }
    }

    fn roll_group(&mut self, m: usize, tier: Disturbance, ctx: &mut C) {
        let group = self.machines[m].group_mut(tier);
        match group.pick_effect(&mut self.rng) {
            Ok(Some(id)) => {
                let entity = &self.effects[id.index()];
                tracing::debug!(
                    effect = %entity.name(),
                    weight = group.effect_weight(entity.slot),
                    "Selected effect"
                );
                self.activate(id, ctx);
            }
            Ok(None) => tracing::debug!(%tier, "No countable effect to roll"),
            Err(e) => tracing::error!(error = %e, %tier, "Skipping roll"),
        }
    }

    fn activate(&mut self, id: EffectId, ctx: &mut C) {
        let entity = &self.effects[id.index()];
        let (m, tier, duration) = (
            entity.machine.index(),
            entity.tier,
            entity.definition.duration,
        );
        self.machines[m].active.push(id, tier, duration);

        if entity.status == EffectStatus::Available {
            self.set_effect_status(id, EffectStatus::Active);
        }
        self.effects[id.index()].definition.start(ctx);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Effect control
    // ─────────────────────────────────────────────────────────────────────

    /// Start `effect` right away, bypassing the roll. Only available effects
    /// can be started.
    pub fn start_effect(&mut self, effect: EffectId, ctx: &mut C) {
        let Some(entity) = self.entity(effect, "start") else {
            return;
        };
        if entity.status != EffectStatus::Available {
            tracing::warn!(
                effect = %entity.name(),
                status = ?entity.status,
                "Only available effects can be started"
            );
            return;
        }
        self.activate(effect, ctx);
    }

    /// `Disabled → Available`, unless a running effect holds one of its tags.
    pub fn enable_effect(&mut self, effect: EffectId) {
        let Some(entity) = self.entity(effect, "enable") else {
            return;
        };
        if entity.status != EffectStatus::Disabled {
            return;
        }
        if !self.tags.is_allowed(entity.combo) {
            tracing::warn!(effect = %entity.name(), "Can't enable effect because of a tag conflict");
            return;
        }
        self.set_effect_status(effect, EffectStatus::Available);
        self.log_status_change(effect, "Enabled effect");
    }

    /// Take `effect` out of rolls. A running instance is queued for removal.
    pub fn disable_effect(&mut self, effect: EffectId) {
        let Some(entity) = self.entity(effect, "disable") else {
            return;
        };
        match entity.status {
            EffectStatus::Available | EffectStatus::Hidden => {
                self.set_effect_status(effect, EffectStatus::Disabled);
            }
            EffectStatus::Active => {
                let m = entity.machine.index();
                self.set_effect_status(effect, EffectStatus::Disabled);
                self.machines[m].active.queue_for_remove(effect);
            }
            EffectStatus::Disabled => return,
        }
        self.log_status_change(effect, "Disabled effect");
    }

    /// End a running effect. It becomes available immediately; its final tick
    /// and end callbacks run during the next update.
    pub fn stop_effect(&mut self, effect: EffectId) {
        let Some(entity) = self.entity(effect, "stop") else {
            return;
        };
        if entity.status != EffectStatus::Active {
            return;
        }
        let m = entity.machine.index();
        self.set_effect_status(effect, EffectStatus::Available);
        self.machines[m].active.queue_for_remove(effect);
        self.log_status_change(effect, "Stopped effect");
    }

    /// `Available → Hidden`: withheld from rolls without being disabled.
    pub fn hide_effect(&mut self, effect: EffectId) {
        let Some(entity) = self.entity(effect, "hide") else {
            return;
        };
        if entity.status == EffectStatus::Available {
            self.set_effect_status(effect, EffectStatus::Hidden);
            self.log_status_change(effect, "Hid effect");
        }
    }

    /// `Hidden → Available`, unless a running effect holds one of its tags.
    pub fn reveal_effect(&mut self, effect: EffectId) {
        let Some(entity) = self.entity(effect, "reveal") else {
            return;
        };
        if entity.status != EffectStatus::Hidden {
            return;
        }
        if !self.tags.is_allowed(entity.combo) {
            tracing::warn!(effect = %entity.name(), "Can't reveal effect because of a tag conflict");
            return;
        }
        self.set_effect_status(effect, EffectStatus::Available);
        self.log_status_change(effect, "Revealed effect");
    }

    /// Suspend scheduled rolls in every machine. Explicit requests still run.
    pub fn set_rolling_disabled(&mut self, disabled: bool) {
        self.rolling_disabled = disabled;
    }

    pub fn rolling_disabled(&self) -> bool {
        self.rolling_disabled
    }

    fn set_effect_status(&mut self, id: EffectId, status: EffectStatus) {
        let entity = &self.effects[id.index()];
        let previous = entity.status;
        if previous == status {
            return;
        }
        let (combo, m, tier, slot) = (entity.combo, entity.machine.index(), entity.tier, entity.slot);

        if status == EffectStatus::Active {
            let affected = self.tags.reserve(combo);
            self.for_each_group(|group| {
                for &combo in &affected {
                    group.deactivate_subgroup(combo);
                }
            });
        } else if previous == EffectStatus::Active {
            let affected = self.tags.release(combo);
            self.for_each_group(|group| {
                for &combo in &affected {
                    group.activate_subgroup(combo);
                }
            });
        }

        self.machines[m]
            .group_mut(tier)
            .set_effect_countable(slot, status.is_countable());
        self.effects[id.index()].status = status;
    }

    fn for_each_group(&mut self, mut f: impl FnMut(&mut ChaosGroup)) {
        for machine in &mut self.machines {
            for group in machine.groups_mut() {
                f(group);
            }
        }
    }

    fn log_status_change(&self, id: EffectId, message: &'static str) {
        let entity = &self.effects[id.index()];
        let machine = self.machines[entity.machine.index()].name();
        tracing::debug!(effect = %entity.name(), machine, "{message}");
    }

    fn entity(&self, effect: EffectId, action: &str) -> Option<&EffectEntity<C>> {
        let entity = self.effects.get(effect.index());
        if entity.is_none() {
            tracing::warn!(%effect, "Can't {action} an effect this engine never registered");
        }
        entity
    }

    fn machine_index(&self, machine: MachineId, action: &str) -> Option<usize> {
        let index = machine.index();
        if index < self.machines.len() {
            Some(index)
        } else {
            tracing::warn!(%machine, "Can't {action} a machine this engine never registered");
            None
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────

    pub fn effect_status(&self, effect: EffectId) -> Option<EffectStatus> {
        self.effects.get(effect.index()).map(|e| e.status)
    }

    pub fn effect_name(&self, effect: EffectId) -> Option<&str> {
        self.effects.get(effect.index()).map(EffectEntity::name)
    }

    pub fn effect_combo(&self, effect: EffectId) -> Option<ComboId> {
        self.effects.get(effect.index()).map(|e| e.combo)
    }

    pub fn effect_tier(&self, effect: EffectId) -> Option<Disturbance> {
        self.effects.get(effect.index()).map(|e| e.tier)
    }

    pub fn effect_machine(&self, effect: EffectId) -> Option<MachineId> {
        self.effects.get(effect.index()).map(|e| e.machine)
    }

    /// Current sampling weight; zero while the effect is not countable or its
    /// combo is blocked.
    pub fn effect_weight(&self, effect: EffectId) -> Option<f64> {
        let entity = self.effects.get(effect.index())?;
        let group = self.machines[entity.machine.index()].group(entity.tier);
        Some(group.effect_weight(entity.slot))
    }

    pub fn find_effect(&self, name: &str) -> Option<EffectId> {
        self.effects
            .iter()
            .position(|e| e.name() == name)
            .map(EffectId::from_index)
    }

    pub fn effect_ids(&self) -> impl Iterator<Item = EffectId> + use<C> {
        (0..self.effects.len()).map(EffectId::from_index)
    }

    pub fn group(&self, machine: MachineId, tier: Disturbance) -> Option<&ChaosGroup> {
        self.machines.get(machine.index()).map(|m| m.group(tier))
    }

    pub fn group_probability(&self, machine: MachineId, tier: Disturbance) -> Option<f64> {
        self.group(machine, tier).map(ChaosGroup::probability)
    }

    pub fn group_weight_sum(&self, machine: MachineId, tier: Disturbance) -> Option<f64> {
        self.group(machine, tier).map(ChaosGroup::weight_sum)
    }

    pub fn countable_effects(&self, machine: MachineId, tier: Disturbance) -> Option<usize> {
        self.group(machine, tier).map(ChaosGroup::countable_effects)
    }

    pub fn is_combo_allowed(&self, combo: ComboId) -> bool {
        self.tags.is_allowed(combo)
    }

    pub fn tags(&self) -> &TagRegistry {
        &self.tags
    }

    pub fn machine_count(&self) -> usize {
        self.machines.len()
    }

    pub fn machine_ids(&self) -> impl Iterator<Item = MachineId> + use<C> {
        (0..self.machines.len()).map(MachineId::from_index)
    }

    pub fn machine(&self, machine: MachineId) -> Option<&ChaosMachine> {
        self.machines.get(machine.index())
    }

    pub fn machine_name(&self, machine: MachineId) -> Option<&str> {
        self.machine(machine).map(ChaosMachine::name)
    }

    pub fn machine_settings(&self, machine: MachineId) -> Option<&MachineSettings> {
        self.machine(machine).map(ChaosMachine::settings)
    }

    pub fn find_machine(&self, name: &str) -> Option<MachineId> {
        self.machines
            .iter()
            .rposition(|m| m.name() == name)
            .map(MachineId::from_index)
    }

    /// Running effect instances of `machine`, oldest first.
    pub fn active_effects(&self, machine: MachineId) -> impl Iterator<Item = &ActiveEffect> {
        self.machines
            .get(machine.index())
            .into_iter()
            .flat_map(|m| m.active.iter())
    }

    /// Instances waiting for their final callbacks in the next update.
    pub fn queued_removals(&self, machine: MachineId) -> impl Iterator<Item = &ActiveEffect> {
        self.machines
            .get(machine.index())
            .into_iter()
            .flat_map(|m| m.active.queued())
    }
}

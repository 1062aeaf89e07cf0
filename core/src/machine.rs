//! Chaos machine: one independent scheduler instance.

use std::fmt;

use chaos_types::{DISTURBANCE_COUNT, Disturbance, MachineSettings};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::active::ActiveEffectList;
use crate::group::ChaosGroup;

/// Handle to a registered machine. `MachineId::DEFAULT` is the stock `"*"`
/// machine every engine starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MachineId(u32);

impl MachineId {
    pub const DEFAULT: MachineId = MachineId(0);

    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "machine {}", self.0)
    }
}

/// Tiers, cycle timer, pending roll requests and running effects of one
/// machine. Rolling itself is driven by the engine, which owns the effects.
#[derive(Debug, Clone)]
pub struct ChaosMachine {
    settings: MachineSettings,
    groups: [ChaosGroup; DISTURBANCE_COUNT],
    cycle_timer: u32,
    roll_requests: u32,
    group_roll_requests: [u32; DISTURBANCE_COUNT],
    pub(crate) active: ActiveEffectList,
}

impl ChaosMachine {
    pub fn new(settings: MachineSettings) -> Self {
        let groups = Disturbance::ALL.map(|tier| ChaosGroup::new(tier, *settings.group(tier)));
        Self {
            settings,
            groups,
            cycle_timer: 0,
            roll_requests: 0,
            group_roll_requests: [0; DISTURBANCE_COUNT],
            active: ActiveEffectList::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn settings(&self) -> &MachineSettings {
        &self.settings
    }

    pub fn group(&self, tier: Disturbance) -> &ChaosGroup {
        &self.groups[tier.index()]
    }

    pub(crate) fn group_mut(&mut self, tier: Disturbance) -> &mut ChaosGroup {
        &mut self.groups[tier.index()]
    }

    pub fn groups(&self) -> &[ChaosGroup] {
        &self.groups
    }

    pub(crate) fn groups_mut(&mut self) -> &mut [ChaosGroup] {
        &mut self.groups
    }

    pub fn active(&self) -> &ActiveEffectList {
        &self.active
    }

    pub fn cycle_timer(&self) -> u32 {
        self.cycle_timer
    }

    /// Total number of registered effects across all tiers.
    pub fn effect_count(&self) -> usize {
        self.groups.iter().map(ChaosGroup::effect_count).sum()
    }

    // --- Cycle and requests ---

    /// Count one tick on the cycle timer. Returns true when a scheduled roll
    /// is due; the timer restarts in that case. A zero cycle length, or
    /// `rolling_disabled`, leaves the timer untouched.
    pub(crate) fn advance_cycle(&mut self, rolling_disabled: bool) -> bool {
        let cycle_length = if rolling_disabled {
            0
        } else {
            self.settings.cycle_length
        };
        if cycle_length == 0 {
            return false;
        }

        self.cycle_timer += 1;
        if self.cycle_timer >= cycle_length {
            self.cycle_timer = 0;
            return true;
        }
        false
    }

    pub(crate) fn request_roll(&mut self) {
        self.roll_requests = self.roll_requests.saturating_add(1);
    }

    pub(crate) fn request_group_roll(&mut self, tier: Disturbance) {
        let pending = &mut self.group_roll_requests[tier.index()];
        *pending = pending.saturating_add(1);
    }

    pub fn pending_rolls(&self) -> u32 {
        self.roll_requests
    }

    pub fn pending_group_rolls(&self, tier: Disturbance) -> u32 {
        self.group_roll_requests[tier.index()]
    }

    pub(crate) fn take_roll_requests(&mut self) -> u32 {
        std::mem::take(&mut self.roll_requests)
    }

    pub(crate) fn take_group_roll_requests(&mut self, tier: Disturbance) -> u32 {
        std::mem::take(&mut self.group_roll_requests[tier.index()])
    }

    // --- Rolling ---

    /// Pick a tier: walk tiers in ascending order, consuming each tier's
    /// probability mass from a single uniform draw. A tier with nothing
    /// countable is skipped. The picked tier's probability decays.
    pub fn pick_group(&mut self, rng: &mut impl Rng) -> Option<Disturbance> {
        let mut r = rng.random::<f64>();

        for group in &mut self.groups {
            let probability = group.probability();
            if r < probability && group.countable_effects() > 0 {
                group.apply_on_pick_multiplier();
                return Some(group.tier());
            }
            r -= probability;
        }
        None
    }
}

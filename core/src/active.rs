//! Running effect instances of one machine.

use chaos_types::Disturbance;

use crate::effect::EffectId;

/// One running effect instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveEffect {
    pub effect: EffectId,
    pub tier: Disturbance,
    /// Ticks counted so far; the instance expires on the first tick that
    /// finds this at `duration`.
    pub elapsed: u32,
    pub duration: u32,
}

impl ActiveEffect {
    pub fn remaining(&self) -> u32 {
        self.duration.saturating_sub(self.elapsed)
    }
}

/// Active effects plus the queue of instances that were stopped from outside
/// the per-tick scan.
///
/// Stopping an effect never edits `active` mid-scan: the instance is moved to
/// the removal queue and only gets its final tick and end callbacks when
/// [`drain_removals`](Self::drain_removals) runs at the end of the tick.
#[derive(Debug, Clone, Default)]
pub struct ActiveEffectList {
    active: Vec<ActiveEffect>,
    remove_queue: Vec<ActiveEffect>,
}

impl ActiveEffectList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, effect: EffectId, tier: Disturbance, duration: u32) {
        self.active.push(ActiveEffect {
            effect,
            tier,
            elapsed: 0,
            duration,
        });
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn contains(&self, effect: EffectId) -> bool {
        self.active.iter().any(|a| a.effect == effect)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActiveEffect> {
        self.active.iter()
    }

    pub fn queued(&self) -> impl Iterator<Item = &ActiveEffect> {
        self.remove_queue.iter()
    }

    /// Run one tick: `on_tick` for every instance in start order. Instances
    /// whose counter already reached their duration are unlinked and returned
    /// in the same order; the rest count the tick.
    pub fn advance(&mut self, mut on_tick: impl FnMut(EffectId)) -> Vec<ActiveEffect> {
        let mut expired = Vec::new();
        self.active.retain_mut(|node| {
            on_tick(node.effect);
            if node.elapsed >= node.duration {
                expired.push(*node);
                false
            } else {
                node.elapsed = node.elapsed.saturating_add(1);
                true
            }
        });
        expired
    }

    /// Move the running instance of `effect` to the removal queue.
    /// Returns false when no such instance is running.
    pub fn queue_for_remove(&mut self, effect: EffectId) -> bool {
        let Some(index) = self.active.iter().position(|a| a.effect == effect) else {
            return false;
        };
        let node = self.active.remove(index);
        self.remove_queue.push(node);
        true
    }

    pub fn drain_removals(&mut self) -> Vec<ActiveEffect> {
        std::mem::take(&mut self.remove_queue)
    }
}

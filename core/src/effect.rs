//! Effect definitions and registered effect entities.

use std::fmt;

use chaos_types::Disturbance;
use serde::{Deserialize, Serialize};

use crate::machine::MachineId;
use crate::tag::ComboId;
use crate::tree::Slot;

/// Host callback, handed the opaque host context every time it runs.
pub type EffectCallback<C> = Box<dyn FnMut(&mut C)>;

/// Handle to a registered effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EffectId(u32);

impl EffectId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle status of a registered effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectStatus {
    /// Eligible for rolls
    #[default]
    Available,
    /// Currently running
    Active,
    /// Withheld from rolls by the host, without being disabled
    Hidden,
    /// Turned off by the host
    Disabled,
}

impl EffectStatus {
    /// Only available effects carry sampling weight.
    pub fn is_countable(self) -> bool {
        self == Self::Available
    }
}

/// What an effect is and what it does. Never mutated by the engine apart
/// from running its callbacks.
pub struct EffectDefinition<C> {
    pub name: String,
    /// Number of ticks the effect runs for
    pub duration: u32,
    on_start: Option<EffectCallback<C>>,
    on_tick: Option<EffectCallback<C>>,
    on_end: Option<EffectCallback<C>>,
}

impl<C> EffectDefinition<C> {
    pub fn new(name: impl Into<String>, duration: u32) -> Self {
        Self {
            name: name.into(),
            duration,
            on_start: None,
            on_tick: None,
            on_end: None,
        }
    }

    pub fn on_start(mut self, f: impl FnMut(&mut C) + 'static) -> Self {
        self.on_start = Some(Box::new(f));
        self
    }

    pub fn on_tick(mut self, f: impl FnMut(&mut C) + 'static) -> Self {
        self.on_tick = Some(Box::new(f));
        self
    }

    pub fn on_end(mut self, f: impl FnMut(&mut C) + 'static) -> Self {
        self.on_end = Some(Box::new(f));
        self
    }

    pub(crate) fn start(&mut self, ctx: &mut C) {
        if let Some(f) = self.on_start.as_mut() {
            f(ctx);
        }
        tracing::debug!(effect = %self.name, "Effect started");
    }

    pub(crate) fn tick(&mut self, ctx: &mut C) {
        if let Some(f) = self.on_tick.as_mut() {
            f(ctx);
        }
    }

    pub(crate) fn end(&mut self, ctx: &mut C) {
        if let Some(f) = self.on_end.as_mut() {
            f(ctx);
        }
        tracing::debug!(effect = %self.name, "Effect ended");
    }
}

impl<C> fmt::Debug for EffectDefinition<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectDefinition")
            .field("name", &self.name)
            .field("duration", &self.duration)
            .field("on_start", &self.on_start.is_some())
            .field("on_tick", &self.on_tick.is_some())
            .field("on_end", &self.on_end.is_some())
            .finish()
    }
}

/// One registered effect slot.
#[derive(Debug)]
pub struct EffectEntity<C> {
    pub definition: EffectDefinition<C>,
    pub status: EffectStatus,
    pub machine: MachineId,
    pub tier: Disturbance,
    pub combo: ComboId,
    /// Position inside the owning group's tree
    pub(crate) slot: Slot,
}

impl<C> EffectEntity<C> {
    pub fn name(&self) -> &str {
        &self.definition.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callbacks_receive_the_host_context() {
        let mut def = EffectDefinition::<Vec<&'static str>>::new("Fog", 3)
            .on_start(|log| log.push("start"))
            .on_tick(|log| log.push("tick"))
            .on_end(|log| log.push("end"));

        let mut log = Vec::new();
        def.start(&mut log);
        def.tick(&mut log);
        def.end(&mut log);
        assert_eq!(log, vec!["start", "tick", "end"]);
    }

    #[test]
    fn missing_callbacks_are_skipped() {
        let mut def = EffectDefinition::<u32>::new("Nothing", 1);
        let mut ctx = 0;
        def.start(&mut ctx);
        def.tick(&mut ctx);
        def.end(&mut ctx);
        assert_eq!(ctx, 0);
        assert!(format!("{def:?}").contains("on_start: false"));
    }

    #[test]
    fn only_available_is_countable() {
        assert!(EffectStatus::Available.is_countable());
        assert!(!EffectStatus::Active.is_countable());
        assert!(!EffectStatus::Hidden.is_countable());
        assert!(!EffectStatus::Disabled.is_countable());
    }
}

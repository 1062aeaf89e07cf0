use chaos_types::{
    DEFAULT_MACHINE_NAME, Disturbance, EffectDeclaration, EngineManifest, MachineSettings,
};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::effect::{EffectDefinition, EffectEntity, EffectId, EffectStatus};
use crate::error::ChaosError;
use crate::machine::{ChaosMachine, MachineId};
use crate::tag::{ComboId, TagRegistry};

use super::ChaosEngine;

struct Registration<C> {
    machine: MachineId,
    tier: Disturbance,
    combo: ComboId,
    definition: EffectDefinition<C>,
    enabled: bool,
}

/// Collects machines and effects, then materializes the engine.
///
/// Nothing is sized until [`build`](Self::build): registrations accumulate
/// here, and every tree is allocated once from the final counts.
pub struct EngineBuilder<C> {
    machines: Vec<MachineSettings>,
    registrations: Vec<Registration<C>>,
    tags: TagRegistry,
    seed: Option<u64>,
    rolling_disabled: bool,
}

impl<C> Default for EngineBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> EngineBuilder<C> {
    /// Starts with the stock `"*"` machine registered as `MachineId::DEFAULT`.
    pub fn new() -> Self {
        Self {
            machines: vec![MachineSettings::default()],
            registrations: Vec::new(),
            tags: TagRegistry::new(),
            seed: None,
            rolling_disabled: false,
        }
    }

    /// Builder seeded from a manifest. `make_definition` turns each declaration
    /// into a definition, which is where the host attaches callbacks.
    /// Declarations naming an unknown machine or tier are dropped with a
    /// warning.
    pub fn from_manifest(
        manifest: &EngineManifest,
        mut make_definition: impl FnMut(&EffectDeclaration) -> EffectDefinition<C>,
    ) -> Self {
        let mut builder = Self::new();

        for settings in &manifest.machines {
            if settings.name == DEFAULT_MACHINE_NAME {
                builder = builder.with_default_machine(settings.clone());
            } else {
                builder.register_machine(settings.clone());
            }
        }

        for decl in &manifest.effects {
            let Some(machine) = builder.find_machine(&decl.machine) else {
                tracing::warn!(
                    effect = %decl.name,
                    machine = %decl.machine,
                    "Effect names an unregistered machine; skipping"
                );
                continue;
            };
            let definition = make_definition(decl);
            if let Some(id) = builder.register_effect_at(machine, decl.tier, definition, &decl.tags)
                && !decl.enabled
            {
                builder.start_disabled(id);
            }
        }

        builder
    }

    /// Replace the stock machine's settings. The name is kept as `"*"`.
    pub fn with_default_machine(mut self, settings: MachineSettings) -> Self {
        self.machines[MachineId::DEFAULT.index()] = MachineSettings {
            name: DEFAULT_MACHINE_NAME.to_string(),
            ..settings
        };
        self
    }

    pub fn register_machine(&mut self, settings: MachineSettings) -> MachineId {
        self.machines.push(settings);
        MachineId::from_index(self.machines.len() - 1)
    }

    /// Most recently registered machine with `name`.
    pub fn find_machine(&self, name: &str) -> Option<MachineId> {
        self.machines
            .iter()
            .rposition(|m| m.name == name)
            .map(MachineId::from_index)
    }

    pub fn machine_count(&self) -> usize {
        self.machines.len()
    }

    pub fn effect_count(&self) -> usize {
        self.registrations.len()
    }

    /// Register an effect to `machine` at `tier`, tagged with `tags`.
    /// Returns `None` (after a warning) when `machine` is not registered.
    pub fn register_effect<S: AsRef<str>>(
        &mut self,
        machine: MachineId,
        tier: Disturbance,
        definition: EffectDefinition<C>,
        tags: &[S],
    ) -> Option<EffectId> {
        if machine.index() >= self.machines.len() {
            tracing::warn!(
                effect = %definition.name,
                %machine,
                "Dropping effect registration for an unregistered machine"
            );
            return None;
        }

        let combo = self.tags.intern_combo_names(tags);
        self.registrations.push(Registration {
            machine,
            tier,
            combo,
            definition,
            enabled: true,
        });
        Some(EffectId::from_index(self.registrations.len() - 1))
    }

    /// Same as [`register_effect`](Self::register_effect) with a raw tier index.
    pub fn register_effect_at<S: AsRef<str>>(
        &mut self,
        machine: MachineId,
        tier: u8,
        definition: EffectDefinition<C>,
        tags: &[S],
    ) -> Option<EffectId> {
        let Some(tier) = Disturbance::from_index(tier as usize) else {
            tracing::warn!(
                effect = %definition.name,
                error = %ChaosError::InvalidTier(tier),
                "Dropping effect registration"
            );
            return None;
        };
        self.register_effect(machine, tier, definition, tags)
    }

    /// Mark a registered effect to start out `Disabled`.
    pub fn start_disabled(&mut self, effect: EffectId) {
        if let Some(reg) = self.registrations.get_mut(effect.index()) {
            reg.enabled = false;
        }
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn rolling_disabled(mut self, disabled: bool) -> Self {
        self.rolling_disabled = disabled;
        self
    }

    /// Allocate every machine and tree to its final size and hand over a
    /// running engine. Allocation failure aborts with `ChaosError::Allocation`.
    pub fn build(self) -> Result<ChaosEngine<C>, ChaosError> {
        let Self {
            machines: settings,
            registrations,
            tags,
            seed,
            rolling_disabled,
        } = self;

        let mut machines = Vec::new();
        machines
            .try_reserve_exact(settings.len())
            .map_err(|e| ChaosError::allocation("machine", settings.len(), e))
            .inspect_err(|e| tracing::error!(error = %e, "Couldn't allocate chaos machines"))?;
        machines.extend(settings.into_iter().map(ChaosMachine::new));
        for machine in &machines {
            tracing::debug!(machine = %machine.name(), "Created chaos machine");
        }

        let slots: Vec<_> = registrations
            .iter()
            .enumerate()
            .map(|(index, reg)| {
                machines[reg.machine.index()]
                    .group_mut(reg.tier)
                    .reserve_effect_slot(reg.combo, EffectId::from_index(index))
            })
            .collect();

        for machine in &mut machines {
            for group in machine.groups_mut() {
                group
                    .alloc_effect_slots()
                    .inspect_err(|e| tracing::error!(error = %e, "Couldn't allocate effect slots"))?;
            }
        }

        let mut effects = Vec::new();
        effects
            .try_reserve_exact(registrations.len())
            .map_err(|e| ChaosError::allocation("effect", registrations.len(), e))
            .inspect_err(|e| tracing::error!(error = %e, "Couldn't allocate effect entities"))?;

        let mut disabled = Vec::new();
        for (index, (reg, slot)) in registrations.into_iter().zip(slots).enumerate() {
            if !reg.enabled {
                disabled.push(EffectId::from_index(index));
            }
            tracing::debug!(
                effect = %reg.definition.name,
                machine = %machines[reg.machine.index()].name(),
                tier = %reg.tier,
                "Registered effect"
            );
            effects.push(EffectEntity {
                definition: reg.definition,
                status: EffectStatus::Available,
                machine: reg.machine,
                tier: reg.tier,
                combo: reg.combo,
                slot,
            });
        }

        for machine in &mut machines {
            for group in machine.groups_mut() {
                group.init_tree(|combo| tags.is_allowed(combo));
            }
            let count = machine.effect_count();
            tracing::debug!(machine = %machine.name(), count, "Detected effect registrations");
        }

        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let mut engine = ChaosEngine {
            machines,
            effects,
            tags,
            rng,
            rolling_disabled,
        };
        for effect in disabled {
            engine.disable_effect(effect);
        }
        Ok(engine)
    }
}

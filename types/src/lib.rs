//! Shared settings and manifest types for the chaos effect scheduler.
//!
//! Everything here is plain serde data: the engine in `chaos-core` consumes it,
//! and hosts can load it from TOML without pulling in the engine.

pub mod formatting;
mod manifest;
mod settings;

pub use manifest::{EffectDeclaration, EngineManifest};
pub use settings::{
    DEFAULT_CYCLE_LENGTH, DEFAULT_MACHINE_NAME, DISTURBANCE_COUNT, Disturbance, GroupSettings,
    MachineSettings, TICKS_PER_SECOND,
};

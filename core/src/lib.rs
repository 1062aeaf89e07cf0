//! Chaos effect scheduler.
//!
//! Machines roll a disturbance tier, then an effect inside it, weighted so that
//! recent winners become less likely. Effects run for a fixed number of ticks
//! and exclusivity tags keep conflicting effects from running together.
//!
//! ```
//! use chaos_core::{ChaosEngine, EffectDefinition, MachineId};
//! use chaos_types::Disturbance;
//!
//! let mut builder = ChaosEngine::<u32>::builder().seed(7);
//! let fog = builder
//!     .register_effect(
//!         MachineId::DEFAULT,
//!         Disturbance::Low,
//!         EffectDefinition::new("Fog", 3).on_tick(|frames: &mut u32| *frames += 1),
//!         &["visibility"],
//!     )
//!     .unwrap();
//! let mut engine = builder.build().unwrap();
//!
//! let mut frames = 0;
//! engine.start_effect(fog, &mut frames);
//! for _ in 0..3 {
//!     engine.update(&mut frames);
//! }
//! assert_eq!(frames, 3);
//! ```

pub mod active;
pub mod config;
pub mod effect;
pub mod engine;
pub mod error;
pub mod group;
pub mod machine;
pub mod tag;
pub mod tree;

pub use active::{ActiveEffect, ActiveEffectList};
pub use config::{ConfigError, default_manifest_path, load_manifest, validate_manifest};
pub use effect::{EffectCallback, EffectDefinition, EffectEntity, EffectId, EffectStatus};
pub use engine::{ChaosEngine, EngineBuilder};
pub use error::ChaosError;
pub use group::ChaosGroup;
pub use machine::{ChaosMachine, MachineId};
pub use tag::{ComboId, TagId, TagRegistry};

//! Declarative engine manifest.
//!
//! A manifest lists extra machines and the effects to register, without any
//! callbacks. Hosts attach behavior when they turn declarations into
//! definitions.
//!
//! ```toml
//! [[machine]]
//! name = "boss"
//! cycle_length = 40
//!
//! [[effect]]
//! name = "Low Gravity"
//! machine = "boss"
//! tier = 1
//! duration = 100
//! tags = ["gravity"]
//! ```

use serde::{Deserialize, Serialize};

use crate::settings::{DEFAULT_MACHINE_NAME, MachineSettings};

fn default_machine() -> String {
    DEFAULT_MACHINE_NAME.to_string()
}

fn default_true() -> bool {
    true
}

/// One effect registration, minus its callbacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectDeclaration {
    /// Display name
    pub name: String,

    /// Name of the owning machine (defaults to the stock machine)
    #[serde(default = "default_machine")]
    pub machine: String,

    /// Raw disturbance tier index, `0` (very low) through `5` (nightmare)
    pub tier: u8,

    /// Duration in ticks
    pub duration: u32,

    /// Exclusivity tags; effects sharing a tag never run together
    #[serde(default)]
    pub tags: Vec<String>,

    /// Whether the effect starts out eligible for rolls
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Machines and effects to register into a fresh engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineManifest {
    /// Machines in addition to the stock `"*"` machine
    #[serde(default, rename = "machine")]
    pub machines: Vec<MachineSettings>,

    #[serde(default, rename = "effect")]
    pub effects: Vec<EffectDeclaration>,
}

impl EngineManifest {
    /// Names of every machine effects may refer to, stock machine first.
    pub fn machine_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(DEFAULT_MACHINE_NAME).chain(self.machines.iter().map(|m| m.name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manifest_toml() {
        let toml = r#"
[[machine]]
name = "boss"
cycle_length = 40

[[effect]]
name = "Low Gravity"
machine = "boss"
tier = 1
duration = 100
tags = ["gravity", "movement"]

[[effect]]
name = "Fog"
tier = 0
duration = 60
enabled = false
"#;

        let manifest: EngineManifest = toml::from_str(toml).unwrap();
        assert_eq!(manifest.machines.len(), 1);
        assert_eq!(manifest.machines[0].cycle_length, 40);
        assert_eq!(manifest.effects.len(), 2);
        assert_eq!(manifest.effects[0].tags, vec!["gravity", "movement"]);
        assert!(manifest.effects[0].enabled);
        assert_eq!(manifest.effects[1].machine, "*");
        assert!(manifest.effects[1].tags.is_empty());
        assert!(!manifest.effects[1].enabled);
        assert_eq!(manifest.machine_names().collect::<Vec<_>>(), vec!["*", "boss"]);
    }

    #[test]
    fn test_empty_manifest() {
        let manifest: EngineManifest = toml::from_str("").unwrap();
        assert!(manifest.machines.is_empty());
        assert!(manifest.effects.is_empty());
    }
}

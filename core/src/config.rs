//! Manifest loading
//!
//! Manifests are TOML files with `[[machine]]` and `[[effect]]` tables (see
//! [`EngineManifest`]). Loading parses and validates; turning the result into
//! an engine is [`EngineBuilder::from_manifest`](crate::EngineBuilder::from_manifest).

use std::fs;
use std::path::{Path, PathBuf};

use chaos_types::{DISTURBANCE_COUNT, Disturbance, EngineManifest};
use hashbrown::HashSet;
use thiserror::Error;

/// Errors that can occur during manifest loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Machine '{machine}': {reason}")]
    InvalidSettings { machine: String, reason: String },

    #[error("Effect '{effect}' names unknown machine '{machine}'")]
    UnknownMachine { effect: String, machine: String },

    #[error("Effect '{effect}': {reason}")]
    InvalidEffect { effect: String, reason: String },
}

/// Read, parse and validate a manifest file.
pub fn load_manifest(path: &Path) -> Result<EngineManifest, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let manifest: EngineManifest = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;

    validate_manifest(&manifest)?;
    tracing::debug!(
        path = %path.display(),
        machines = manifest.machines.len(),
        effects = manifest.effects.len(),
        "Loaded manifest"
    );
    Ok(manifest)
}

/// Check settings ranges, machine name uniqueness and effect references.
pub fn validate_manifest(manifest: &EngineManifest) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    for machine in &manifest.machines {
        if !names.insert(machine.name.as_str()) {
            return Err(ConfigError::InvalidSettings {
                machine: machine.name.clone(),
                reason: "declared more than once".to_string(),
            });
        }
        for tier in Disturbance::ALL {
            if let Some(reason) = machine.group(tier).invalid_reason() {
                return Err(ConfigError::InvalidSettings {
                    machine: machine.name.clone(),
                    reason: format!("{tier}: {reason}"),
                });
            }
        }
    }

    let known: HashSet<&str> = manifest.machine_names().collect();
    for effect in &manifest.effects {
        if !known.contains(effect.machine.as_str()) {
            return Err(ConfigError::UnknownMachine {
                effect: effect.name.clone(),
                machine: effect.machine.clone(),
            });
        }
        if effect.tier as usize >= DISTURBANCE_COUNT {
            return Err(ConfigError::InvalidEffect {
                effect: effect.name.clone(),
                reason: format!("tier {} is out of range 0..{DISTURBANCE_COUNT}", effect.tier),
            });
        }
    }
    Ok(())
}

/// Default manifest location: `<config dir>/chaos/manifest.toml`.
pub fn default_manifest_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("chaos").join("manifest.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> EngineManifest {
        toml::from_str(toml).unwrap()
    }

    #[test]
    fn test_valid_manifest_passes() {
        let manifest = parse(
            r#"
[[machine]]
name = "boss"
cycle_length = 40

[[effect]]
name = "Fog"
tier = 0
duration = 20

[[effect]]
name = "Quake"
machine = "boss"
tier = 5
duration = 40
tags = ["ground"]
"#,
        );
        assert!(validate_manifest(&manifest).is_ok());
    }

    #[test]
    fn test_unknown_machine_rejected() {
        let manifest = parse(
            r#"
[[effect]]
name = "Quake"
machine = "boss"
tier = 1
duration = 40
"#,
        );
        let err = validate_manifest(&manifest).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownMachine { ref machine, .. } if machine == "boss"));
    }

    #[test]
    fn test_out_of_range_settings_rejected() {
        let mut manifest = parse(
            r#"
[[machine]]
name = "boss"
"#,
        );
        manifest.machines[0].groups[2].winner_weight_share = 1.5;
        let err = validate_manifest(&manifest).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSettings { .. }));
        assert!(err.to_string().contains("MEDIUM"));
    }

    #[test]
    fn test_duplicate_machine_rejected() {
        let manifest = parse(
            r#"
[[machine]]
name = "boss"

[[machine]]
name = "boss"
"#,
        );
        assert!(matches!(
            validate_manifest(&manifest),
            Err(ConfigError::InvalidSettings { .. })
        ));
    }

    #[test]
    fn test_out_of_range_tier_rejected() {
        let manifest = parse(
            r#"
[[effect]]
name = "Void"
tier = 6
duration = 1
"#,
        );
        assert!(matches!(
            validate_manifest(&manifest),
            Err(ConfigError::InvalidEffect { .. })
        ));
    }

    #[test]
    fn test_load_reports_missing_file_and_bad_toml() {
        let dir = std::env::temp_dir().join(format!("chaos-config-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let missing = dir.join("missing.toml");
        assert!(matches!(load_manifest(&missing), Err(ConfigError::Io { .. })));

        let bad = dir.join("bad.toml");
        fs::write(&bad, "[[effect]]\nname = 3\n").unwrap();
        assert!(matches!(load_manifest(&bad), Err(ConfigError::Parse { .. })));

        let good = dir.join("good.toml");
        fs::write(&good, "[[effect]]\nname = \"Fog\"\ntier = 0\nduration = 5\n").unwrap();
        let manifest = load_manifest(&good).unwrap();
        assert_eq!(manifest.effects[0].machine, "*");

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_default_path_ends_in_manifest() {
        if let Some(path) = default_manifest_path() {
            assert!(path.ends_with("chaos/manifest.toml"));
        }
    }
}

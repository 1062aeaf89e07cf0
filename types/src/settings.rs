//! Disturbance tiers and the per-machine/per-tier roll settings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Host ticks per second of game time.
pub const TICKS_PER_SECOND: u32 = 20;

/// Ticks between two automatic rolls of the stock machine.
pub const DEFAULT_CYCLE_LENGTH: u32 = 15 * TICKS_PER_SECOND;

/// Name of the machine every engine starts with.
pub const DEFAULT_MACHINE_NAME: &str = "*";

/// Number of disturbance tiers per machine.
pub const DISTURBANCE_COUNT: usize = 6;

// ═══════════════════════════════════════════════════════════════════════════
// Disturbance
// ═══════════════════════════════════════════════════════════════════════════

/// Severity tier of an effect. Tiers are rolled in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disturbance {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
    Nightmare,
}

impl Disturbance {
    /// All tiers in roll order.
    pub const ALL: [Disturbance; DISTURBANCE_COUNT] = [
        Disturbance::VeryLow,
        Disturbance::Low,
        Disturbance::Medium,
        Disturbance::High,
        Disturbance::VeryHigh,
        Disturbance::Nightmare,
    ];

    /// Position of this tier in a machine's tier array.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Tier at `index`, or `None` when out of range.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::VeryLow => "VERY_LOW",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::VeryHigh => "VERY_HIGH",
            Self::Nightmare => "NIGHTMARE",
        }
    }
}

impl fmt::Display for Disturbance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Settings
// ═══════════════════════════════════════════════════════════════════════════

/// Roll policy of one disturbance tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupSettings {
    /// Probability mass of the tier when the machine starts.
    pub initial_probability: f64,
    /// Factor applied to the tier probability every time the tier is picked.
    pub on_pick_multiplier: f64,
    /// Fraction of the winner's weight redistributed to the other effects.
    pub winner_weight_share: f64,
}

impl GroupSettings {
    pub const fn new(
        initial_probability: f64,
        on_pick_multiplier: f64,
        winner_weight_share: f64,
    ) -> Self {
        Self {
            initial_probability,
            on_pick_multiplier,
            winner_weight_share,
        }
    }

    /// Stock settings for `tier`.
    pub const fn default_for(tier: Disturbance) -> Self {
        match tier {
            Disturbance::VeryLow => Self::new(0.3, 1.0, 0.2),
            Disturbance::Low => Self::new(0.2, 1.0, 0.5),
            Disturbance::Medium => Self::new(0.1, 1.0, 0.8),
            Disturbance::High => Self::new(0.05, 0.8, 1.0),
            Disturbance::VeryHigh => Self::new(0.01, 0.8, 1.0),
            Disturbance::Nightmare => Self::new(0.0, 0.5, 1.0),
        }
    }

    /// Returns a description of the first out-of-range field, if any.
    pub fn invalid_reason(&self) -> Option<String> {
        if !(0.0..=1.0).contains(&self.initial_probability) {
            return Some(format!(
                "initial_probability {} is outside [0, 1]",
                self.initial_probability
            ));
        }
        if !(self.on_pick_multiplier >= 0.0) {
            return Some(format!(
                "on_pick_multiplier {} is negative",
                self.on_pick_multiplier
            ));
        }
        if !(0.0..=1.0).contains(&self.winner_weight_share) {
            return Some(format!(
                "winner_weight_share {} is outside [0, 1]",
                self.winner_weight_share
            ));
        }
        None
    }
}

fn default_groups() -> [GroupSettings; DISTURBANCE_COUNT] {
    Disturbance::ALL.map(GroupSettings::default_for)
}

fn default_cycle_length() -> u32 {
    DEFAULT_CYCLE_LENGTH
}

/// Settings of one independent chaos machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineSettings {
    pub name: String,

    /// Ticks between automatic rolls (0 = only explicit roll requests)
    #[serde(default = "default_cycle_length")]
    pub cycle_length: u32,

    /// One entry per tier, in `Disturbance::ALL` order
    #[serde(default = "default_groups")]
    pub groups: [GroupSettings; DISTURBANCE_COUNT],
}

impl MachineSettings {
    /// Stock settings with a custom name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_cycle_length(mut self, cycle_length: u32) -> Self {
        self.cycle_length = cycle_length;
        self
    }

    pub fn with_group(mut self, tier: Disturbance, settings: GroupSettings) -> Self {
        self.groups[tier.index()] = settings;
        self
    }

    pub fn group(&self, tier: Disturbance) -> &GroupSettings {
        &self.groups[tier.index()]
    }
}

impl Default for MachineSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_MACHINE_NAME.to_string(),
            cycle_length: DEFAULT_CYCLE_LENGTH,
            groups: default_groups(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disturbance_index_round_trips() {
        for tier in Disturbance::ALL {
            assert_eq!(Disturbance::from_index(tier.index()), Some(tier));
        }
        assert_eq!(Disturbance::from_index(DISTURBANCE_COUNT), None);
        assert_eq!(Disturbance::VeryHigh.to_string(), "VERY_HIGH");
    }

    #[test]
    fn default_machine_matches_stock_table() {
        let settings = MachineSettings::default();
        assert_eq!(settings.name, "*");
        assert_eq!(settings.cycle_length, 300);
        assert_eq!(settings.group(Disturbance::VeryLow).initial_probability, 0.3);
        assert_eq!(settings.group(Disturbance::High).on_pick_multiplier, 0.8);
        assert_eq!(settings.group(Disturbance::Nightmare).initial_probability, 0.0);
    }

    #[test]
    fn invalid_reason_flags_out_of_range_fields() {
        assert!(GroupSettings::new(0.5, 1.0, 0.5).invalid_reason().is_none());
        assert!(GroupSettings::new(1.5, 1.0, 0.5).invalid_reason().is_some());
        assert!(GroupSettings::new(0.5, -0.1, 0.5).invalid_reason().is_some());
        assert!(GroupSettings::new(0.5, 1.0, 2.0).invalid_reason().is_some());
        assert!(GroupSettings::new(f64::NAN, 1.0, 0.5).invalid_reason().is_some());
    }

    #[test]
    fn machine_settings_parse_with_defaults() {
        let toml = r#"
name = "boss"
cycle_length = 40
"#;
        let settings: MachineSettings = toml::from_str(toml).unwrap();
        assert_eq!(settings.name, "boss");
        assert_eq!(settings.cycle_length, 40);
        assert_eq!(settings.groups, default_groups());
    }
}

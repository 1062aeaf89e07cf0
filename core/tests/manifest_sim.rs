//! Drives a manifest-built engine for a few thousand ticks and checks the
//! scheduler's long-run guarantees.

use std::collections::HashMap;

use chaos_core::{ChaosEngine, EffectDefinition, EngineBuilder, MachineId, validate_manifest};
use chaos_types::{Disturbance, EngineManifest};

const MANIFEST: &str = r#"
[[machine]]
name = "*"
cycle_length = 4

[[machine]]
name = "boss"
cycle_length = 7

[[effect]]
name = "Low Gravity"
tier = 0
duration = 12
tags = ["gravity"]

[[effect]]
name = "Heavy Feet"
tier = 0
duration = 9
tags = ["gravity", "movement"]

[[effect]]
name = "Fog"
tier = 0
duration = 6

[[effect]]
name = "Slippery"
tier = 1
duration = 15
tags = ["movement"]

[[effect]]
name = "Mirror"
tier = 2
duration = 20
tags = ["camera"]

[[effect]]
name = "Quake"
machine = "boss"
tier = 0
duration = 10
tags = ["gravity"]

[[effect]]
name = "Blackout"
machine = "boss"
tier = 1
duration = 5
tags = ["camera"]
enabled = false
"#;

/// Host context: how often each effect started and ended.
#[derive(Debug, Default, PartialEq)]
struct Stats {
    starts: HashMap<String, u32>,
    ends: HashMap<String, u32>,
    order: Vec<String>,
}

fn build(seed: u64) -> ChaosEngine<Stats> {
    let manifest: EngineManifest = toml::from_str(MANIFEST).unwrap();
    validate_manifest(&manifest).unwrap();

    EngineBuilder::from_manifest(&manifest, |decl| {
        let start = decl.name.clone();
        let end = decl.name.clone();
        EffectDefinition::new(decl.name.clone(), decl.duration)
            .on_start(move |stats: &mut Stats| {
                *stats.starts.entry(start.clone()).or_default() += 1;
                stats.order.push(start.clone());
            })
            .on_end(move |stats: &mut Stats| {
                *stats.ends.entry(end.clone()).or_default() += 1;
            })
    })
    .seed(seed)
    .build()
    .unwrap()
}

fn tags_of(engine: &ChaosEngine<Stats>, name: &str) -> Vec<String> {
    let effect = engine.find_effect(name).unwrap();
    let combo = engine.effect_combo(effect).unwrap();
    engine
        .tags()
        .expand(combo)
        .iter()
        .map(|&t| engine.tags().tag_name(t).to_string())
        .collect()
}

#[test]
fn running_effects_never_share_a_tag() {
    let mut engine = build(99);
    let mut stats = Stats::default();

    for _ in 0..3000 {
        engine.update(&mut stats);

        let mut held: Vec<String> = Vec::new();
        for machine in engine.machine_ids() {
            for active in engine.active_effects(machine) {
                let name = engine.effect_name(active.effect).unwrap();
                for tag in tags_of(&engine, name) {
                    assert!(!held.contains(&tag), "tag {tag} held twice");
                    held.push(tag);
                }
            }
        }
    }

    assert!(stats.starts.values().sum::<u32>() > 100);
    assert!(stats.starts.get("Blackout").is_none());
}

#[test]
fn every_start_is_matched_by_one_end() {
    let mut engine = build(5);
    let mut stats = Stats::default();

    for _ in 0..2000 {
        engine.update(&mut stats);
    }
    // let everything run out with rolling off
    engine.set_rolling_disabled(true);
    for _ in 0..50 {
        engine.update(&mut stats);
    }

    for machine in engine.machine_ids() {
        assert_eq!(engine.active_effects(machine).count(), 0);
    }
    assert_eq!(stats.starts, stats.ends);
}

#[test]
fn same_seed_same_schedule() {
    let mut a = build(2024);
    let mut b = build(2024);
    let (mut sa, mut sb) = (Stats::default(), Stats::default());
    for _ in 0..1000 {
        a.update(&mut sa);
        b.update(&mut sb);
    }
    assert_eq!(sa.order, sb.order);
    assert!(!sa.order.is_empty());
}

#[test]
fn disabled_declaration_can_be_enabled_later() {
    let mut engine = build(1);
    let boss = engine.find_machine("boss").unwrap();
    let blackout = engine.find_effect("Blackout").unwrap();
    assert_eq!(engine.countable_effects(boss, Disturbance::Low), Some(0));

    engine.enable_effect(blackout);
    assert_eq!(engine.countable_effects(boss, Disturbance::Low), Some(1));
    assert_eq!(engine.effect_machine(blackout), Some(boss));
    assert_ne!(boss, MachineId::DEFAULT);
}

use std::path::Path;

use chaos_core::ChaosEngine;
use chaos_types::Disturbance;
use chaos_types::formatting::{format_probability, format_share, format_ticks, format_weight};

use crate::SimHost;

pub fn print_run(engine: &ChaosEngine<SimHost>, host: &SimHost, ticks: u64) {
    let total: u64 = host.starts.values().sum();
    println!();
    println!("Simulated {} ({ticks} ticks), {total} effects started", format_ticks(ticks));
    println!();
    println!(
        "{:<24} {:<10} {:<10} {:>7} {:>7} {:>8}  {}",
        "Effect", "Machine", "Tier", "Starts", "Share", "Weight", "Status"
    );

    for id in engine.effect_ids() {
        let name = engine.effect_name(id).unwrap_or("?");
        let machine = engine
            .effect_machine(id)
            .and_then(|m| engine.machine_name(m))
            .unwrap_or("?");
        let tier = engine.effect_tier(id).map(|t| t.name()).unwrap_or("?");
        let starts = host.starts.get(name).copied().unwrap_or(0);
        let weight = engine.effect_weight(id).unwrap_or(0.0);
        let status = engine
            .effect_status(id)
            .map(|s| format!("{s:?}"))
            .unwrap_or_default();
        println!(
            "{:<24} {:<10} {:<10} {:>7} {:>7} {:>8}  {}",
            name,
            machine,
            tier,
            starts,
            format_share(starts, total),
            format_weight(weight, 3),
            status
        );
    }

    println!();
    for machine in engine.machine_ids() {
        let name = engine.machine_name(machine).unwrap_or("?");
        let probabilities: Vec<String> = Disturbance::ALL
            .into_iter()
            .map(|tier| {
                let p = engine.group_probability(machine, tier).unwrap_or(0.0);
                format!("{tier}={}", format_probability(p))
            })
            .collect();
        println!("{name}: {}", probabilities.join("  "));
    }
}

pub fn print_summary(engine: &ChaosEngine<SimHost>, path: &Path) {
    println!("{}: ok", path.display());
    println!(
        "{} machine(s), {} effect(s), {} tag(s), {} distinct tag combo(s)",
        engine.machine_count(),
        engine.effect_ids().count(),
        engine.tags().tag_count(),
        engine.tags().combo_count()
    );

    for machine in engine.machine_ids() {
        let Some(m) = engine.machine(machine) else {
            continue;
        };
        let counts: Vec<String> = m
            .groups()
            .iter()
            .filter(|g| g.effect_count() > 0)
            .map(|g| format!("{}={}", g.tier(), g.effect_count()))
            .collect();
        println!(
            "  {} (cycle {}): {}",
            m.name(),
            format_ticks(u64::from(m.settings().cycle_length)),
            if counts.is_empty() {
                "no effects".to_string()
            } else {
                counts.join(", ")
            }
        );
    }
}

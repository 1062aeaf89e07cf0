mod report;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chaos_core::{ChaosEngine, EffectDefinition, EngineBuilder, default_manifest_path, load_manifest};
use chaos_types::EffectDeclaration;
use chaos_types::formatting::format_ticks;
use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chaos-sim", version, about = "Headless chaos effect scheduler simulator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a manifest for a number of ticks and report what happened
    Run {
        /// Manifest path (defaults to <config dir>/chaos/manifest.toml)
        #[arg(short, long)]
        manifest: Option<PathBuf>,
        #[arg(short, long, default_value_t = 6000)]
        ticks: u64,
        #[arg(short, long)]
        seed: Option<u64>,
        /// Suspend scheduled rolls
        #[arg(long)]
        disable_rolling: bool,
        /// Also write logs to this file
        #[arg(long)]
        log_file: Option<PathBuf>,
        /// Only print the final report
        #[arg(short, long)]
        quiet: bool,
    },
    /// Validate a manifest and summarize it
    Check {
        #[arg(short, long)]
        manifest: Option<PathBuf>,
    },
}

/// Host context handed to effect callbacks.
#[derive(Debug, Default)]
pub struct SimHost {
    pub tick: u64,
    pub starts: HashMap<String, u64>,
    pub quiet: bool,
}

fn main() -> Result<(), String> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            manifest,
            ticks,
            seed,
            disable_rolling,
            log_file,
            quiet,
        } => {
            let _guard = init_logging(log_file.as_deref())?;
            run(manifest, ticks, seed, disable_rolling, quiet)
        }
        Commands::Check { manifest } => {
            let _guard = init_logging(None)?;
            check(manifest)
        }
    }
}

fn init_logging(log_file: Option<&Path>) -> Result<Option<WorkerGuard>, String> {
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy();

    if let Some(path) = log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| format!("Failed to open log file {}: {e}", path.display()))?;
        let (writer, guard) = tracing_appender::non_blocking(file);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_ansi(false)
            .with_writer(writer)
            .init();
        return Ok(Some(guard));
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
    Ok(None)
}

fn resolve_manifest(manifest: Option<PathBuf>) -> Result<PathBuf, String> {
    manifest
        .or_else(default_manifest_path)
        .ok_or_else(|| "No manifest given and no config directory available".to_string())
}

/// Definition whose callbacks count starts and print them.
fn sim_definition(decl: &EffectDeclaration) -> EffectDefinition<SimHost> {
    let name = decl.name.clone();
    let ended = decl.name.clone();
    EffectDefinition::new(decl.name.clone(), decl.duration)
        .on_start(move |host: &mut SimHost| {
            *host.starts.entry(name.clone()).or_default() += 1;
            if !host.quiet {
                println!("[{}] start {}", format_ticks(host.tick), name);
            }
        })
        .on_end(move |host: &mut SimHost| {
            if !host.quiet {
                println!("[{}] end   {}", format_ticks(host.tick), ended);
            }
        })
}

fn build_engine(
    path: &Path,
    seed: Option<u64>,
    disable_rolling: bool,
) -> Result<ChaosEngine<SimHost>, String> {
    let manifest = load_manifest(path).map_err(|e| e.to_string())?;
    let mut builder = EngineBuilder::from_manifest(&manifest, sim_definition);
    if let Some(seed) = seed {
        builder = builder.seed(seed);
    }
    builder
        .rolling_disabled(disable_rolling)
        .build()
        .map_err(|e| e.to_string())
}

fn run(
    manifest: Option<PathBuf>,
    ticks: u64,
    seed: Option<u64>,
    disable_rolling: bool,
    quiet: bool,
) -> Result<(), String> {
    let path = resolve_manifest(manifest)?;
    let mut engine = build_engine(&path, seed, disable_rolling)?;
    tracing::info!(path = %path.display(), ticks, ?seed, "Starting simulation");

    let mut host = SimHost {
        quiet,
        ..SimHost::default()
    };
    for tick in 0..ticks {
        host.tick = tick;
        engine.update(&mut host);
    }

    report::print_run(&engine, &host, ticks);
    Ok(())
}

fn check(manifest: Option<PathBuf>) -> Result<(), String> {
    let path = resolve_manifest(manifest)?;
    let engine = build_engine(&path, Some(0), true)?;
    report::print_summary(&engine, &path);
    Ok(())
}

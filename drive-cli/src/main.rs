use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use drive_config::{load_simulation_config_from_path, SimulationConfig};
use drive_core::brain::decode_brain;
use drive_core::{BrainStore, FileBrainStore, MemoryBrainStore, Simulation, BEST_BRAIN_KEY};
use drive_types::{SimEvent, SimPhase, StatusSnapshot, TickDelta};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

const DEFAULT_LOG_FILTER: &str = "drive_core=info,drive_cli=info";

#[derive(Parser, Debug)]
#[command(name = "drive-cli")]
#[command(about = "Headless driver for the evolutionary driving simulator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct EngineArgs {
    /// TOML config; the bundled defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory of saved brains. Without it brains live in memory only.
    #[arg(long)]
    store: Option<PathBuf>,
    #[arg(long)]
    rng_seed: Option<u64>,
    #[arg(long)]
    subjects: Option<u32>,
    #[arg(long)]
    enemies: Option<u32>,
    #[arg(long)]
    seed_phrase: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Run {
        #[command(flatten)]
        engine: EngineArgs,
        #[arg(long, default_value_t = 3_600)]
        ticks: u32,
        #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,
        #[arg(long)]
        out: Option<PathBuf>,
        /// Persist the best brain when the run ends.
        #[arg(long, default_value_t = false)]
        save: bool,
    },
    Step {
        #[command(flatten)]
        engine: EngineArgs,
        #[arg(long, default_value_t = 1)]
        ticks: u32,
        #[arg(long, default_value_t = false)]
        print_frame: bool,
    },
    Benchmark {
        #[command(flatten)]
        engine: EngineArgs,
        #[arg(long, default_value_t = 1_000)]
        ticks: u32,
    },
    Export {
        #[command(flatten)]
        engine: EngineArgs,
        #[arg(long, default_value_t = 600)]
        ticks: u32,
        #[arg(long, value_enum, default_value_t = ExportFormat::Jsonl)]
        format: ExportFormat,
        #[arg(long)]
        out: PathBuf,
    },
    Brain {
        #[command(subcommand)]
        action: BrainAction,
    },
}

#[derive(Subcommand, Debug)]
enum BrainAction {
    Show {
        #[arg(long)]
        store: PathBuf,
        #[arg(long, default_value = BEST_BRAIN_KEY)]
        key: String,
        #[arg(long, default_value_t = false)]
        weights: bool,
    },
    Delete {
        #[arg(long)]
        store: PathBuf,
        #[arg(long, default_value = BEST_BRAIN_KEY)]
        key: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ExportFormat {
    Jsonl,
    Json,
}

#[derive(Debug, Default, Serialize)]
struct EventTally {
    attempts: u32,
    overtakes: u32,
    crashes: u32,
    stalls: u32,
    extinctions: u32,
    levels_cleared: u32,
    checkpoints: u32,
    persistence_warnings: u32,
}

impl EventTally {
    fn record(&mut self, deltas: &[TickDelta]) {
        for event in deltas.iter().flat_map(|delta| &delta.events) {
            match event {
                SimEvent::AttemptStarted { .. } => self.attempts += 1,
                SimEvent::Overtake { .. } => self.overtakes += 1,
                SimEvent::Crashed { .. } => self.crashes += 1,
                SimEvent::Stalled { .. } => self.stalls += 1,
                SimEvent::Extinct => self.extinctions += 1,
                SimEvent::LevelCleared { .. } => self.levels_cleared += 1,
                SimEvent::CheckpointSaved { .. } => self.checkpoints += 1,
                SimEvent::PersistenceWarning { .. } => self.persistence_warnings += 1,
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct RunSummary {
    ticks: u32,
    phase: SimPhase,
    status: StatusSnapshot,
    events: EventTally,
    saved_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct BenchmarkSummary {
    ticks: u32,
    population: u32,
    elapsed_ms: u128,
    avg_ms_per_tick: f64,
    us_per_agent_tick: f64,
    final_status: StatusSnapshot,
}

#[derive(Debug, Serialize)]
struct BrainSummary {
    key: String,
    topology: Vec<usize>,
    parameters: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_owned()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            engine,
            ticks,
            format,
            out,
            save,
        } => run_command(engine, ticks, format, out, save),
        Commands::Step {
            engine,
            ticks,
            print_frame,
        } => step_command(engine, ticks, print_frame),
        Commands::Benchmark { engine, ticks } => benchmark_command(engine, ticks),
        Commands::Export {
            engine,
            ticks,
            format,
            out,
        } => export_command(engine, ticks, format, out),
        Commands::Brain { action } => brain_command(action),
    }
}

fn run_command(
    engine: EngineArgs,
    ticks: u32,
    format: OutputFormat,
    out: Option<PathBuf>,
    save: bool,
) -> Result<()> {
    let mut sim = build_simulation(engine)?;
    sim.start();

    let mut tally = EventTally::default();
    tally.record(&sim.step_n(ticks));

    let saved_key = if save {
        Some(sim.save().context("failed to save best brain")?)
    } else {
        None
    };

    let summary = RunSummary {
        ticks,
        phase: sim.phase(),
        status: sim.status(),
        events: tally,
        saved_key,
    };

    let text = match format {
        OutputFormat::Pretty => {
            let status = &summary.status;
            format!(
                "ticks={} level={} attempt={} alive={}/{} enemies_left={}/{} mutation_rate={:.4} best_speed={:.3} levels_cleared={} extinctions={}",
                summary.ticks,
                status.level,
                status.attempt,
                status.alive_count,
                status.population_size,
                status.enemies_left,
                status.total_enemies,
                status.mutation_rate,
                status.best_speed,
                summary.events.levels_cleared,
                summary.events.extinctions,
            )
        }
        OutputFormat::Json => serde_json::to_string_pretty(&summary)?,
    };
    write_output(text, out)
}

fn step_command(engine: EngineArgs, ticks: u32, print_frame: bool) -> Result<()> {
    let mut sim = build_simulation(engine)?;
    sim.start();

    for delta in sim.step_n(ticks.max(1)) {
        println!("{}", serde_json::to_string(&delta)?);
    }
    if print_frame {
        println!("{}", serde_json::to_string_pretty(&sim.frame())?);
    }
    Ok(())
}

fn benchmark_command(engine: EngineArgs, ticks: u32) -> Result<()> {
    let mut sim = build_simulation(engine)?;
    let population = sim.config().subjects_count;
    let ticks = ticks.max(1);
    sim.start();

    let start = Instant::now();
    sim.step_n(ticks);
    let elapsed = start.elapsed();

    let agent_ticks = f64::from(population.max(1)) * f64::from(ticks);
    let summary = BenchmarkSummary {
        ticks,
        population,
        elapsed_ms: elapsed.as_millis(),
        avg_ms_per_tick: elapsed.as_secs_f64() * 1000.0 / f64::from(ticks),
        us_per_agent_tick: elapsed.as_secs_f64() * 1_000_000.0 / agent_ticks,
        final_status: sim.status(),
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn export_command(
    engine: EngineArgs,
    ticks: u32,
    format: ExportFormat,
    out: PathBuf,
) -> Result<()> {
    let mut sim = build_simulation(engine)?;
    sim.start();
    let lines = sim.export_trace_jsonl(ticks)?;

    let payload = match format {
        ExportFormat::Jsonl => lines.join("\n"),
        ExportFormat::Json => {
            let values: Vec<serde_json::Value> = lines
                .iter()
                .map(|line| serde_json::from_str(line))
                .collect::<std::result::Result<_, _>>()?;
            serde_json::to_string_pretty(&values)?
        }
    };

    fs::write(&out, payload)
        .with_context(|| format!("failed writing export to {}", out.display()))?;
    println!("exported trace to {}", out.display());
    Ok(())
}

fn brain_command(action: BrainAction) -> Result<()> {
    match action {
        BrainAction::Show {
            store,
            key,
            weights,
        } => {
            let store = open_store(store)?;
            let raw = store
                .get(&key)?
                .with_context(|| format!("no brain saved under {key}"))?;
            let brain = decode_brain(&raw)
                .with_context(|| format!("brain under {key} is not valid JSON"))?;

            if weights {
                println!("{}", serde_json::to_string_pretty(&brain)?);
            } else {
                let parameters = brain
                    .layers
                    .iter()
                    .map(|layer| {
                        layer.biases.len() + layer.weights.iter().map(Vec::len).sum::<usize>()
                    })
                    .sum();
                let summary = BrainSummary {
                    key,
                    topology: brain.topology(),
                    parameters,
                };
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            Ok(())
        }
        BrainAction::Delete { store, key } => {
            let mut store = open_store(store)?;
            store.delete(&key)?;
            info!(key = %key, "deleted saved brain");
            Ok(())
        }
    }
}

fn build_simulation(engine: EngineArgs) -> Result<Simulation> {
    let mut cfg = load_config(engine.config)?;
    if let Some(v) = engine.rng_seed {
        cfg.rng_seed = v;
    }
    if let Some(v) = engine.subjects {
        cfg.subjects_count = v;
    }
    if let Some(v) = engine.enemies {
        cfg.enemies_count = v;
    }
    if let Some(v) = engine.seed_phrase {
        cfg.seed_phrase = v;
    }

    let store: Box<dyn BrainStore> = match engine.store {
        Some(dir) => Box::new(open_store(dir)?),
        None => Box::new(MemoryBrainStore::new()),
    };
    Ok(Simulation::new(cfg, store)?)
}

fn open_store(dir: PathBuf) -> Result<FileBrainStore> {
    FileBrainStore::open(&dir)
        .with_context(|| format!("failed to open brain store {}", dir.display()))
}

fn load_config(path: Option<PathBuf>) -> Result<SimulationConfig> {
    match path {
        Some(path) => load_simulation_config_from_path(&path),
        None => Ok(SimulationConfig::default()),
    }
}

fn write_output(text: String, out: Option<PathBuf>) -> Result<()> {
    if let Some(path) = out {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating output directory {}", parent.display())
            })?;
        }
        fs::write(&path, text).with_context(|| format!("failed writing {}", path.display()))?;
        println!("wrote output to {}", path.display());
    } else {
        println!("{text}");
    }
    Ok(())
}

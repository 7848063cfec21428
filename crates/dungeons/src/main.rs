//! Dungeon instance tool
//!
//! Offline authoring against the layout store, plus a scripted demo run on
//! the simulated host.

mod demo;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args as ClapArgs, Parser, Subcommand};
use strum::IntoEnumIterator;
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use di_core::collab::{FixedRewards, TracingAudit};
use di_core::config::ConfigError;
use di_core::host::SimHost;
use di_core::layout::{DungeonLayout, GateKind};
use di_core::persist::{BackgroundWriter, StoreError};
use di_core::{
    AuthoringCommand, DungeonEngine, DungeonId, EngineConfig, EngineError, GameRng, Location,
    PlayerId, Vec3,
};
use di_save::{JsonStore, SaveError, default_store_path};

/// Identity used for offline admin commands
const CONSOLE: PlayerId = PlayerId(0);

/// Author and try out instanced dungeons
#[derive(Parser, Debug)]
#[command(name = "dungeons")]
#[command(author, version, about = "Instanced dungeon authoring and demo", long_about = None)]
struct Args {
    /// Engine config file (JSON)
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Layout store file (defaults to the user data directory)
    #[arg(short = 's', long = "store")]
    store: Option<PathBuf>,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play a scripted run on a simulated world
    Demo {
        /// RNG seed for mob rolls
        #[arg(long)]
        seed: Option<u64>,
    },
    #[command(flatten)]
    Author(AuthorCommand),
}

#[derive(Subcommand, Debug)]
enum AuthorCommand {
    /// Create a dungeon with its arrival point
    Create {
        id: i32,
        #[command(flatten)]
        position: Position,
    },
    /// Delete a dungeon and all its rooms
    Delete { id: i32 },
    /// Remove the highest-numbered rooms
    TrimRooms { id: i32, count: usize },
    /// Show every dungeon and what it still needs
    List,
    /// Run admin commands from a file, one per line: `<world> <x,y,z> <command...>`
    Script { file: PathBuf },
}

#[derive(ClapArgs, Debug)]
struct Position {
    /// World name
    #[arg(long, default_value = "world")]
    world: String,

    /// Coordinates as x,y,z
    #[arg(long, value_parser = parse_vec3, default_value = "0,64,0", allow_hyphen_values = true)]
    at: Vec3,
}

impl Position {
    fn location(&self) -> Location {
        Location::new(self.world.clone(), self.at)
    }
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Save(#[from] SaveError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Engine(#[from] EngineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{file}:{line}: {reason}")]
    Script {
        file: String,
        line: usize,
        reason: String,
    },
}

fn parse_vec3(s: &str) -> Result<Vec3, String> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("bad coordinate in '{}': {}", s, e))?;
    match parts.as_slice() {
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        _ => Err(format!("expected x,y,z, got '{}'", s)),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("dungeons: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), CliError> {
    let config = match &args.config {
        Some(path) => EngineConfig::load_from_file(path)?,
        None => EngineConfig::default(),
    };

    match args.command {
        Command::Demo { seed } => demo::run(config, seed),
        Command::Author(command) => {
            let path = args.store.unwrap_or_else(default_store_path);
            author(config, &path, command)
        }
    }
}

fn author(config: EngineConfig, path: &Path, command: AuthorCommand) -> Result<(), CliError> {
    let existing = JsonStore::open(path)?;
    let writer = BackgroundWriter::spawn(JsonStore::open(path)?)?;
    let mut engine = DungeonEngine::new(
        config,
        writer,
        Box::new(FixedRewards::default()),
        Box::new(TracingAudit),
        GameRng::from_entropy(),
    );
    let count = engine.load(&existing)?;
    info!(count, path = %path.display(), "layouts loaded");

    // Offline commands have no world; markers land in a throwaway one
    let mut host = SimHost::new();
    let result = match command {
        AuthorCommand::Create { id, position } => admin(
            &mut engine,
            &mut host,
            AuthoringCommand::Create {
                id: DungeonId(id),
                spawn: position.location(),
            },
        ),
        AuthorCommand::Delete { id } => admin(
            &mut engine,
            &mut host,
            AuthoringCommand::Delete { id: DungeonId(id) },
        ),
        AuthorCommand::TrimRooms { id, count } => admin(
            &mut engine,
            &mut host,
            AuthoringCommand::TrimRooms {
                id: DungeonId(id),
                count,
            },
        ),
        AuthorCommand::List => {
            list(&engine);
            Ok(())
        }
        AuthorCommand::Script { file } => script(&mut engine, &mut host, &file),
    };

    let failures = engine.into_persistence().shutdown();
    if failures > 0 {
        warn!(failures, path = %path.display(), "some layout writes failed");
    }
    result
}

fn admin(
    engine: &mut DungeonEngine<BackgroundWriter>,
    host: &mut SimHost,
    command: AuthoringCommand,
) -> Result<(), CliError> {
    let message = engine.apply(host, CONSOLE, command)?;
    println!("{}", message);
    Ok(())
}

/// Parts a layout still lacks before it can be started
fn missing(layout: &DungeonLayout) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if layout.spawn_point.is_none() {
        missing.push("spawn");
    }
    if layout.entry_gate.is_none() {
        missing.push("entrydoor");
    }
    if layout.rooms.is_empty() {
        missing.push("rooms");
    }
    if layout.boss_spawn_point.is_none() {
        missing.push("bossspawn");
    }
    if layout.reward_container_point.is_none() {
        missing.push("reward");
    }
    missing
}

fn list(engine: &DungeonEngine<BackgroundWriter>) {
    if engine.layouts().is_empty() {
        println!("No dungeons.");
        return;
    }
    for layout in engine.layouts().iter() {
        let mobs: usize = layout
            .rooms
            .values()
            .map(|r| r.mob_spawn_points.len())
            .sum();
        let mut status = if layout.is_setup_complete() {
            "ready".to_string()
        } else {
            format!("needs {}", missing(layout).join(", "))
        };
        let mobless = layout.rooms_without_mobs();
        if !mobless.is_empty() {
            let rooms: Vec<String> = mobless.iter().map(u32::to_string).collect();
            status.push_str(&format!(" (no mobs in room {})", rooms.join(", ")));
        }
        println!(
            "{:>5}  rooms {:>2}  mobs {:>3}  {}",
            layout.id,
            layout.room_count(),
            mobs,
            status
        );
    }
}

fn script(
    engine: &mut DungeonEngine<BackgroundWriter>,
    host: &mut SimHost,
    file: &Path,
) -> Result<(), CliError> {
    let text = std::fs::read_to_string(file)?;
    let fail = |line: usize, reason: String| CliError::Script {
        file: file.display().to_string(),
        line,
        reason,
    };

    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut words = line.split_whitespace();
        let (Some(world), Some(coords)) = (words.next(), words.next()) else {
            return Err(fail(line_no, "expected <world> <x,y,z> <command...>".to_string()));
        };
        let at = parse_vec3(coords).map_err(|reason| fail(line_no, reason))?;
        let words: Vec<&str> = words.collect();

        let command = match AuthoringCommand::parse(&words, &Location::new(world, at)) {
            Ok(command) => command,
            Err(EngineError::UnknownGateKind(kind)) => {
                let known: Vec<String> = GateKind::iter().map(|k| k.to_string()).collect();
                return Err(fail(
                    line_no,
                    format!("unknown gate kind '{}' (one of {})", kind, known.join(", ")),
                ));
            }
            Err(e) => return Err(fail(line_no, e.to_string())),
        };
        admin(engine, host, command).map_err(|e| fail(line_no, e.to_string()))?;
    }
    Ok(())
}

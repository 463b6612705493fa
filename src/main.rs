//! Activity Agent CLI
//!
//! Desktop activity telemetry for Linux.

use activity_agent::{
    collector::{ExitReason, Tracker},
    config::{Config, DeviceConfig, StoreConfig},
    monitor::{Monitor, MonitorSettings},
    store::{JsonStore, MemoryStore, SessionStore},
    wm::{CommandSource, HyprctlParser, StaticSource, WindowParser, WindowSource},
    VERSION,
};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "remote")]
use activity_agent::store::{BlockingRemoteStore, RemoteStoreConfig};

#[derive(Parser)]
#[command(name = "activity-agent")]
#[command(version = VERSION)]
#[command(about = "Desktop activity telemetry for Linux", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Path to the configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start tracking input and window activity
    Start {
        /// Store to use: memory, json, json:<path> or remote
        #[arg(long)]
        store: Option<String>,

        /// Input device as name=path (repeatable, replaces configured devices)
        #[arg(long = "device")]
        devices: Vec<String>,
    },

    /// Print the windows the window manager currently reports
    Windows {
        /// Parse window-manager output from stdin instead of running it
        #[arg(long)]
        stdin: bool,
    },

    /// Count the events in captured device files
    Replay {
        /// Raw input_event dumps
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Archive every finished session now
    Archive,

    /// Delete sessions that ended more than N days ago
    Prune {
        #[arg(long)]
        days: u32,
    },

    /// Show configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Start { store, devices } => cmd_start(config, store.as_deref(), &devices),
        Commands::Windows { stdin } => cmd_windows(&config, stdin),
        Commands::Replay { files } => cmd_replay(&files),
        Commands::Archive => cmd_archive(&config),
        Commands::Prune { days } => cmd_prune(&config, days),
        Commands::Config => cmd_config(&config, cli.config.as_deref()),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

fn cmd_start(mut config: Config, store: Option<&str>, devices: &[String]) -> Result<()> {
    if let Some(store) = store {
        config.store = StoreConfig::from_arg(store, &config.data_path)?;
    }
    if !devices.is_empty() {
        config.devices = devices
            .iter()
            .map(|d| DeviceConfig::parse(d))
            .collect::<Result<_, _>>()?;
    }
    if config.devices.is_empty() {
        bail!("at least one input device must be configured");
    }

    if let Err(e) = config.ensure_directories() {
        tracing::warn!(error = %e, "could not create data directories");
    }

    println!("Activity Agent v{VERSION}");
    println!();
    for device in &config.devices {
        println!("  {}: {}", device.name, device.path.display());
    }
    println!("  Session interval: {}s", config.session_interval.as_secs());
    println!("  Tick interval: {}s", config.increment_interval.as_secs());
    println!("  Time zone: {}", config.timezone);
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let tracker = Tracker::open(&config.devices).context("failed to open input devices")?;
    let store = open_store(&config.store)?;
    let settings = MonitorSettings::from_config(&config)?;
    let mut monitor = Monitor::new(store, window_source(&config), tracker, settings);

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    monitor.run(&running)?;

    println!();
    println!("Stopped.");
    Ok(())
}

fn cmd_windows(config: &Config, stdin: bool) -> Result<()> {
    let windows = if stdin {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("failed to read stdin")?;
        parser(config).parse(&raw)
    } else {
        window_source(config).current_windows()?
    };

    for window in &windows {
        println!("{}\t{}\t{}", window.id, window.class, window.title);
    }
    tracing::info!(count = windows.len(), "windows parsed");
    Ok(())
}

fn cmd_replay(files: &[PathBuf]) -> Result<()> {
    let mut tracker = Tracker::new();
    for path in files {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        tracker.add_stream(path.display().to_string(), file);
    }

    tracker.start_all()?;
    for exit in tracker.join() {
        if let ExitReason::Failed(e) = exit.reason {
            eprintln!("Warning: {} stopped early: {e}", exit.stream);
        }
    }

    let counts = tracker.snapshot_and_reset();
    println!("Left clicks:   {}", counts.left_clicks);
    println!("Right clicks:  {}", counts.right_clicks);
    println!("Middle clicks: {}", counts.middle_clicks);
    println!("Key presses:   {}", counts.key_presses);
    println!(
        "X movement:    {} ({:.3} m)",
        counts.x_movement,
        counts.x_meters()
    );
    println!(
        "Y movement:    {} ({:.3} m)",
        counts.y_movement,
        counts.y_meters()
    );
    Ok(())
}

fn cmd_archive(config: &Config) -> Result<()> {
    let mut monitor = offline_monitor(config, MonitorSettings::from_config(config)?)?;
    let added = monitor.archive_past_sessions(Utc::now())?;
    println!("Archived {added} session(s).");
    Ok(())
}

fn cmd_prune(config: &Config, days: u32) -> Result<()> {
    let settings = MonitorSettings {
        retention: Some(chrono::Duration::days(i64::from(days))),
        ..MonitorSettings::from_config(config)?
    };
    let monitor = offline_monitor(config, settings)?;
    let removed = monitor.prune(Utc::now())?;
    println!("Removed {removed} session(s).");
    Ok(())
}

fn cmd_config(config: &Config, path: Option<&Path>) -> Result<()> {
    println!("Configuration");
    println!("=============");
    println!();
    println!(
        "Config file: {:?}",
        path.map(Path::to_path_buf)
            .unwrap_or_else(Config::config_path)
    );
    println!();
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

/// A monitor with no devices or window source, for one-off store passes.
fn offline_monitor(
    config: &Config,
    settings: MonitorSettings,
) -> Result<Monitor<Box<dyn SessionStore>>> {
    Ok(Monitor::new(
        open_store(&config.store)?,
        Box::new(StaticSource::default()),
        Tracker::new(),
        settings,
    ))
}

fn open_store(store: &StoreConfig) -> Result<Box<dyn SessionStore>> {
    match store.clone().with_env() {
        StoreConfig::Memory => {
            tracing::warn!("using in-memory store; nothing will be kept after exit");
            Ok(Box::new(MemoryStore::new()))
        }
        StoreConfig::Json { path } => {
            let store = JsonStore::open(&path)
                .with_context(|| format!("failed to open store at {}", path.display()))?;
            Ok(Box::new(store))
        }
        #[cfg(feature = "remote")]
        StoreConfig::Remote { url, api_key } => {
            let store = BlockingRemoteStore::new(RemoteStoreConfig::new(url, api_key))
                .context("failed to set up remote store")?;
            Ok(Box::new(store))
        }
        #[cfg(not(feature = "remote"))]
        StoreConfig::Remote { .. } => {
            bail!("remote store requested but this build lacks the `remote` feature")
        }
    }
}

fn parser(config: &Config) -> HyprctlParser {
    HyprctlParser::new(
        config.scraper.stride,
        config.scraper.require_title,
        config.identity,
    )
}

fn window_source(config: &Config) -> Box<dyn WindowSource> {
    Box::new(CommandSource::new(
        config.scraper.command.clone(),
        config.scraper.args.clone(),
        Box::new(parser(config)),
    ))
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("failed to set Ctrl+C handler")
}

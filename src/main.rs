//! Binary entrypoint for the Shadow Empire game server.
//!
//! Commands:
//! - `start` - open the game database and serve the HTTP API
//! - `init` - write a starter `config.toml`
//! - `status` - print player and gang counts
//! - `backup create|list|verify|restore` - manage database backups
//!
//! See the library crate docs for module-level details: `shadow_empire::`.
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use parking_lot::Mutex;

use shadow_empire::api::{self, AppState};
use shadow_empire::config::Config;
use shadow_empire::game::seed::load_catalog;
use shadow_empire::game::{Engine, GameStore, GameStoreBuilder};
use shadow_empire::storage::{BackupKind, BackupManager, BackupScheduler, BackupSchedulerConfig};

#[derive(Parser)]
#[command(name = "shadow-empire")]
#[command(about = "Economy server for the Shadow Empire Telegram game")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the game server
    Start {
        /// Override the configured bind address (e.g. 0.0.0.0:8000)
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Write a default configuration file
    Init,
    /// Show database statistics
    Status,
    /// Manage database backups
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },
}

#[derive(Subcommand)]
enum BackupAction {
    /// Archive the game database (server must be stopped)
    Create {
        /// Optional label stored with the backup
        #[arg(short, long)]
        name: Option<String>,
    },
    /// List backups, newest first
    List,
    /// Recompute a backup's checksum
    Verify { id: String },
    /// Replace the game database with a backup (server must be stopped)
    Restore { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match cli.command {
        Commands::Init => None,
        _ => Some(Config::load(&cli.config).await?),
    };
    init_logging(&config, cli.verbose);

    match cli.command {
        Commands::Init => {
            if std::path::Path::new(&cli.config).exists() {
                return Err(anyhow!("{} already exists; refusing to overwrite", cli.config));
            }
            Config::create_default(&cli.config).await?;
            println!("Created default configuration at {}", cli.config);
            println!("Edit [server] and [telegram], then run: shadow-empire start");
        }
        Commands::Start { bind } => {
            let mut config = config.ok_or_else(|| anyhow!("configuration not loaded"))?;
            if let Some(bind) = bind {
                config.server.bind = bind;
                config.validate()?;
            }
            run_server(config).await?;
        }
        Commands::Status => {
            let config = config.ok_or_else(|| anyhow!("configuration not loaded"))?;
            let store = open_store(&config)?;
            println!("Shadow Empire v{}", env!("CARGO_PKG_VERSION"));
            println!("Database: {}", store.path().display());
            println!("Players:  {}", store.count_players());
            println!("Gangs:    {}", store.count_gangs());
            println!("Listings: {}", store.list_listings()?.len());
        }
        Commands::Backup { action } => {
            let config = config.ok_or_else(|| anyhow!("configuration not loaded"))?;
            run_backup(&config, action)?;
        }
    }
    Ok(())
}

fn open_store(config: &Config) -> Result<GameStore> {
    let path = config.storage.game_db_path();
    GameStoreBuilder::new(&path)
        .open()
        .with_context(|| format!("Failed to open game database at {} (is the server running?)", path.display()))
}

async fn run_server(config: Config) -> Result<()> {
    info!("Starting Shadow Empire v{}", env!("CARGO_PKG_VERSION"));
    let catalog = load_catalog(config.content_file.as_deref()).context("Failed to load game content")?;
    let store = open_store(&config)?;
    let engine = Arc::new(
        Engine::builder(store)
            .catalog(catalog)
            .tuning(config.economy.clone())
            .build()?,
    );
    info!(
        "Database ready: {} players, {} gangs",
        engine.store().count_players(),
        engine.store().count_gangs()
    );

    let scheduler = Arc::new(Mutex::new(BackupScheduler::new(BackupSchedulerConfig::from(&config.storage))));
    let maintenance = tokio::spawn(maintenance_loop(
        engine.clone(),
        scheduler,
        Duration::from_secs(config.server.maintenance_interval_secs),
    ));

    let state = AppState::new(engine.clone(), config)?;
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Shutdown requested");
    };
    let served = api::serve(state, shutdown).await;

    maintenance.abort();
    if let Err(e) = engine.store().flush() {
        error!("Final flush failed: {}", e);
    }
    info!("Server stopped");
    served
}

/// Finalize wars, expire heists and take scheduled backups until aborted.
async fn maintenance_loop(engine: Arc<Engine>, scheduler: Arc<Mutex<BackupScheduler>>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        let engine = engine.clone();
        let scheduler = scheduler.clone();
        let pass = tokio::task::spawn_blocking(move || -> Result<()> {
            engine.run_maintenance()?;
            scheduler.lock().check_and_backup(chrono::Utc::now())?;
            Ok(())
        })
        .await;
        match pass {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("maintenance: pass failed: {:#}", e),
            Err(e) => error!("maintenance: task panicked: {}", e),
        }
    }
}

fn run_backup(config: &Config, action: BackupAction) -> Result<()> {
    let backup_manager = |config: &Config| {
        BackupManager::new(
            config.storage.game_db_path(),
            config.storage.backup_path(),
            config.storage.backup_retention,
        )
    };
    match action {
        BackupAction::Create { name } => {
            // Opening takes the database lock, so this fails while the server runs.
            open_store(config)?.flush()?;
            let meta = backup_manager(config)?.create_backup(name, BackupKind::Manual)?;
            println!("Created {} ({} bytes, sha256 {})", meta.id, meta.size_bytes, meta.checksum);
        }
        BackupAction::List => {
            let manager = backup_manager(config)?;
            let backups = manager.list_backups();
            if backups.is_empty() {
                println!("No backups in {}", config.storage.backup_path().display());
            }
            for b in backups {
                println!(
                    "{}  {}  {:>10} bytes  {:?}{}  {}",
                    b.id,
                    b.created_at.format("%Y-%m-%d %H:%M:%S"),
                    b.size_bytes,
                    b.kind,
                    if b.verified { " (verified)" } else { "" },
                    b.name.unwrap_or_default()
                );
            }
        }
        BackupAction::Verify { id } => {
            if backup_manager(config)?.verify_backup(&id)? {
                println!("{} OK", id);
            } else {
                return Err(anyhow!("{} failed verification", id));
            }
        }
        BackupAction::Restore { id } => {
            drop(open_store(config)?);
            let aside = backup_manager(config)?.restore_backup(&id)?;
            println!("Restored {}; previous database kept at {}", id, aside.display());
        }
    }
    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);
    // sled and hyper are noisy at debug
    builder.filter_module("sled", log::LevelFilter::Warn);
    builder.filter_module("hyper", log::LevelFilter::Info);

    let log_file = config.as_ref().and_then(|c| c.logging.file.clone());
    let security_path = config.as_ref().and_then(|c| c.logging.security_file.clone());
    let file = log_file.and_then(|path| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| eprintln!("Cannot open log file {}: {}", path, e))
            .ok()
    });

    match file {
        Some(f) => {
            let file = std::sync::Mutex::new(f);
            // Mirror to the console only in the foreground
            let is_tty = atty::is(atty::Stream::Stdout);
            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());
                if let Ok(mut guard) = file.lock() {
                    let _ = writeln!(guard, "{}", line);
                }
                if record.target() == "security" {
                    if let Some(ref sec_path) = security_path {
                        if let Ok(mut sf) = std::fs::OpenOptions::new().create(true).append(true).open(sec_path) {
                            let _ = writeln!(sf, "{}", line);
                        }
                    }
                }
                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
        }
        None => {
            builder.format(|fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
            });
        }
    }
    let _ = builder.try_init();
}

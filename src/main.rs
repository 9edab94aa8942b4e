mod config;
mod display;
mod predict;
mod shutdown;
mod tracker;
mod web;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{Config, ConfigError, Overrides};
use crate::predict::{PredictError, Satellite, Sgp4Provider, TleLoader, TrajectoryProvider};
use crate::shutdown::{Shutdown, ShutdownReason};
use crate::tracker::{StateDistributor, TrackerError, TrackingLoop};
use crate::web::{AppState, TextMirror};

#[derive(Parser)]
#[command(name = "visible-ephemeris")]
#[command(about = "Real-time satellite visibility tracker")]
struct Cli {
    /// Session config file (created on save if missing)
    #[arg(short, long, default_value = "config.yaml", global = true)]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track satellites and serve the web API and text mirror
    Run {
        #[command(flatten)]
        overrides: Overrides,
        /// Do not print the table to stdout
        #[arg(short, long)]
        quiet: bool,
    },
    /// Check the config and that the catalog groups load
    ValidateConfig {
        #[command(flatten)]
        overrides: Overrides,
    },
    /// List the satellites the current config would track
    List {
        #[command(flatten)]
        overrides: Overrides,
    },
}

#[derive(Debug, Error)]
enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("catalog error: {0}")]
    Catalog(#[from] PredictError),
    #[error("tracker error: {0}")]
    Tracker(#[from] TrackerError),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
    #[error("failed to start runtime: {0}")]
    Runtime(std::io::Error),
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { overrides, quiet } => run(&cli.config, overrides, quiet),
        Commands::ValidateConfig { overrides } => validate_config(&cli.config, overrides),
        Commands::List { overrides } => list(&cli.config, overrides),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: &Path, overrides: Overrides) -> Result<Config, AppError> {
    let mut config = Config::load_or_default(path)?;
    overrides.apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn load_catalog(config: &Config) -> Result<Vec<Satellite>, AppError> {
    let loader = TleLoader::new(config.tle_dir.clone());
    let satellites = loader.load_groups(&config.group_list(), config.max_apogee_km)?;
    log::info!(
        "Loaded {} satellites from groups '{}'",
        satellites.len(),
        config.groups
    );
    Ok(satellites)
}

fn validate_config(path: &Path, overrides: Overrides) -> Result<(), AppError> {
    let config = load_config(path, overrides)?;
    let satellites = load_catalog(&config)?;
    println!(
        "Config is valid ({} satellites, mode {}, min el {:.1})",
        satellites.len(),
        config.mode,
        config.min_elevation_deg
    );
    Ok(())
}

fn list(path: &Path, overrides: Overrides) -> Result<(), AppError> {
    let config = load_config(path, overrides)?;
    let satellites = load_catalog(&config)?;
    println!("{:>6}  {:<24}  {:>10}", "NORAD", "NAME", "APOGEE km");
    for sat in &satellites {
        println!(
            "{:>6}  {:<24}  {:>10.1}",
            sat.norad_id,
            sat.name,
            sat.elements.apogee_km()
        );
    }
    Ok(())
}

fn run(path: &Path, overrides: Overrides, quiet: bool) -> Result<(), AppError> {
    let config = load_config(path, overrides)?;
    let satellites = load_catalog(&config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(AppError::Runtime)?;
    let reason = runtime.block_on(serve(config.clone(), satellites, quiet));
    // Pass predictions still running on blocking threads are abandoned.
    runtime.shutdown_timeout(Duration::from_secs(1));

    if reason? == Some(ShutdownReason::Quit { save_config: true }) {
        config.save(path)?;
        log::info!("Saved config to {}", path.display());
    }
    Ok(())
}

async fn bind(addr: &str) -> Result<TcpListener, AppError> {
    TcpListener::bind(addr).await.map_err(|source| AppError::Bind {
        addr: addr.to_string(),
        source,
    })
}

async fn serve(
    config: Config,
    satellites: Vec<Satellite>,
    quiet: bool,
) -> Result<Option<ShutdownReason>, AppError> {
    let config = Arc::new(config);
    let distributor = Arc::new(StateDistributor::new());
    let shutdown = Shutdown::new();

    let web_listener = bind(&config.web.bind).await?;
    let mirror_listener = bind(&config.mirror.bind).await?;

    let provider: Arc<dyn TrajectoryProvider> = Arc::new(Sgp4Provider::default());
    let tracking = TrackingLoop::new(
        Arc::clone(&config),
        provider,
        satellites,
        Arc::clone(&distributor),
    )?;

    tokio::spawn(shutdown::watch_interrupt(shutdown.clone()));
    match shutdown::spawn_console(shutdown.clone()) {
        Ok(()) => log::info!("Console: q = save config and quit, x = quit without saving"),
        Err(e) => log::warn!("Console commands unavailable: {}", e),
    }
    if !quiet {
        tokio::spawn(display::run_terminal_view(
            Arc::clone(&distributor),
            shutdown.signal(),
        ));
    }

    let web = {
        let state = AppState {
            config: Arc::clone(&config),
            distributor: Arc::clone(&distributor),
        };
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = web::run_server(web_listener, state, shutdown.signal()).await {
                log::error!("Web server failed: {}", e);
                shutdown.trigger(ShutdownReason::Interrupted);
            }
        })
    };
    let mirror = tokio::spawn(
        TextMirror::new(Arc::clone(&distributor), config.mirror.io_timeout)
            .run(mirror_listener, shutdown.signal()),
    );

    tracking.run(shutdown.signal()).await;

    let _ = web.await;
    let _ = mirror.await;
    Ok(shutdown.reason())
}

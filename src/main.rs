use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use threadkeeper::application::errors::BotError;
use threadkeeper::application::handler::Services;
use threadkeeper::application::messaging::EventDispatcher;
use threadkeeper::application::registry::{CommandRegistry, HandlerCatalog};
use threadkeeper::domain::entities::InboundEvent;
use threadkeeper::domain::traits::ChatApi;
use threadkeeper::infrastructure::adapters::{ConsoleAdapter, TelegramAdapter};
use threadkeeper::infrastructure::config::{BotConfig, ConfigHandle, TelegramConfig, DEFAULT_CONFIG_PATH};
use threadkeeper::infrastructure::open_store;
use threadkeeper::infrastructure::remote::RemoteClients;
use threadkeeper::infrastructure::units::FsUnitStore;

const EVENT_QUEUE: usize = 256;
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(60);
const COOLDOWN_MAX_AGE: Duration = Duration::from_secs(60 * 60);

#[derive(Parser)]
#[command(name = "threadkeeper")]
#[command(about = "Chat automation bot with hot-reloadable commands", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Telegram bot token (overrides config)
    #[arg(short, long, global = true)]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot
    Run,
    /// Show version
    Version,
    /// Print a default config
    InitConfig,
    /// Load every command unit and report the resolved table
    Check,
}

/// Why the event loop stopped
enum Shutdown {
    Restart,
    Interrupted,
    InputClosed,
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            println!("threadkeeper v{}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        Commands::InitConfig => match BotConfig::default().to_pretty_json() {
            Ok(json) => {
                println!("{}", json);
                println!("\nSave this to {} and adjust as needed.", DEFAULT_CONFIG_PATH);
                ExitCode::SUCCESS
            }
            Err(e) => {
                tracing::error!("Failed to render config: {}", e);
                ExitCode::FAILURE
            }
        },
        Commands::Check => block_on(check_units(cli.config)),
        Commands::Run => block_on(run_bot(cli.config, cli.token)),
    }
}

/// One thread, cooperative scheduling: handlers interleave only at awaits
fn block_on<F>(future: F) -> ExitCode
where
    F: std::future::Future<Output = Result<ExitCode, BotError>>,
{
    let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };
    match rt.block_on(future) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: &PathBuf, token: Option<String>) -> Result<BotConfig, BotError> {
    let mut config = BotConfig::load(path)?.apply_env();
    if let Some(token) = token {
        config.telegram.get_or_insert_with(TelegramConfig::default).token = Some(token);
    }
    config.validate()?;
    Ok(config)
}

async fn build_registry(config: &ConfigHandle) -> Result<Arc<CommandRegistry>, BotError> {
    let units = FsUnitStore::new(config.read(|c| c.commands_dir.clone()));
    units.init().await?;
    tracing::info!("Loading command units from {}", units.dir().display());

    let registry = Arc::new(CommandRegistry::new(
        Arc::new(units),
        HandlerCatalog::with_builtins(),
        config.clone(),
    ));
    let report = registry.load_all().await?;
    tracing::info!(
        "Loaded {} commands with {} aliases ({} disabled, {} failed)",
        report.loaded,
        report.aliases,
        report.skipped_disabled.len(),
        report.failures.len()
    );
    for (unit, error) in &report.failures {
        tracing::warn!("Unit {} not loaded: {}", unit, error);
    }
    Ok(registry)
}

async fn check_units(config_path: PathBuf) -> Result<ExitCode, BotError> {
    let config = ConfigHandle::in_memory(load_config(&config_path, None)?);
    let registry = build_registry(&config).await?;

    let mut descriptors = registry.descriptors();
    descriptors.sort_by(|a, b| a.name().cmp(b.name()));
    for descriptor in &descriptors {
        let aliases = if descriptor.aliases().is_empty() {
            String::new()
        } else {
            format!(" (aliases: {})", descriptor.aliases().join(", "))
        };
        println!(
            "{:<12} {:<8} {}.yaml{}",
            descriptor.name(),
            descriptor.config.permission,
            descriptor.unit,
            aliases
        );
    }
    println!("{} commands, {} aliases", registry.len(), registry.alias_count());

    // Reload everything once more to surface collisions and broken units
    let report = registry.load_all().await?;
    for name in &report.skipped_disabled {
        println!("disabled: {}", name);
    }
    for (unit, error) in &report.failures {
        println!("failed: {}: {}", unit, error);
    }

    Ok(if report.failures.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn run_bot(config_path: PathBuf, token_override: Option<String>) -> Result<ExitCode, BotError> {
    let config = load_config(&config_path, token_override)?;
    let token = config
        .telegram
        .as_ref()
        .and_then(|t| t.token.clone())
        .filter(|t| !t.is_empty());
    let store_config = config.store.clone();
    let config = ConfigHandle::new(config, &config_path);
    tracing::info!("Starting threadkeeper v{}", env!("CARGO_PKG_VERSION"));

    let registry = build_registry(&config).await?;
    let store = open_store(&store_config).await?;
    let http = reqwest::Client::new();
    let (tx, mut rx) = mpsc::channel::<InboundEvent>(EVENT_QUEUE);

    // Select adapter
    let api: Arc<dyn ChatApi> = if let Some(token) = token {
        let telegram = Arc::new(TelegramAdapter::new(token, http.clone()));
        telegram.connect().await?;
        let poller = telegram.clone();
        tokio::spawn(async move {
            if let Err(e) = poller.run(tx).await {
                tracing::error!("Telegram polling stopped: {}", e);
            }
        });
        telegram
    } else {
        tracing::info!("No Telegram token configured, using the console");
        let console = Arc::new(ConsoleAdapter::default());
        let reader = console.clone();
        tokio::spawn(async move {
            if let Err(e) = reader.run(tx).await {
                tracing::error!("Console input failed: {}", e);
            }
        });
        console
    };

    let root = std::env::current_dir().map_err(|e| BotError::Internal(e.to_string()))?;
    let services = Services::new(api, store, config, registry)
        .with_remote(RemoteClients::new(http))
        .with_root(root);
    let shutdown = services.shutdown.clone();
    spawn_housekeeping(services.clone());

    let dispatcher = Arc::new(EventDispatcher::new(services));
    tracing::info!("Bot is running");

    let reason = loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else {
                    break Shutdown::InputClosed;
                };
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move { dispatcher.dispatch(event).await });
            }
            _ = shutdown.notified() => break Shutdown::Restart,
            _ = tokio::signal::ctrl_c() => break Shutdown::Interrupted,
        }
    };

    Ok(match reason {
        Shutdown::Restart => {
            tracing::info!("Exiting for restart");
            ExitCode::from(1)
        }
        Shutdown::Interrupted => {
            tracing::info!("Interrupted, shutting down");
            ExitCode::SUCCESS
        }
        Shutdown::InputClosed => {
            tracing::info!("Event source closed, shutting down");
            ExitCode::SUCCESS
        }
    })
}

/// Sweep expired waiters and stale cooldowns; per-entry timers cover the rest
fn spawn_housekeeping(services: Services) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(HOUSEKEEPING_INTERVAL);
        loop {
            interval.tick().await;
            let purged = services.interactions.purge_expired();
            if purged > 0 {
                tracing::debug!("Purged {} expired interactions", purged);
            }
            services.cooldowns.prune(COOLDOWN_MAX_AGE);
        }
    });
}

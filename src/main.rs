use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Use the library instead of redeclaring modules
use clip_flywheel::{
    app::LifecycleController, collaborators::Collaborators, config::Config, database::Database,
    jobs,
};

#[derive(Parser)]
#[command(name = "clip-flywheel")]
#[command(version = "0.1.0")]
#[command(about = "An unattended short-form clip ingestion, highlight and publishing loop")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Database URL (overrides config file)
    #[arg(short = 'd', long, value_name = "URL")]
    database_url: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging with specified level
    let log_filter = format!("clip_flywheel={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clip-flywheel v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration from specified file
    std::env::set_var("CONFIG_FILE", &cli.config);
    let mut config = Config::load()?;
    info!("Configuration loaded from: {}", cli.config);

    // Override config with CLI arguments
    if let Some(database_url) = cli.database_url {
        config.database.url = database_url;
    }
    config.validate()?;

    let database = Database::new(&config.database).await?;
    database.migrate().await?;
    info!("Database initialized: {}", config.database.url);

    let config = Arc::new(config);
    let collaborators = Arc::new(Collaborators::production(&config));
    let registry = jobs::build_registry(&config)?;
    info!("Registered {} jobs", registry.len());

    let controller = LifecycleController::new(config, database, collaborators, registry);
    controller.start().await?;

    Ok(())
}

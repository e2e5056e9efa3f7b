use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{
    AuthCommand, CameraCommand, ConfigCommand, Context, DeviceCommand, FarmCommand, SiloCommand,
    SyncCommand, WeatherCommand,
};
use farmstead::config::Config;
use farmstead::viewmodels::AuthViewModel;
use farmstead::{init_db, Connectivity, LocalStore, ProbeConnectivity, Repository, SessionStore};
use farmstead_core::ApiClient;

#[derive(Parser)]
#[command(name = "farm")]
#[command(version)]
#[command(about = "Offline-first farm management client", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in, register or log out
    Auth(AuthCommand),

    /// Manage farms
    Farm(FarmCommand),

    /// Manage devices and view sensor readings
    Device(DeviceCommand),

    /// Manage silos
    Silo(SiloCommand),

    /// Manage camera streams
    Camera(CameraCommand),

    /// Show the weather at a farm
    Weather(WeatherCommand),

    /// Run background sync and cache maintenance
    Sync(SyncCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "farmstead=info,farmstead_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let cli_config_path = cli.config.clone();
    let config = Config::load(cli.config)?;

    let command = match cli.command {
        Some(Commands::Config(cmd)) => {
            cmd.run(&config, cli_config_path)?;
            return Ok(());
        }
        Some(command) => command,
        None => {
            println!("Use --help to see available commands");
            return Ok(());
        }
    };

    let ctx = build_context(config).await?;
    match command {
        Commands::Auth(cmd) => cmd.run(&ctx).await?,
        Commands::Farm(cmd) => cmd.run(&ctx).await?,
        Commands::Device(cmd) => cmd.run(&ctx).await?,
        Commands::Silo(cmd) => cmd.run(&ctx).await?,
        Commands::Camera(cmd) => cmd.run(&ctx).await?,
        Commands::Weather(cmd) => cmd.run(&ctx).await?,
        Commands::Sync(cmd) => cmd.run(&ctx).await?,
        Commands::Config(_) => {}
    }

    Ok(())
}

async fn build_context(config: Config) -> Result<Context, Box<dyn std::error::Error>> {
    let pool = init_db(&config.database_path.value).await?;
    let store = LocalStore::new(pool);

    let base_url = config.api.base_url.value.clone();
    let api = ApiClient::new(&base_url, config.api.api_key());
    let probe = Arc::new(
        ProbeConnectivity::from_base_url(&base_url)
            .ok_or_else(|| format!("Invalid API URL: {}", base_url))?,
    );
    probe.refresh().await;
    probe.start_monitor();
    let connectivity: Arc<dyn Connectivity> = probe;
    let repository = Repository::new(store, api, Arc::clone(&connectivity));

    let session = SessionStore::new(&config.session_path.value);
    let user = AuthViewModel::new(repository.clone(), session.clone()).restore();

    Ok(Context {
        config,
        repository,
        connectivity,
        session,
        user,
    })
}

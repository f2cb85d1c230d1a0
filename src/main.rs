#[macro_use]
extern crate tracing;

mod config;
mod context;
mod controller;
mod provider;
mod routes;
mod storage;
mod upload;

#[cfg(test)]
mod tests;
#[cfg(test)]
mod utils;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use mimalloc::MiMalloc;
use poem::listener::TcpListener;
use poem::Server;
use tracing_subscriber::EnvFilter;

pub use crate::provider::AssetProvider;
pub use crate::storage::RecordStore;

use crate::config::RuntimeConfig;
use crate::controller::ImageController;
use crate::provider::backends::Credentials;
use crate::upload::UploadAdapter;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Debug, Parser)]
#[clap(name = "imgdrop", version, about = "Relays image uploads to a cloud provider and records them.")]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Writes a config file holding every default value.
    Init {
        #[clap(short, long, default_value = "config.yaml")]
        out: PathBuf,
    },

    /// Runs the server.
    Run(RunArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    #[clap(short, long, env = "IMGDROP_CONFIG")]
    /// The path to a YAML config file, defaults are used if not given.
    config: Option<PathBuf>,

    #[clap(long, env = "IMGDROP_HOST")]
    /// Overrides the configured bind address.
    host: Option<String>,

    #[clap(long, env = "IMGDROP_PORT")]
    /// Overrides the configured port.
    port: Option<u16>,

    #[clap(long, env = "CLOUDINARY_CLOUD_NAME")]
    cloud_name: Option<String>,

    #[clap(long, env = "CLOUDINARY_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[clap(long, env = "CLOUDINARY_API_SECRET", hide_env_values = true)]
    api_secret: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Loaded before the filter is built so RUST_LOG may live in .env.
    let env_file = env_file_outcome(dotenvy::dotenv());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("imgdrop=debug,poem=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    match env_file {
        Ok(Some(path)) => info!("Loaded environment from {:?}", path),
        Ok(None) => debug!("No .env file found"),
        Err(e) => warn!("Ignoring malformed .env file: {}", e),
    }

    let cli = Cli::parse();
    match cli.command {
        Commands::Init { out } => run_init(out).await,
        Commands::Run(args) => run_server(args).await,
    }
}

/// Treats a missing `.env` file as nothing to load while keeping
/// every other failure.
fn env_file_outcome<T>(result: dotenvy::Result<T>) -> dotenvy::Result<Option<T>> {
    match result {
        Ok(loaded) => Ok(Some(loaded)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

async fn run_init(out: PathBuf) -> Result<()> {
    let template = serde_yaml::to_string(&RuntimeConfig::default())?;
    tokio::fs::write(&out, template).await?;
    info!("Wrote default config to {:?}", &out);

    Ok(())
}

async fn run_server(args: RunArgs) -> Result<()> {
    let mut cfg = match &args.config {
        Some(path) => RuntimeConfig::from_file(path).await?,
        None => {
            info!("No config file given, using defaults");
            RuntimeConfig::default()
        },
    };

    if let Some(host) = args.host {
        cfg.host = host;
    }
    if let Some(port) = args.port {
        cfg.port = port;
    }
    cfg.provider.with_credentials(Credentials {
        cloud_name: args.cloud_name,
        api_key: args.api_key,
        api_secret: args.api_secret,
    });

    let store = cfg.store.connect().await?;
    let provider = cfg.provider.connect()?;

    let adapter = UploadAdapter::new(provider, cfg.upload.clone());
    info!(
        "Uploads go to folder {:?} as {:?}, limited to {} bytes",
        &adapter.cfg().folder,
        &adapter.cfg().allowed_formats,
        adapter.cfg().max_upload_size,
    );
    let controller = Arc::new(ImageController::new(adapter, store));

    let addr: SocketAddr = format!("{}:{}", &cfg.host, cfg.port).parse()?;
    let app = routes::build_app(controller, &format!("http://{}", addr));

    info!("Server is running on {}", addr);
    Server::new(TcpListener::bind(addr))
        .run(app)
        .await?;

    Ok(())
}

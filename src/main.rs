use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use repositories::{memory::MemoryRepository, postgres::PgRepository, AdminRepository};
use settings::{Settings, StorageBackend};

mod models;
mod repositories;
pub mod services;
pub mod settings;
pub mod utils;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    #[arg(short, long)]
    listen: Option<String>,
    #[arg(long, default_value = "log4rs.yaml")]
    log4rs: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    let settings = Settings::load(&args.config).expect("Could not load config file.");

    init_logging(&args.log4rs).expect("Failed to initialize logging.");
    log::info!("Starting referral admin service.");

    let repository = open_repository(&settings).await?;
    let channels = services::start_services(repository, settings.commission);

    let listen = args.listen.unwrap_or(settings.server.listen);
    services::http::start_http_server(&listen, channels).await
}

async fn open_repository(settings: &Settings) -> Result<Arc<dyn AdminRepository>> {
    match settings.storage.backend {
        StorageBackend::Postgres => {
            let postgres = settings
                .postgres
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("Missing [postgres] settings."))?;

            let conn = PgPoolOptions::new()
                .max_connections(postgres.max_connections)
                .connect(&postgres.url)
                .await?;
            let repository = PgRepository::new(conn);

            if postgres.run_migrations {
                log::info!("Running database migrations.");
                repository.migrate().await?;
            }

            log::info!("Using postgres storage.");
            Ok(Arc::new(repository))
        }
        StorageBackend::Memory => {
            let repository = match &settings.storage.seed_file {
                Some(path) => MemoryRepository::from_seed_file(path)?,
                None => MemoryRepository::new(),
            };

            log::warn!("Using in-memory storage; changes are lost on restart.");
            Ok(Arc::new(repository))
        }
    }
}

fn init_logging(path: &str) -> Result<(), anyhow::Error> {
    if !Path::new("logs").exists() {
        fs::create_dir("logs")?;
    }

    match log4rs::init_file(path, Default::default()) {
        Ok(_) => {
            println!("[*] Logging initialized successfully.");
            Ok(())
        }
        Err(e) => {
            println!("[ERROR] Failed to initialize logging: {}", e);
            Err(anyhow::anyhow!("Could not initialize logging: {}", e))
        }
    }
}

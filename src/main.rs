use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

use rester::database::{ConnectionMonitor, DocumentStore, MemoryStore, PgStore};
use rester::identity::IdentityConfig;
use rester::manifest::Manifest;

#[derive(Parser)]
#[command(name = "rester")]
#[command(about = "Serve schema-driven CRUD resources described by a YAML manifest")]
#[command(version)]
struct Cli {
    #[arg(long, help = "Port to listen on (defaults to PORT or 3000)")]
    port: Option<u16>,

    #[arg(long, help = "PostgreSQL URL (defaults to DATABASE_URL; in-memory store when neither is set)")]
    database_url: Option<String>,

    #[arg(long, value_name = "YAML", help = "Resource manifest")]
    resources: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = rester::config::config();
    tracing::info!("Starting rester in {:?} mode", config.environment);

    let manifest = match &cli.resources {
        Some(path) => Manifest::load(path)?,
        None => Manifest::default(),
    };

    let database_url = cli.database_url.or_else(|| std::env::var("DATABASE_URL").ok());
    let (store, monitor): (Arc<dyn DocumentStore>, Option<ConnectionMonitor>) = match database_url {
        Some(url) => {
            let monitor = ConnectionMonitor::start(&url, &config.database)?;
            (Arc::new(PgStore::new(monitor.pool())), Some(monitor))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, records are kept in memory");
            (Arc::new(MemoryStore::new()), None)
        }
    };

    let mut app = rester::app::router(
        store,
        manifest,
        IdentityConfig::from_app_config(config),
        monitor.clone(),
    )
    .await?;
    if config.security.enable_cors {
        app = app.layer(CorsLayer::permissive());
    }
    if config.api.enable_request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }

    let port = cli.port.unwrap_or(config.api.port);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("rester listening on http://{}", bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    if let Some(monitor) = monitor {
        monitor.shutdown().await;
    }
    Ok(())
}

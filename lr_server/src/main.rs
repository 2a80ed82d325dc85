//! Live ranking server.
//!
//! Serves rankings over HTTP and WebSocket and runs the broadcast and
//! auto-calculation sweeps in the background.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Error;
use live_ranking::{
    RankingEngine,
    auth::TokenService,
    broadcast::TopicHub,
    db::{
        CompetitionDirectory, Database, MemoryStore, PgCompetitionDirectory,
        PgRankingRepository, RankingRepository,
    },
};
use log::info;
use lr_server::{api, config::ServerConfig, logging, metrics, tasks};
use pico_args::Arguments;

const HELP: &str = "\
Run the live ranking server

USAGE:
  lr_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:8080]
  --db-url     URL         Database connection string  [default: env DATABASE_URL or postgres://postgres@localhost/live_ranking]

FLAGS:
  --in-memory              Serve from an in-process store instead of PostgreSQL
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  DATABASE_URL             PostgreSQL connection string
  JWT_SECRET               JWT verification secret (at least 32 characters)
  BROADCAST_SWEEP_SECS     Pending-update sweep period [default: 5]
  AUTO_CALC_SWEEP_SECS     Auto-calculation sweep period [default: 10]
  BROADCAST_MAX_ATTEMPTS   Delivery attempts per update [default: 20]
  MAX_SCORE_CACHE_TTL_SECS Maximum-score cache lifetime [default: 3600]
  METRICS_BIND             Prometheus exporter address (disabled when unset)
  RUST_LOG                 Log filter [default: info,sqlx=warn,hyper=warn]
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let in_memory = pargs.contains("--in-memory");
    let bind: Option<SocketAddr> = pargs.opt_value_from_str("--bind")?;
    let database_url: Option<String> = pargs.opt_value_from_str("--db-url")?;

    let config = ServerConfig::from_env(bind, database_url, in_memory)?;

    logging::init();
    info!("Starting live ranking server at {}", config.bind);

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(|e| anyhow::anyhow!(e))?;
        info!("Prometheus metrics at http://{addr}/metrics");
    }

    let (directory, repository): (Arc<dyn CompetitionDirectory>, Arc<dyn RankingRepository>) =
        if config.in_memory {
            info!("Using the in-memory store; rankings are lost on exit");
            let store = Arc::new(MemoryStore::new());
            let directory: Arc<dyn CompetitionDirectory> = store.clone();
            let repository: Arc<dyn RankingRepository> = store;
            (directory, repository)
        } else {
            info!("Connecting to database");
            let db = Database::new(&config.database)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;
            db.migrate()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to apply migrations: {}", e))?;
            info!("Database connected successfully");

            let pool = Arc::new(db.pool().clone());
            let directory: Arc<dyn CompetitionDirectory> =
                Arc::new(PgCompetitionDirectory::new(pool.clone()));
            let repository: Arc<dyn RankingRepository> = Arc::new(PgRankingRepository::new(pool));
            (directory, repository)
        };

    let hub = Arc::new(TopicHub::default());
    let engine = Arc::new(RankingEngine::new(
        directory,
        repository,
        hub.clone(),
        config.engine.clone(),
    ));
    let tokens = TokenService::new(&config.jwt_secret)
        .map_err(|e| anyhow::anyhow!("Invalid JWT secret: {}", e))?;

    let broadcast_sweep = tasks::spawn_broadcast_sweep(engine.clone(), config.broadcast_sweep);
    let auto_calc_sweep = tasks::spawn_auto_calculation_sweep(engine.clone(), config.auto_calc_sweep);
    info!(
        "Background sweeps running (broadcast every {:?}, auto-calculation every {:?})",
        config.broadcast_sweep, config.auto_calc_sweep
    );

    let app = api::create_router(api::AppState::new(engine, hub, tokens));

    info!("Starting HTTP/WebSocket server on {}", config.bind);
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", config.bind, e))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    broadcast_sweep.abort();
    auto_calc_sweep.abort();
    info!("Shutting down server...");

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {e}");
    }
}

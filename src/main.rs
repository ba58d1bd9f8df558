use std::{net::SocketAddr, sync::Arc};

use tracing::info;
use tracing_subscriber::EnvFilter;

use formgate::{
    config::{self, StorageBackend},
    db::{connect_db, initialize_db, MemStorage, PgStorage, Storage},
    handler::{build_router, AppState},
};

#[tokio::main]
async fn main() -> config::Result<()> {
    let cfg = config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cfg.env.default_log_filter())),
        )
        .with_ansi(cfg.env.ansi_logs())
        .init();

    info!("Starting formgate in {:?} mode", cfg.env);

    let storage: Arc<dyn Storage> = match &cfg.storage {
        StorageBackend::Postgres { database_url } => {
            let pool = connect_db(database_url).await?;
            initialize_db(&pool).await?;
            info!("Connected to Postgres");
            Arc::new(PgStorage::new(pool))
        }
        StorageBackend::Memory => {
            info!("Using in-memory storage; submissions are lost on restart");
            Arc::new(MemStorage::new())
        }
    };

    let app = build_router(AppState::new(storage));

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.http_port));
    info!("Listening on http://{}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;

    Ok(())
}

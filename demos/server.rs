//! Demo server: loads resources from CONFIG_PATH, serves them from PostgreSQL
//! when DATABASE_URL is set and from the seeded in-memory store otherwise.
//!
//! Run: `cargo run --example server`

use mini_graph::{load_from_path, resolve, router, AppState, MemoryStore, PgStore, Settings};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mini_graph=info")))
        .init();

    let configs = load_from_path(&settings.config_path).await?;
    let registry = resolve(&configs)?;

    let state = match &settings.database_url {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(settings.max_connections)
                .connect(url)
                .await?;
            tracing::info!(max_connections = settings.max_connections, "using postgres store");
            AppState::new(registry, PgStore::new(pool))
        }
        None => {
            let store = MemoryStore::load_seed(&settings.seed_path).await?;
            tracing::info!(seed = %settings.seed_path.display(), "using in-memory store");
            AppState::new(registry, store)
        }
    };

    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

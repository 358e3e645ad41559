use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use forum_auth::Authenticator;
use forum_gateway::registry::ConnectionRegistry;
use forum_server::config::Config;
use forum_server::state::{AppState, AppStateInner};
use forum_store::{SharedStore, memory::MemoryStore, sqlite::SqliteStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "forum=debug,tower_http=debug".into()),
        )
        .init();

    let store: SharedStore = if config.db_path == ":memory:" {
        info!("running on the in-memory store; nothing will survive a restart");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(SqliteStore::open(Path::new(&config.db_path))?)
    };

    let state: AppState = Arc::new(AppStateInner {
        store,
        auth: Authenticator::new(config.secret_key, config.token_ttl),
        registry: ConnectionRegistry::new(),
    });

    let app = forum_server::router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("forum server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

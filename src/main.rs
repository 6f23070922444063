use sportsbook_core::config::Config;
use sportsbook_core::eventbus::EventBus;
use sportsbook_core::http::{self, AppState};
use sportsbook_core::runtime::AppRegistries;
use sportsbook_core::store::{InMemoryEventStore, InMemoryStateStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = Arc::new(Config::from_env());

    // In-memory stores are the default backing; swap for `SledEventStore`/a
    // sled-backed `StateStore` impl to persist across restarts (spec §9's
    // "abstract EventStore/StateStore so the backing technology is a detail").
    let registries = Arc::new(AppRegistries::new(
        InMemoryStateStore::new(),
        InMemoryStateStore::new(),
        InMemoryStateStore::new(),
        InMemoryStateStore::new(),
        InMemoryEventStore::new(),
        InMemoryStateStore::new(),
        config.currency,
        config.volatility,
        config.cashout,
    ));
    let bus = Arc::new(EventBus::new());

    let state = AppState { registries, bus, config: config.clone() };
    let app = http::router(state);

    let addr: SocketAddr = config.server.bind_addr.parse().unwrap_or_else(|_| {
        eprintln!("invalid bind address: {}, falling back to 0.0.0.0:8080", config.server.bind_addr);
        SocketAddr::from(([0, 0, 0, 0], 8080))
    });

    tracing::info!(%addr, "sportsbook core listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}

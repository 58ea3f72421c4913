//! Process entrypoint: wires configuration, the pool core, and the
//! `gateway-api` façade into a running server, in the shape of
//! `riptide-api`'s `main.rs` (tracing init first, then config, then state,
//! then router, then a graceful-shutdown `axum::serve`).

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use gateway_api::middleware::rate_limit::new_limiter;
use gateway_api::state::AppState;
use gateway_driver::MockDriver;
use gateway_events::EventBus;
use gateway_pool::PoolManager;
use gateway_session::InMemorySessionStore;
use gateway_types::SessionStore;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "gateway-server")]
#[command(about = "Browser gateway: brokers a pool of headless browser instances")]
struct Args {
    /// Address to bind the HTTP/WebSocket façade to.
    #[arg(long, env = "GATEWAY_BIND", default_value = "0.0.0.0:8088")]
    bind: String,

    /// Requests per minute allowed per API key before 429s kick in.
    #[arg(long, env = "GATEWAY_RATE_LIMIT_PER_MINUTE", default_value_t = 600)]
    rate_limit_per_minute: u32,

    /// Default `acquire` timeout when a caller doesn't specify one, in ms.
    #[arg(long, env = "GATEWAY_DEFAULT_ACQUIRE_TIMEOUT_MS", default_value_t = 30_000)]
    default_acquire_timeout_ms: u64,

    /// Run the JSON-RPC surface over stdio instead of binding a socket.
    #[arg(long)]
    stdio: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %args.bind,
        "starting browser gateway"
    );

    let config = gateway_config::load_from_env()?;
    tracing::info!(
        max_browsers = config.max_browsers,
        min_browsers = config.min_browsers,
        max_pages_per_browser = config.max_pages_per_browser,
        "pool configuration loaded"
    );

    let driver = build_driver();
    let bus = Arc::new(EventBus::default());
    let pool = PoolManager::new(config, driver, bus.clone())?;
    pool.initialize().await?;
    tracing::info!("pool core initialized, background loops running");

    let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let limiter = Arc::new(new_limiter(args.rate_limit_per_minute));
    let state = AppState::new(
        pool.clone(),
        sessions.clone(),
        bus,
        limiter,
        args.default_acquire_timeout_ms,
    );

    if args.stdio {
        tracing::info!("serving JSON-RPC over stdio");
        let operator = sessions
            .create("stdio-operator", vec!["operator".into()], u64::MAX)
            .await?;
        gateway_api::rpc::serve_stdio(Arc::new(state), operator.session_id).await;
    } else {
        let app = gateway_api::router(state);
        let addr: SocketAddr = args.bind.parse()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(bind_address = %addr, "browser gateway listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("shutting down pool");
        pool.shutdown(false).await?;
    }

    tracing::info!("browser gateway shutdown complete");
    Ok(())
}

#[cfg(feature = "chrome")]
fn build_driver() -> Arc<dyn gateway_types::LifecycleDriver> {
    Arc::new(gateway_driver::ChromeDriver::new(None))
}

#[cfg(not(feature = "chrome"))]
fn build_driver() -> Arc<dyn gateway_types::LifecycleDriver> {
    Arc::new(MockDriver::new())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut handler) => {
                handler.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, initiating graceful shutdown"),
        _ = terminate => tracing::info!("received SIGTERM, initiating graceful shutdown"),
    }
}

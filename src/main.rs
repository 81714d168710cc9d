use mimalloc::MiMalloc;
use order_desk::config::{AuthMode, Config};
use order_desk::router::{AppState, app_router};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = Config::load()?;
    order_desk::logging::init(&cfg.server.loglevel);

    info!(
        listen_addr = %cfg.server.listen_addr,
        auth_mode = ?cfg.auth.mode,
        api_key = if cfg.server.api_key.is_some() { "<set>" } else { "<unset>" },
        loglevel = %cfg.server.loglevel,
    );
    if cfg.auth.mode == AuthMode::Oauth && cfg.auth.cookie_secret.is_none() {
        warn!("auth.cookie_secret not set; sessions will not survive a restart");
    }

    let state = AppState::from_config(&cfg)?;
    let app = app_router(state);

    let listener = TcpListener::bind(&cfg.server.listen_addr).await?;
    info!("HTTP server listening on {}", cfg.server.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

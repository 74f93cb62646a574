mod config;
mod error;
mod room;
mod routes;
mod state;
mod ws;
mod utils {
    pub mod clean;
    pub mod clock;
    pub mod shutdown;
}

use axum::Extension;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{config::Config, error::AppErr, state::AppState, utils::{clean, shutdown}};

#[tokio::main]
async fn main() -> Result<(), AppErr> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg    = Config::from_env()?;
    let state  = AppState::new(Default::default());
    let cancel = CancellationToken::new();

    let gc = tokio::spawn(clean::task(state.rooms.clone(), cancel.clone()));   // room sweeper
    tokio::spawn(shutdown::on_signal(cancel.clone()));

    let app = routes::router(&cfg.static_dir)
        .layer(Extension(state.mux.clone()))
        .layer(Extension(cancel.clone()))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(cfg.addr).await?;
    info!(addr = %cfg.addr, "listening");
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(cancel.clone().cancelled_owned())
        .await?;

    cancel.cancel();
    gc.await?;
    info!("stopped");
    Ok(())
}

use log::info;
use unveil_shared::config::Config;

mod handlers;
mod models;
mod routes;
mod state;

#[cfg(test)]
mod tests;

use crate::routes::create_router_with_state;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting Unveil API service");

    let config = Config::from_env()?;
    let state = AppState::from_config(&config);
    let app = create_router_with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Unveil API listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

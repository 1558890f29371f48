mod accessibility;
mod api;
mod app;
mod clock;
mod config;
mod data;
mod db;
mod models;
mod rewards;
mod srs;

use std::sync::Arc;
use anyhow::Context;
use tower_http::services::ServeDir;

use crate::api::{app_router, ApiState};
use crate::app::App;
use crate::clock::SystemClock;
use crate::config::Config;
use crate::db::Db;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    log::info!("Opening database {}", config.database_url);
    let db = Db::connect(&config.database_url, config.max_connections).await?;

    let app = App::new(db, Arc::new(SystemClock));
    let mut router = app_router(ApiState { app: Arc::new(app) });

    if let Some(dir) = &config.static_dir {
        log::info!("Serving static files from {}", dir.display());
        router = router.fallback_service(ServeDir::new(dir));
    }

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    log::info!("Pathfinder listening on http://{}", config.bind_addr);

    axum::serve(listener, router).await?;
    Ok(())
}

use actix_web::{web, App, HttpServer};
use matchmaker::{EngineConfig, Store, ViewEngine};
use std::path::PathBuf;
use std::sync::Arc;

mod handlers;

/// Shared application state
pub struct AppState {
    pub store: Store,
    pub engine: ViewEngine<Store>,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Starting matchmaker server");

    let db_path = std::env::var("MATCHMAKER_DB").unwrap_or_else(|_| "matchmaker.db".to_string());
    let host = std::env::var("MATCHMAKER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("MATCHMAKER_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    let config = load_config().map_err(std::io::Error::other)?;
    log::info!("Engine config: {config:?}");

    log::info!("Opening store at: {db_path}");
    let store = Store::open(&PathBuf::from(&db_path)).map_err(std::io::Error::other)?;
    let engine = ViewEngine::new(Arc::new(store.clone()), config);

    let state = web::Data::new(AppState { store, engine });

    log::info!("Listening on {host}:{port}");
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(web::JsonConfig::default().limit(16 * 1024 * 1024))
            .configure(handlers::configure)
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}

/// `MATCHMAKER_CONFIG` file if set, then `MATCHMAKER_*` overrides.
fn load_config() -> matchmaker::Result<EngineConfig> {
    let base = match std::env::var("MATCHMAKER_CONFIG") {
        Ok(path) => EngineConfig::load(&PathBuf::from(path))?,
        Err(_) => EngineConfig::default(),
    };
    base.with_env_overrides(|key| std::env::var(key).ok())
}

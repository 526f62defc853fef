mod config;
mod error;
mod inference;
mod reports;
mod routes;
mod state;
mod storage;

use actix_web::{App, HttpServer, middleware, web};
use config::AppConfig;
use routes::{configure_routes, cors};
use state::AppState;
use std::env;

fn startup_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    log::error!("{}: {}", context, err);
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = AppConfig::load().map_err(|e| startup_error("Invalid configuration", e))?;

    storage::ensure_directories(&[config.upload_dir.as_path(), config.static_dir.as_path()])?;
    log::info!("Upload folder: {}", config.upload_dir.display());
    log::info!("Static folder: {}", config.static_dir.display());

    let state = AppState::load(config).map_err(|e| startup_error("Error during initialization", e))?;
    let bind_address = state.config.bind_address();
    let static_dir = state.config.static_dir.clone();
    let allowed_origins = state.config.allowed_origins.clone();
    let state = web::Data::new(state);

    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors(&allowed_origins))
            .app_data(state.clone())
            .configure(|cfg| configure_routes(cfg, static_dir.clone()))
    })
    .bind(&bind_address)?
    .run()
    .await
}

use actix_web::{middleware, web, App, HttpServer};
use kioskdb::{builtin_catalog, parse_catalog, Catalog, Store};

mod config;
mod handlers;

use config::Config;

/// Shared application state
pub struct AppState {
    pub store: Store,
}

fn load_catalog(config: &Config) -> kioskdb::Result<Catalog> {
    let catalog = match &config.catalog {
        Some(path) => {
            log::info!("Loading dataset catalog from {}", path.display());
            parse_catalog(path)?
        }
        None => builtin_catalog()?,
    };
    Ok(catalog.with_kiosk_collection(config.collection_name.clone()))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();
    log::info!("Starting KioskDB admin server");

    let config = Config::from_env();
    let store = load_catalog(&config)
        .and_then(|catalog| Store::open(&config.database_url, catalog))
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    let state = web::Data::new(AppState { store });

    log::info!("Listening on {}:{}", config.host, config.port);
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(middleware::Logger::default())
            .configure(handlers::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}

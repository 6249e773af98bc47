mod auth;
mod config;
mod database;
mod error;
mod handlers;
mod models;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::io;
use std::sync::Arc;

use crate::auth::{hash_password, AuthConfig};
use crate::config::{AdminBootstrap, AppConfig, CorsOrigins};
use crate::database::{DirectoryStore, MemoryStore, PgStore};
use crate::models::{normalize_email, NewAdmin};

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::from_env()
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?;

    let store: Arc<dyn DirectoryStore> = match &config.database_url {
        Some(database_url) => {
            let store = PgStore::connect(database_url).await.map_err(|err| {
                log::error!("Failed to initialize database: {err:?}");
                io::Error::new(io::ErrorKind::Other, err.to_string())
            })?;
            Arc::new(store)
        }
        None => {
            log::warn!("DATABASE_URL not set, data is kept in memory and lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    if let Err(err) = store.seed_defaults().await {
        log::error!("Failed to seed default categories and cities: {err:?}");
    } else {
        log::info!("Default categories and cities ensured");
    }

    if let Some(admin) = &config.admin {
        bootstrap_admin(store.as_ref(), admin).await;
    }

    let store_data = web::Data::from(store);
    let auth_data = web::Data::new(AuthConfig::new(
        &config.secret_key,
        config.token_ttl_hours,
    ));
    let cors_origins = config.cors_origins.clone();
    let bind_address = config.bind_address();

    log::info!("🚀 Starting Peça no Zap directory service on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .app_data(store_data.clone())
            .app_data(auth_data.clone())
            .wrap(build_cors(&cors_origins))
            .wrap(Logger::default())
            .configure(handlers::configure)
    })
    .bind(&bind_address)?
    .run()
    .await
}

fn build_cors(origins: &CorsOrigins) -> Cors {
    let cors = match origins {
        CorsOrigins::Any => Cors::default().allow_any_origin(),
        CorsOrigins::List(list) => list
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin)),
    };

    cors.allow_any_method().allow_any_header().max_age(3600)
}

async fn bootstrap_admin(store: &dyn DirectoryStore, admin: &AdminBootstrap) {
    let password_hash = match hash_password(&admin.password) {
        Ok(hash) => hash,
        Err(err) => {
            log::error!("Failed to hash administrator password: {err:?}");
            return;
        }
    };

    let new_admin = NewAdmin {
        email: normalize_email(&admin.email),
        password_hash,
        name: admin.name.clone(),
    };
    match store.ensure_admin(new_admin).await {
        Ok(admin) => log::info!("Administrator account {} ready", admin.email),
        Err(err) => log::error!("Failed to create administrator account: {err:?}"),
    }
}

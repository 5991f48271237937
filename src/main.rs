mod auth;
mod availability;
mod booking;
mod db;
mod error;
mod models;
mod payments;
mod routes;
mod state;
#[cfg(test)]
mod test_util;

use actix_web::{middleware, web, App, HttpServer};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::env;
use std::str::FromStr;
use tokio::sync::broadcast;

use crate::{payments::PaymentConfig, state::AppState};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(err) = run().await {
        eprintln!("Startup error: {err}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .init();

    let db_url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://./data/agendo.db".to_string());
    db::ensure_sqlite_dir(&db_url)?;

    let connect_options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await?;

    db::run_migrations(&pool).await?;
    db::seed_demo(&pool).await?;

    let payments = PaymentConfig {
        upstream_url: env::var("PAYMENT_FUNCTION_URL").ok(),
    };
    if payments.upstream_url.is_none() {
        log::warn!("PAYMENT_FUNCTION_URL not set. Payment authorizations will fail.");
    }

    let (events, _) = broadcast::channel(32);
    let state = AppState {
        db: pool.clone(),
        events,
        http: reqwest::Client::new(),
        payments,
    };

    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(8080);

    let address = format!("0.0.0.0:{port}");
    log::info!("Starting Agendo on http://{address}");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(middleware::Logger::default())
            .configure(routes::account::configure)
            .configure(routes::catalog::configure)
            .configure(routes::appointments::configure)
            .configure(routes::payments::configure)
            .configure(routes::events::configure)
    })
    .bind(address)?
    .run()
    .await?;

    Ok(())
}

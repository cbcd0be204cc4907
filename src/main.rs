use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use tracing::{debug, info};
use tracing_subscriber::FmtSubscriber;

use crate::{
    config::Config,
    database::postgres::PgStore,
    endpoints::{AppState, create_router},
};

mod config;
mod coursework;
mod database;
mod endpoints;
mod error;
mod grading;
mod model;
mod scheduling;

#[tokio::main]
async fn main() {
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            return;
        }
    };

    // Begin logging
    let level = match config.log_level() {
        Ok(l) => l,
        Err(e) => {
            eprintln!("{e}");
            return;
        }
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Could not install logger: {e}");
        return;
    }

    let addr = match config.server.socket_addr() {
        Ok(a) => a,
        Err(e) => {
            tracing::error!("{e}");
            return;
        }
    };

    // Initialize the database, aborting start-up if an error occurs
    let pool = match database::init_database(&config.database).await {
        Ok(p) => p,
        Err(e) => {
            tracing::error!("{e}");
            return;
        }
    };

    info!("Database initialized");

    let state = AppState::new(Arc::new(PgStore::new(pool)), config.grading_parallelism());
    let app = create_router(state);

    let served = match config.server.tls() {
        Some((cert, key)) => {
            // axum-server is built without a crypto provider
            install_crypto_provider();

            let tls = match RustlsConfig::from_pem_file(cert, key).await {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!("Could not load certificate {cert} / {key}: {e}");
                    return;
                }
            };

            info!("Serving HTTPS on {addr}");
            axum_server::bind_rustls(addr, tls)
                .serve(app.into_make_service())
                .await
        }
        None => {
            info!("Serving HTTP on {addr}");
            axum_server::bind(addr).serve(app.into_make_service()).await
        }
    };

    if let Err(e) = served {
        tracing::error!("Server stopped: {e}");
    }
}

/// Installs aws-lc-rs as the process-wide rustls provider. Returns `false` when another
/// provider got there first, which is left in place.
fn install_crypto_provider() -> bool {
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        debug!("A rustls crypto provider was already installed");
        return false;
    }
    true
}

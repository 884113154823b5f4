// src/main.rs

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod category;
mod commerce;
mod config;
mod copy_generation;
mod detail_page;
mod errors;
mod handlers;
mod images;
mod models;
mod prompts;
mod registration;
mod signature;
mod state;
mod token;

use crate::commerce::CommerceGateway;
use crate::config::AppConfig;
use crate::copy_generation::GeminiCopyGenerator;
use crate::handlers::*;
use crate::state::AppState;
use crate::token::{SystemClock, TokenManager};

#[tokio::main]
async fn main() {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "smartstore_listing=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting listing service...");

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("{}", err);
            std::process::exit(1);
        }
    };

    let client = reqwest::Client::new();
    let tokens = Arc::new(TokenManager::new(
        client.clone(),
        config.commerce_api_url.clone(),
        config.commerce_credentials.clone(),
        Arc::new(SystemClock),
    ));
    let commerce = Arc::new(CommerceGateway::new(
        client.clone(),
        config.commerce_api_url.clone(),
        tokens,
    ));
    let copy_generator = Arc::new(GeminiCopyGenerator::new(client, config.gemini.clone()));

    let app_state = Arc::new(AppState::new(
        commerce,
        copy_generator,
        config.registration_timeout,
    ));

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/api/generate", post(generate_copy_handler))
        .route(
            "/api/naver/categories",
            get(list_categories_handler).post(suggest_categories_handler),
        )
        .route("/api/naver/upload", post(upload_images_handler))
        .route("/api/naver/register", post(register_product_handler))
        .route("/api/registrations", post(start_registration_handler))
        .route("/api/registrations/{id}", get(get_registration_handler))
        .route(
            "/api/registrations/{id}/retry",
            post(retry_registration_handler),
        )
        .route("/api/images/crop", post(crop_image_handler))
        .route("/api/detail-page", post(detail_page_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(100 * 1024 * 1024))
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);

    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Could not bind {}: {}", addr, e);
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app.into_make_service()).await {
        tracing::error!("Server error: {}", e);
    }
}

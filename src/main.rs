//! Electrostore Backend
//!
//! Storefront REST backend: product catalogue in SQLite, product images on a
//! remote asset host, and a session gate in front of the merchant dashboard.

mod api;
mod assets;
mod auth;
mod config;
mod db;
mod errors;
mod models;
mod pages;
mod query;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use assets::{AssetHost, CloudinaryHost, UnconfiguredAssetHost};
use auth::{SessionGate, SessionManager};
use config::Config;
use db::{Database, Repository};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub assets: Arc<dyn AssetHost>,
    pub sessions: Arc<SessionManager>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if config.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting Electrostore Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);
    tracing::info!("Protected prefix: {}", config.protected_prefix);

    let sessions = Arc::new(SessionManager::from_config(&config));

    let assets: Arc<dyn AssetHost> = match config.cloudinary.clone() {
        Some(cloudinary) => Arc::new(CloudinaryHost::new(cloudinary)?),
        None => {
            tracing::warn!("No image host configured (CLOUDINARY_*). Product creation will fail!");
            Arc::new(UnconfiguredAssetHost)
        }
    };

    // Initialize database
    let repo = Arc::new(Repository::new(Database::new(&config.db_path)));
    repo.warm_up().await?;

    // Create application state
    let state = AppState {
        repo,
        assets,
        sessions,
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let gate = Arc::new(SessionGate {
        sessions: state.sessions.clone(),
        protected_prefix: state.config.protected_prefix.clone(),
        login_path: state.config.login_path.clone(),
    });

    // API routes
    let api_routes = Router::new()
        // Products
        .route("/products", get(api::list_products).post(api::create_product))
        .route("/products/{id}", get(api::get_product))
        // Auth
        .route("/auth/signup", post(api::signup))
        .route("/auth/login", post(api::login))
        .route("/auth/logout", post(api::logout))
        .route("/auth/session", get(api::session))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes));

    // Dashboard pages, only reachable through the gate
    let prefix = state.config.protected_prefix.trim_end_matches('/');
    let dashboard_root = if prefix.is_empty() { "/" } else { prefix };
    let page_routes = Router::new()
        .route(&state.config.login_path, get(pages::login_page))
        .route(dashboard_root, get(pages::dashboard))
        .route(&format!("{}/add-product", prefix), get(pages::add_product_page));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(page_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(middleware::from_fn_with_state(gate, auth::session_gate)),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

//! BlogNest API
//!
//! Accounts, profiles and blog posts over a REST interface:
//! - `/api/user/*` - registration, sessions and profile (from `blognest-auth`)
//! - `/api/posts/*` - post CRUD, listings and thumbnails
//! - `/uploads/*` - stored avatars and thumbnails
//! - `/health` - liveness

pub mod config;
pub mod extractors;
pub mod handlers;
pub mod models;
pub mod services;

pub use config::AppConfig;
pub use services::ServiceError;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{get, post},
    Json, Router,
};
use blognest_auth::{middleware::require_auth, AuthConfig, AuthPlugin, AuthService};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

/// Room for multipart framing on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Aggregated services container
pub struct BlogServices {
    pub posts: services::PostService,
    pub media: Arc<services::MediaStore>,
    pub auth: Arc<AuthService>,
}

/// Open (and create if needed) the SQLite database
pub async fn connect(database_url: &str) -> Result<SqlitePool, ServiceError> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Run migrations, wire the services and build the full router
pub async fn build_app(
    config: &AppConfig,
    auth_config: AuthConfig,
    db: SqlitePool,
) -> Result<Router, ServiceError> {
    tracing::info!("Activating BlogNest API");

    let media = Arc::new(services::MediaStore::new(
        &config.uploads_dir,
        config.max_upload_bytes,
    ));

    // Auth tables first: posts reference users
    let plugin = AuthPlugin::new().with_listener(Arc::new(services::UploadCleanup::new(
        media.clone(),
    )));
    plugin.activate(db.clone(), auth_config).await?;
    let auth = plugin
        .auth_service()
        .await
        .ok_or_else(|| ServiceError::Config("Authentication plugin not active".into()))?;

    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .map_err(sqlx::Error::from)?;

    let services = Arc::new(BlogServices {
        posts: services::PostService::new(db, config.posts_per_page),
        media,
        auth,
    });

    tracing::info!("BlogNest API activated");
    Ok(routes(services, config))
}

/// Compose every route of the API
pub fn routes(services: Arc<BlogServices>, config: &AppConfig) -> Router {
    let auth_layer = axum_middleware::from_fn_with_state(services.auth.clone(), require_auth);

    // Avatar upload needs media storage, so it lives beside the auth routes
    let user_routes = blognest_auth::create_routes(services.auth.clone()).merge(
        Router::new()
            .route("/avatar", post(handlers::media::upload_avatar))
            .layer(auth_layer.clone())
            .with_state(services.clone()),
    );

    // Public routes
    let public = Router::new()
        .route("/", get(handlers::posts::list_posts))
        .route("/:id", get(handlers::posts::get_post))
        .route("/category/:category", get(handlers::posts::posts_by_category))
        .route("/user/:user_id", get(handlers::posts::posts_by_user));

    // Protected routes (require authentication)
    let protected = Router::new()
        .route("/", post(handlers::posts::create_post))
        .route(
            "/:id",
            axum::routing::patch(handlers::posts::update_post)
                .delete(handlers::posts::delete_post),
        )
        .route("/:id/thumbnail", post(handlers::media::upload_thumbnail))
        .layer(auth_layer);

    let post_routes = Router::new()
        .merge(public)
        .merge(protected)
        .with_state(services);

    Router::new()
        .route("/health", get(health))
        .nest("/api/user", user_routes)
        .nest("/api/posts", post_routes)
        .nest_service("/uploads", ServeDir::new(&config.uploads_dir))
        .layer(DefaultBodyLimit::max(
            config.max_upload_bytes + MULTIPART_OVERHEAD,
        ))
        .layer(cors_layer(config))
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origin = config
        .cors_origin
        .as_deref()
        .and_then(|o| HeaderValue::from_str(o).ok());

    match origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    }
}

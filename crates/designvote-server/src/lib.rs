//! Router assembly for the designvote server binary.

pub mod config;

use std::path::Path;
use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use designvote_api::blob::BlobStore;
use designvote_api::designs::MAX_IMAGE_SIZE;
use designvote_api::middleware::require_auth;
use designvote_api::{AppState, AppStateInner, auth, comments, designs};
use designvote_db::Database;
use designvote_gateway::{Gateway, connection};

/// Headroom for multipart framing and the optional text fields.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared state for the HTTP API and the realtime gateway. Both see the same
/// database.
pub fn build_state(db: Arc<Database>, jwt_secret: &str, blobs: Arc<dyn BlobStore>) -> (AppState, Gateway) {
    let gateway = Gateway::new(db.clone(), jwt_secret);
    let app = Arc::new(AppStateInner {
        db,
        jwt_secret: jwt_secret.to_string(),
        blobs,
    });
    (app, gateway)
}

/// Full application router. `upload_dir`, when given, is served at
/// `/uploads` for the local blob store.
pub fn router(app_state: AppState, gateway: Gateway, upload_dir: Option<&Path>) -> Router {
    let public_routes = Router::new()
        .route("/api/v1/reg_temp_user", get(auth::reg_temp_user))
        .route("/api/v1/register", post(auth::register))
        .route("/api/v1/login", post(auth::login))
        .route("/health", get(health))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route(
            "/api/v1/designs",
            get(designs::list_designs)
                .post(designs::upload_design)
                .layer(DefaultBodyLimit::max(MAX_IMAGE_SIZE + MULTIPART_OVERHEAD)),
        )
        .route("/api/v1/comments", get(comments::list_comments).post(comments::post_comment))
        .route("/api/v1/replies", get(comments::list_replies))
        .route_layer(middleware::from_fn_with_state(app_state.clone(), require_auth))
        .with_state(app_state);

    let ws_route = Router::new()
        .route("/gateway", get(connection::ws_upgrade))
        .with_state(gateway);

    let mut app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route);

    if let Some(dir) = upload_dir {
        app = app.nest_service("/uploads", ServeDir::new(dir));
    }

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "ok"
}

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{middleware, routes, state::AppState};

/// Builds the complete HTTP surface around `state`.
pub fn build_router(state: AppState) -> Router {
    let cfg = state.config.clone();
    let body_limit = cfg.server.max_upload_bytes;

    Router::new()
        .route("/", get(routes::health::root))
        .route("/healthz", get(routes::health::healthz))
        .route("/readyz", get(routes::health::readyz))
        .route("/metrics", get(routes::health::metrics))
        .route("/version", get(routes::health::version))
        .route("/login", post(routes::auth::login))
        .route("/users", post(routes::users::create_user))
        .route("/users/{id}", get(routes::users::get_user).delete(routes::users::delete_user))
        .route("/users/{id}/password", put(routes::users::update_password))
        .route("/users/{id}/images", get(routes::users::get_user_images))
        .route("/images", post(routes::images::create_image).get(routes::images::list_images))
        .route("/images/{id}", get(routes::images::get_image).delete(routes::images::delete_image))
        .route("/images/{id}/private", put(routes::images::update_image_privacy))
        .route("/search/images", get(routes::search::search_images))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(from_fn_with_state(cfg, middleware::security_headers::security_headers_middleware))
        .layer(CorsLayer::permissive())
}

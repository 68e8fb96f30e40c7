//! Router assembly, adapted from the teacher's `build_app`
//! (`examples/fourthplaces-mntogether/packages/server/src/server/app.rs`):
//! same CORS/trace/middleware layering style, with the teacher's JWT +
//! `tower_governor` pair swapped for this service's tier resolution and
//! quota-aware rate limiter.

use std::sync::Arc;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::Method;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::{extract_client_ip, resolve_tier_middleware, RateLimitLayer, RateLimiter};
use crate::routes::{categories, health, search};
use crate::state::AppState;

pub fn build_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    let rate_limit_layer = RateLimitLayer::new(RateLimiter::new());

    let router = Router::new()
        .route("/search_knowledge", post(search::search_knowledge))
        .route("/get_decisions", get(categories::get_decisions))
        .route("/get_patterns", get(categories::get_patterns))
        .route("/get_warnings", get(categories::get_warnings))
        .route("/get_methodologies", get(categories::get_methodologies))
        .route("/health", get(health::health_handler));

    // Middleware layers (applied in reverse order - last added runs first):
    // ip_extractor runs first so resolve_tier and the rate limiter can read
    // the ClientIp extension, then resolve_tier so rate limiting can read
    // the Tier/PresentedApiKey extensions it inserts.
    router
        .layer(rate_limit_layer)
        .layer(middleware::from_fn_with_state(state.clone(), resolve_tier_middleware))
        .layer(middleware::from_fn(extract_client_ip))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! Tier-resolution middleware: runs after `extract_client_ip` and before
//! the rate limiter, so the limiter can read the resolved [`Tier`] and
//! credential out of request extensions (spec §4.13).

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::auth::resolve_tier;
use crate::state::AppState;

pub async fn resolve_tier_middleware(State(state): State<Arc<AppState>>, mut request: Request, next: Next) -> Response {
    match resolve_tier(request.headers(), &state.api_keys) {
        Ok((tier, presented_key)) => {
            request.extensions_mut().insert(tier);
            if let Some(key) = presented_key {
                request.extensions_mut().insert(key);
            }
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

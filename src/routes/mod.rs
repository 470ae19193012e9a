//! Route tables.

mod common;
mod resource;

pub use common::common_routes;
pub use resource::resource_routes;

use axum::{middleware, Router};
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{failure_envelope, fallback};
use crate::state::AppState;

/// Largest accepted request body.
pub const BODY_LIMIT_BYTES: usize = 64 * 1024;

/// Full application router: built-in routes, resource routes, and the
/// failure envelope around everything including the fallback.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(common_routes(state.clone()))
        .merge(resource_routes(state))
        .fallback(fallback)
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
        .layer(middleware::from_fn(failure_envelope))
}

//! Resource routes. Kinds are resolved by the handlers against the registry,
//! so one parameterized table serves every configured kind.

use axum::{routing::get, Router};

use crate::handlers::{list, read, related, update};
use crate::state::AppState;

pub fn resource_routes(state: AppState) -> Router {
    Router::new()
        .route("/:kind", get(list))
        .route("/:kind/:id", get(read).post(update))
        .route("/:kind/:id/:edge", get(related))
        .with_state(state)
}

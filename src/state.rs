//! Shared application state for all routes.

use std::sync::Arc;

use crate::registry::Registry;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    /// Built once at start-up, never mutated.
    pub registry: Arc<Registry>,
    pub store: Arc<dyn Store>,
}

impl AppState {
    pub fn new(registry: Registry, store: impl Store + 'static) -> Self {
        AppState {
            registry: Arc::new(registry),
            store: Arc::new(store),
        }
    }
}

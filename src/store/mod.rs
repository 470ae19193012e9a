//! Storage backends. The query layer never talks to a database directly; it
//! hands a [`BoundedQuery`] to a [`Store`].

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::config::ResourceDefinition;
use crate::error::AppError;
use crate::query::BoundedQuery;

/// One row keyed by field name.
pub type Row = Map<String, Value>;

#[async_trait]
pub trait Store: Send + Sync {
    /// Number of rows matching the query filter, ignoring order and window.
    async fn count(&self, resource: &ResourceDefinition, query: &BoundedQuery) -> Result<u64, AppError>;

    /// Rows matching the filter, ordered, projected and windowed.
    async fn fetch(&self, resource: &ResourceDefinition, query: &BoundedQuery) -> Result<Vec<Row>, AppError>;

    /// Row with the given primary-key values (declared key order), all fields.
    async fn fetch_one(&self, resource: &ResourceDefinition, key: &[Value]) -> Result<Option<Row>, AppError>;

    /// Apply `changes` (field index, value) to one row as a single atomic
    /// write and return the stored row.
    async fn update_one(
        &self,
        resource: &ResourceDefinition,
        key: &[Value],
        changes: &[(usize, Value)],
    ) -> Result<Option<Row>, AppError>;

    async fn ping(&self) -> Result<(), AppError>;
}

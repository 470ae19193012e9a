//! mini-graph: a permissioned, configuration-driven query layer over a
//! relational schema, served as a small REST API.

pub mod config;
pub mod error;
pub mod expr;
pub mod extractors;
pub mod handlers;
pub mod permission;
pub mod query;
pub mod registry;
pub mod response;
pub mod routes;
pub mod service;
pub mod settings;
pub mod sql;
pub mod state;
pub mod store;

#[cfg(test)]
mod test_fixtures;

pub use config::{from_json_str, load_from_path, resolve, ResourceConfig, ResourceDefinition};
pub use error::{AppError, ConfigError};
pub use permission::{PermissionMask, Role, UserId};
pub use registry::{Instance, Registry};
pub use response::{ListResponse, Pagination, Pretty};
pub use routes::router;
pub use service::{ListParams, QueryService};
pub use settings::Settings;
pub use state::AppState;
pub use store::{MemoryStore, PgStore, Row, Store};

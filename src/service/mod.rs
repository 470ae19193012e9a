//! QueryService: list, read, traverse and update resources for one caller.

mod query;
pub use query::{ListParams, QueryService};

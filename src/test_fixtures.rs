//! Shared fixtures for unit tests: the classicmodels demo schema and seed.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::config::{from_json_str, resolve, ResourceDefinition};
use crate::registry::Registry;
use crate::store::{MemoryStore, Row};

pub const CLASSICMODELS: &str = include_str!("../demos/classicmodels/resources.json");
pub const SEED: &str = include_str!("../demos/classicmodels/seed.json");

pub fn registry() -> Registry {
    resolve(&from_json_str(CLASSICMODELS).unwrap()).unwrap()
}

fn resource(kind: &str) -> Arc<ResourceDefinition> {
    registry().resolve(kind).unwrap().clone()
}

pub fn employees() -> Arc<ResourceDefinition> {
    resource("employees")
}

pub fn orders() -> Arc<ResourceDefinition> {
    resource("orders")
}

pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}

pub fn seeded_store() -> MemoryStore {
    let seed: HashMap<String, Vec<Row>> = serde_json::from_str(SEED).unwrap();
    MemoryStore::from_seed(seed)
}

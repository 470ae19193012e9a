//! Immutable kind → resource lookup, instance resolution and edge traversal.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::config::ResourceDefinition;
use crate::error::AppError;
use crate::query::{Collection, CompareOp, Operand, Predicate};
use crate::store::{Row, Store};

/// One fetched row together with its resource.
#[derive(Clone, Debug)]
pub struct Instance {
    pub resource: Arc<ResourceDefinition>,
    pub row: Row,
}

/// Built once at start-up; read-only afterwards, so it can be shared freely.
#[derive(Debug, Default)]
pub struct Registry {
    resources: Vec<Arc<ResourceDefinition>>,
    by_kind: HashMap<String, usize>,
}

impl Registry {
    pub fn new(resources: Vec<Arc<ResourceDefinition>>) -> Self {
        let by_kind = resources
            .iter()
            .enumerate()
            .map(|(i, r)| (r.kind.clone(), i))
            .collect();
        Registry { resources, by_kind }
    }

    pub fn resolve(&self, kind: &str) -> Result<&Arc<ResourceDefinition>, AppError> {
        self.by_kind
            .get(kind)
            .map(|&i| &self.resources[i])
            .ok_or_else(|| AppError::UnknownKind(kind.to_string()))
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.resources.iter().map(|r| r.kind.as_str())
    }

    pub fn resources(&self) -> &[Arc<ResourceDefinition>] {
        &self.resources
    }

    pub async fn resolve_instance(&self, store: &dyn Store, kind: &str, id: &str) -> Result<Instance, AppError> {
        let resource = self.resolve(kind)?;
        let key = parse_key(resource, id)?;
        let row = store
            .fetch_one(resource, &key)
            .await?
            .ok_or_else(|| AppError::NotFound {
                kind: kind.to_string(),
                id: id.to_string(),
            })?;
        Ok(Instance {
            resource: Arc::clone(resource),
            row,
        })
    }

    /// Rows of the target resource reached from `instance` through `edge`.
    pub fn related(&self, instance: &Instance, edge: &str) -> Result<Collection, AppError> {
        let resource = &instance.resource;
        let relation = resource.relation(edge).ok_or_else(|| AppError::UnknownRelation {
            kind: resource.kind.clone(),
            edge: edge.to_string(),
        })?;
        let target = self.resolve(&relation.target)?;
        let value = instance
            .row
            .get(&resource.fields[relation.local_field].name)
            .cloned()
            .unwrap_or(Value::Null);
        let scope = if value.is_null() {
            Predicate::Constant(false)
        } else {
            Predicate::Compare {
                op: CompareOp::Eq,
                left: Operand::Column(relation.remote_field),
                right: Operand::Value(value),
            }
        };
        Ok(Collection {
            resource: Arc::clone(target),
            scope: Some(scope),
        })
    }
}

/// Parse a path id into primary-key values. Composite keys take
/// comma-separated components in declared key order.
pub fn parse_key(resource: &ResourceDefinition, id: &str) -> Result<Vec<Value>, AppError> {
    let parts: Vec<&str> = if resource.is_composite_key() {
        id.split(',').collect()
    } else {
        vec![id]
    };
    if parts.len() != resource.primary_key.len() {
        return Err(AppError::Validation(format!(
            "{} ids have {} comma-separated components",
            resource.kind,
            resource.primary_key.len()
        )));
    }
    resource
        .primary_key
        .iter()
        .zip(parts)
        .map(|(&i, part)| {
            let field = &resource.fields[i];
            field
                .field_type
                .coerce(&Value::String(part.to_string()))
                .ok_or_else(|| AppError::InvalidLiteral {
                    field: field.name.clone(),
                    value: part.to_string(),
                    expected: field.field_type.name(),
                })
        })
        .collect()
}

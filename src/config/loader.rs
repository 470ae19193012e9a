//! Load resource config from JSON and resolve it into the registry.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::config::resolved::{FieldDefinition, ForeignKey, Ownership, Relation, ResourceDefinition};
use crate::config::{backref_name, validate, ResourceConfig};
use crate::error::ConfigError;
use crate::registry::Registry;

/// File read from the config directory.
pub const RESOURCES_FILE: &str = "resources.json";

pub fn from_json_str(json: &str) -> Result<Vec<ResourceConfig>, ConfigError> {
    serde_json::from_str(json).map_err(|e| ConfigError::Load(format!("{}: {}", RESOURCES_FILE, e)))
}

pub async fn load_from_path(dir: impl AsRef<Path>) -> Result<Vec<ResourceConfig>, ConfigError> {
    let path = dir.as_ref().join(RESOURCES_FILE);
    let json = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    from_json_str(&json)
}

/// Build the registry from resource configs (validates first).
pub fn resolve(configs: &[ResourceConfig]) -> Result<Registry, ConfigError> {
    validate(configs)?;
    let by_kind: HashMap<&str, &ResourceConfig> = configs.iter().map(|c| (c.kind.as_str(), c)).collect();
    let field_index = |kind: &str, name: &str| -> usize {
        by_kind[kind]
            .fields
            .iter()
            .position(|f| f.name == name)
            .unwrap_or_default()
    };

    let mut resources = Vec::with_capacity(configs.len());
    for c in configs {
        let pk = c.primary_key.names();
        let fields: Vec<FieldDefinition> = c
            .fields
            .iter()
            .map(|f| FieldDefinition {
                name: f.name.clone(),
                column: f.column_name().to_string(),
                field_type: f.type_,
                nullable: f.nullable,
                primary_key: pk.contains(&f.name.as_str()),
                permission: f.permission,
                references: f.references.as_ref().map(|r| ForeignKey {
                    kind: r.kind.clone(),
                    field: field_index(&r.kind, &r.field),
                    backref: backref_name(c, r.backref.as_deref()),
                }),
            })
            .collect();

        let mut relations = Vec::new();
        for (i, f) in fields.iter().enumerate() {
            if let Some(fk) = &f.references {
                relations.push(Relation {
                    name: f.name.clone(),
                    target: fk.kind.clone(),
                    local_field: i,
                    remote_field: fk.field,
                });
            }
        }
        for other in configs {
            for (j, f) in other.fields.iter().enumerate() {
                let Some(r) = &f.references else { continue };
                if r.kind != c.kind {
                    continue;
                }
                relations.push(Relation {
                    name: backref_name(other, r.backref.as_deref()),
                    target: other.kind.clone(),
                    local_field: field_index(&c.kind, &r.field),
                    remote_field: j,
                });
            }
        }

        resources.push(Arc::new(ResourceDefinition {
            kind: c.kind.clone(),
            schema_name: c.schema.clone(),
            table_name: c.table_name().to_string(),
            primary_key: pk.iter().map(|name| field_index(&c.kind, name)).collect(),
            fields,
            permission: c.permission,
            ownership: Ownership {
                owner: c.owner_field.as_deref().map(|n| field_index(&c.kind, n)),
                group: c.group_field.as_deref().map(|n| field_index(&c.kind, n)),
            },
            relations,
        }));
    }

    tracing::info!(resources = resources.len(), "resolved resource registry");
    Ok(Registry::new(resources))
}

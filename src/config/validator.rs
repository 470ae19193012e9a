//! Config validation: identifiers, keys, references and relation names.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;

use crate::config::ResourceConfig;
use crate::error::ConfigError;

/// Path segments served by the common routes; a kind may not shadow them.
pub const RESERVED_KINDS: &[&str] = &["health", "ready", "version"];

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static identifier pattern"))
}

fn check_identifier(kind: &str, name: &str) -> Result<(), ConfigError> {
    if identifier_re().is_match(name) {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentifier {
            kind: kind.to_string(),
            name: name.to_string(),
        })
    }
}

/// Name of the inverse relation a foreign key adds to its target.
pub fn backref_name(config: &ResourceConfig, backref: Option<&str>) -> String {
    backref
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}_set", config.kind))
}

pub fn validate(configs: &[ResourceConfig]) -> Result<(), ConfigError> {
    let mut by_kind: HashMap<&str, &ResourceConfig> = HashMap::new();
    for c in configs {
        check_identifier(&c.kind, &c.kind)?;
        if RESERVED_KINDS.contains(&c.kind.as_str()) {
            return Err(ConfigError::ReservedKind(c.kind.clone()));
        }
        if by_kind.insert(c.kind.as_str(), c).is_some() {
            return Err(ConfigError::DuplicateKind(c.kind.clone()));
        }
    }

    for c in configs {
        check_identifier(&c.kind, c.table_name())?;
        if let Some(schema) = &c.schema {
            check_identifier(&c.kind, schema)?;
        }

        // field names and storage columns share one namespace so an
        // identifier in a query can never be ambiguous
        let mut names = HashSet::new();
        for f in &c.fields {
            check_identifier(&c.kind, &f.name)?;
            check_identifier(&c.kind, f.column_name())?;
            if !names.insert(f.name.as_str()) {
                return Err(ConfigError::DuplicateField {
                    kind: c.kind.clone(),
                    name: f.name.clone(),
                });
            }
        }
        let mut columns = HashSet::new();
        for f in &c.fields {
            let column = f.column_name();
            if !columns.insert(column) || (column != f.name && names.contains(column)) {
                return Err(ConfigError::DuplicateField {
                    kind: c.kind.clone(),
                    name: column.to_string(),
                });
            }
        }

        let pk = c.primary_key.names();
        if pk.is_empty() {
            return Err(ConfigError::InvalidPrimaryKey {
                kind: c.kind.clone(),
                detail: "no key fields".into(),
            });
        }
        let mut seen = HashSet::new();
        for name in pk {
            if c.field(name).is_none() || !seen.insert(name) {
                return Err(ConfigError::InvalidPrimaryKey {
                    kind: c.kind.clone(),
                    detail: format!("'{}' is not a distinct field", name),
                });
            }
        }

        for name in [&c.owner_field, &c.group_field].into_iter().flatten() {
            if c.field(name).is_none() {
                return Err(ConfigError::MissingReference {
                    kind: c.kind.clone(),
                    field: name.clone(),
                    target: "ownership field".into(),
                });
            }
        }

        for f in &c.fields {
            let Some(r) = &f.references else { continue };
            let target = by_kind.get(r.kind.as_str()).ok_or_else(|| ConfigError::MissingReference {
                kind: c.kind.clone(),
                field: f.name.clone(),
                target: r.kind.clone(),
            })?;
            if target.field(&r.field).is_none() {
                return Err(ConfigError::MissingReference {
                    kind: c.kind.clone(),
                    field: f.name.clone(),
                    target: format!("{}.{}", r.kind, r.field),
                });
            }
            if let Some(backref) = &r.backref {
                check_identifier(&c.kind, backref)?;
            }
        }
    }

    // forward edges are named after the foreign-key field, inverse edges after the backref
    let mut relations: HashMap<&str, HashSet<String>> = HashMap::new();
    for c in configs {
        for f in &c.fields {
            let Some(r) = &f.references else { continue };
            for (owner, name) in [
                (c.kind.as_str(), f.name.clone()),
                (r.kind.as_str(), backref_name(c, r.backref.as_deref())),
            ] {
                if !relations.entry(owner).or_default().insert(name.clone()) {
                    return Err(ConfigError::DuplicateRelation {
                        kind: owner.to_string(),
                        name,
                    });
                }
            }
        }
    }

    Ok(())
}

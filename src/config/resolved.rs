//! Resolved resource definitions: config validated and flattened for runtime use.

use chrono::NaiveDate;
use serde_json::Value;

use crate::config::FieldType;
use crate::permission::PermissionMask;

impl FieldType {
    /// PostgreSQL type used to cast bound parameters.
    pub fn pg_type(self) -> &'static str {
        match self {
            FieldType::Integer => "bigint",
            FieldType::Decimal => "numeric",
            FieldType::Text => "text",
            FieldType::Date => "date",
            FieldType::Boolean => "boolean",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FieldType::Integer => "integer",
            FieldType::Decimal => "decimal",
            FieldType::Text => "text",
            FieldType::Date => "date (YYYY-MM-DD)",
            FieldType::Boolean => "boolean",
        }
    }

    /// Convert a literal or payload value into this type's canonical JSON form.
    /// `None` when the value cannot represent this type. Null passes through.
    pub fn coerce(self, value: &Value) -> Option<Value> {
        if value.is_null() {
            return Some(Value::Null);
        }
        match self {
            FieldType::Integer => match value {
                Value::Number(n) => n
                    .as_i64()
                    .or_else(|| {
                        n.as_f64()
                            .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                            .map(|f| f as i64)
                    })
                    .map(Value::from),
                Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
                _ => None,
            },
            FieldType::Decimal => match value {
                Value::Number(_) => Some(value.clone()),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .map(|_| Value::String(s.trim().to_string())),
                _ => None,
            },
            FieldType::Text => match value {
                Value::String(_) => Some(value.clone()),
                Value::Number(n) => Some(Value::String(n.to_string())),
                Value::Bool(b) => Some(Value::String(b.to_string())),
                _ => None,
            },
            FieldType::Date => value
                .as_str()
                .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
                .map(|d| Value::String(d.format("%Y-%m-%d").to_string())),
            FieldType::Boolean => match value {
                Value::Bool(_) => Some(value.clone()),
                Value::Number(n) => match n.as_i64() {
                    Some(0) => Some(Value::Bool(false)),
                    Some(1) => Some(Value::Bool(true)),
                    _ => None,
                },
                Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "1" => Some(Value::Bool(true)),
                    "false" | "0" => Some(Value::Bool(false)),
                    _ => None,
                },
                _ => None,
            },
        }
    }
}

#[derive(Clone, Debug)]
pub struct ForeignKey {
    pub kind: String,
    /// Index of the referenced field in the target resource.
    pub field: usize,
    pub backref: String,
}

#[derive(Clone, Debug)]
pub struct FieldDefinition {
    pub name: String,
    pub column: String,
    pub field_type: FieldType,
    pub nullable: bool,
    pub primary_key: bool,
    /// Explicit override; `None` means the default field mask.
    pub permission: Option<PermissionMask>,
    pub references: Option<ForeignKey>,
}

impl FieldDefinition {
    pub fn mask(&self) -> PermissionMask {
        self.permission.unwrap_or(PermissionMask::DEFAULT_FIELD)
    }
}

/// A traversable edge from one resource to the rows of another.
#[derive(Clone, Debug)]
pub struct Relation {
    pub name: String,
    pub target: String,
    /// Field on this resource whose value selects the related rows.
    pub local_field: usize,
    /// Field on the target resource matched against that value.
    pub remote_field: usize,
}

#[derive(Clone, Debug, Default)]
pub struct Ownership {
    pub owner: Option<usize>,
    pub group: Option<usize>,
}

#[derive(Clone, Debug)]
pub struct ResourceDefinition {
    pub kind: String,
    pub schema_name: Option<String>,
    pub table_name: String,
    pub fields: Vec<FieldDefinition>,
    /// Field indices of the primary key, in declared key order.
    pub primary_key: Vec<usize>,
    /// Explicit override; `None` means the default model mask.
    pub permission: Option<PermissionMask>,
    pub ownership: Ownership,
    pub relations: Vec<Relation>,
}

impl ResourceDefinition {
    pub fn model_mask(&self) -> PermissionMask {
        self.permission.unwrap_or(PermissionMask::DEFAULT_MODEL)
    }

    /// Field mask intersected with the model mask.
    pub fn effective_mask(&self, field: usize) -> PermissionMask {
        self.fields[field].mask().intersect(self.model_mask())
    }

    /// Look a field up by field name, then by storage column name.
    pub fn field_index(&self, ident: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name == ident)
            .or_else(|| self.fields.iter().position(|f| f.column == ident))
    }

    pub fn field(&self, ident: &str) -> Option<&FieldDefinition> {
        self.field_index(ident).map(|i| &self.fields[i])
    }

    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn is_composite_key(&self) -> bool {
        self.primary_key.len() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integer_coercion() {
        assert_eq!(FieldType::Integer.coerce(&json!("1200")), Some(json!(1200)));
        assert_eq!(FieldType::Integer.coerce(&json!(3.0)), Some(json!(3)));
        assert_eq!(FieldType::Integer.coerce(&json!(3.5)), None);
        assert_eq!(FieldType::Integer.coerce(&json!("abc")), None);
    }

    #[test]
    fn integer_out_of_range_is_rejected() {
        assert_eq!(FieldType::Integer.coerce(&json!(1e20)), None);
        assert_eq!(FieldType::Integer.coerce(&json!(-1e20)), None);
        assert_eq!(FieldType::Integer.coerce(&json!(u64::MAX)), None);
        assert_eq!(FieldType::Integer.coerce(&json!(-4096.0)), Some(json!(-4096)));
    }

    #[test]
    fn text_accepts_numbers() {
        assert_eq!(FieldType::Text.coerce(&json!(3)), Some(json!("3")));
    }

    #[test]
    fn date_is_validated_and_normalised() {
        assert_eq!(FieldType::Date.coerce(&json!("2003-01-06")), Some(json!("2003-01-06")));
        assert_eq!(FieldType::Date.coerce(&json!("2003-13-06")), None);
        assert_eq!(FieldType::Date.coerce(&json!(20030106)), None);
    }

    #[test]
    fn null_passes_every_type() {
        for ty in [FieldType::Integer, FieldType::Decimal, FieldType::Text, FieldType::Date, FieldType::Boolean] {
            assert_eq!(ty.coerce(&Value::Null), Some(Value::Null));
        }
    }

    #[test]
    fn decimal_keeps_textual_precision() {
        assert_eq!(FieldType::Decimal.coerce(&json!(" 95.70 ")), Some(json!("95.70")));
        assert_eq!(FieldType::Decimal.coerce(&json!("x")), None);
    }
}

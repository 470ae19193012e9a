//! Raw resource config types matching the JSON resource file.

use serde::{Deserialize, Serialize};

use crate::permission::PermissionMask;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Integer,
    Decimal,
    Text,
    Date,
    Boolean,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryKeyConfig {
    Single(String),
    Composite(Vec<String>),
}

impl PrimaryKeyConfig {
    pub fn names(&self) -> Vec<&str> {
        match self {
            PrimaryKeyConfig::Single(s) => vec![s.as_str()],
            PrimaryKeyConfig::Composite(v) => v.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReferenceConfig {
    /// Kind of the referenced resource.
    pub kind: String,
    /// Referenced field on that resource.
    pub field: String,
    /// Name of the inverse relation on the referenced resource. Defaults to `<kind>_set`.
    #[serde(default)]
    pub backref: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    /// Storage column; defaults to the field name.
    #[serde(default)]
    pub column: Option<String>,
    #[serde(rename = "type")]
    pub type_: FieldType,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub permission: Option<PermissionMask>,
    #[serde(default)]
    pub references: Option<ReferenceConfig>,
}

impl FieldConfig {
    pub fn column_name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub kind: String,
    /// Table name; defaults to the kind.
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    pub primary_key: PrimaryKeyConfig,
    pub fields: Vec<FieldConfig>,
    #[serde(default)]
    pub permission: Option<PermissionMask>,
    /// Field whose value equal to the caller id makes the caller the owner.
    #[serde(default)]
    pub owner_field: Option<String>,
    /// Field whose value equal to the caller id puts the caller in the group.
    #[serde(default)]
    pub group_field: Option<String>,
}

impl ResourceConfig {
    pub fn table_name(&self) -> &str {
        self.table.as_deref().unwrap_or(&self.kind)
    }

    pub fn field(&self, name: &str) -> Option<&FieldConfig> {
        self.fields.iter().find(|f| f.name == name)
    }
}

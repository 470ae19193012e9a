//! Owner/group/other access masks and per-row field redaction.
//!
//! A mask holds one [`Access`] set per [`Role`]. The effective mask of a field
//! is its own mask intersected with its resource's mask, so a field is never
//! more permissive than its table. A role only ever consults its own set.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::ResourceDefinition;
use crate::error::{AppError, ConfigError};
use crate::store::Row;

/// Caller identity, trusted as given.
pub type UserId = i64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Owner,
    Group,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    Read,
    Write,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Access {
    pub read: bool,
    pub write: bool,
}

impl Access {
    pub const NONE: Access = Access { read: false, write: false };
    pub const READ: Access = Access { read: true, write: false };
    pub const READ_WRITE: Access = Access { read: true, write: true };

    pub fn allows(self, capability: Capability) -> bool {
        match capability {
            Capability::Read => self.read,
            Capability::Write => self.write,
        }
    }

    pub fn intersect(self, other: Access) -> Access {
        Access {
            read: self.read && other.read,
            write: self.write && other.write,
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            if self.read { 'r' } else { '-' },
            if self.write { 'w' } else { '-' }
        )
    }
}

impl FromStr for Access {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.as_bytes() {
            [r, w] if matches!(r, b'r' | b'-') && matches!(w, b'w' | b'-') => Ok(Access {
                read: *r == b'r',
                write: *w == b'w',
            }),
            _ => Err(()),
        }
    }
}

/// Textual form `owner/group/other`, e.g. `rw/--/r-`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PermissionMask {
    pub owner: Access,
    pub group: Access,
    pub other: Access,
}

impl PermissionMask {
    /// Resources: owner and everyone else may read and write.
    pub const DEFAULT_MODEL: PermissionMask = PermissionMask {
        owner: Access::READ_WRITE,
        group: Access::NONE,
        other: Access::READ_WRITE,
    };

    /// Fields: owner reads and writes, everyone else reads.
    pub const DEFAULT_FIELD: PermissionMask = PermissionMask {
        owner: Access::READ_WRITE,
        group: Access::NONE,
        other: Access::READ,
    };

    pub fn access(self, role: Role) -> Access {
        match role {
            Role::Owner => self.owner,
            Role::Group => self.group,
            Role::Other => self.other,
        }
    }

    pub fn allows(self, role: Role, capability: Capability) -> bool {
        self.access(role).allows(capability)
    }

    pub fn intersect(self, other: PermissionMask) -> PermissionMask {
        PermissionMask {
            owner: self.owner.intersect(other.owner),
            group: self.group.intersect(other.group),
            other: self.other.intersect(other.other),
        }
    }
}

impl fmt::Display for PermissionMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.owner, self.group, self.other)
    }
}

impl FromStr for PermissionMask {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidPermission(s.to_string());
        let parts: Vec<&str> = s.trim().split('/').collect();
        let [owner, group, other] = parts.as_slice() else {
            return Err(invalid());
        };
        Ok(PermissionMask {
            owner: owner.parse().map_err(|_| invalid())?,
            group: group.parse().map_err(|_| invalid())?,
            other: other.parse().map_err(|_| invalid())?,
        })
    }
}

impl TryFrom<String> for PermissionMask {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PermissionMask> for String {
    fn from(mask: PermissionMask) -> Self {
        mask.to_string()
    }
}

fn matches_caller(value: Option<&Value>, caller: UserId) -> bool {
    match value {
        Some(Value::Number(n)) => n.as_i64() == Some(caller),
        Some(Value::String(s)) => s.trim() == caller.to_string(),
        _ => false,
    }
}

/// Role of `caller` with respect to one row. Without an ownership rule every
/// caller is `Other`.
pub fn role_for(resource: &ResourceDefinition, row: &Row, caller: UserId) -> Role {
    let value_of = |field: usize| row.get(&resource.fields[field].name);
    if let Some(owner) = resource.ownership.owner {
        if matches_caller(value_of(owner), caller) {
            return Role::Owner;
        }
    }
    if let Some(group) = resource.ownership.group {
        if matches_caller(value_of(group), caller) {
            return Role::Group;
        }
    }
    Role::Other
}

/// Field indices whose effective mask grants `capability` to `role`, in declared order.
pub fn fields_with(resource: &ResourceDefinition, role: Role, capability: Capability) -> Vec<usize> {
    (0..resource.fields.len())
        .filter(|&i| resource.effective_mask(i).allows(role, capability))
        .collect()
}

pub fn readable_fields(resource: &ResourceDefinition, role: Role) -> Vec<usize> {
    fields_with(resource, role, Capability::Read)
}

pub fn writable_fields(resource: &ResourceDefinition, role: Role) -> Vec<usize> {
    fields_with(resource, role, Capability::Write)
}

/// Readable fields of `row` for `caller`, narrowed by `allow_list` when it is
/// non-empty. The allow-list can only remove fields.
pub fn render(resource: &ResourceDefinition, row: &Row, caller: UserId, allow_list: &[usize]) -> Row {
    let role = role_for(resource, row, caller);
    let mut out = Map::new();
    for i in readable_fields(resource, role) {
        if !allow_list.is_empty() && !allow_list.contains(&i) {
            continue;
        }
        let name = &resource.fields[i].name;
        if let Some(value) = row.get(name) {
            out.insert(name.clone(), value.clone());
        }
    }
    out
}

/// Validate an update payload against the caller's writable fields. Either
/// every key is accepted and the full change set is returned, or nothing is.
pub fn prepare_update(
    resource: &ResourceDefinition,
    row: &Row,
    payload: &Map<String, Value>,
    caller: UserId,
) -> Result<Vec<(usize, Value)>, AppError> {
    let role = role_for(resource, row, caller);
    let writable = writable_fields(resource, role);
    let mut changes = Vec::with_capacity(payload.len());
    for (key, value) in payload {
        let index = resource
            .field_index(key)
            .filter(|i| writable.contains(i) && !resource.fields[*i].primary_key)
            .ok_or_else(|| AppError::NotWritable(key.clone()))?;
        let field = &resource.fields[index];
        let value = field.field_type.coerce(value).ok_or_else(|| AppError::InvalidLiteral {
            field: field.name.clone(),
            value: value.to_string(),
            expected: field.field_type.name(),
        })?;
        if value.is_null() && !field.nullable {
            return Err(AppError::Validation(format!("{} may not be null", field.name)));
        }
        changes.push((index, value));
    }
    Ok(changes)
}

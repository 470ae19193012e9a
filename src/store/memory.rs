//! In-memory store evaluating bounded queries over JSON rows. Used by the
//! tests and by the demo server when no database is configured.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde_json::Value;

use super::{Row, Store};
use crate::config::ResourceDefinition;
use crate::error::AppError;
use crate::query::{compare_values, BoundedQuery, CompareOp, Direction, Operand, Predicate};

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<Row>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn from_seed(seed: HashMap<String, Vec<Row>>) -> Self {
        MemoryStore {
            tables: RwLock::new(seed),
        }
    }

    /// Load rows from a JSON object of `kind -> [row, ...]`.
    pub async fn load_seed(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AppError::Store(format!("{}: {}", path.display(), e)))?;
        let seed: HashMap<String, Vec<Row>> =
            serde_json::from_str(&json).map_err(|e| AppError::Store(format!("{}: {}", path.display(), e)))?;
        tracing::info!(path = %path.display(), kinds = seed.len(), "loaded memory store seed");
        Ok(MemoryStore::from_seed(seed))
    }

    pub fn insert(&self, kind: &str, row: Row) -> Result<(), AppError> {
        self.write()?.entry(kind.to_string()).or_default().push(row);
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Vec<Row>>>, AppError> {
        self.tables.read().map_err(|_| AppError::Store("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Vec<Row>>>, AppError> {
        self.tables.write().map_err(|_| AppError::Store("memory store lock poisoned".into()))
    }

    fn matching<'a>(tables: &'a HashMap<String, Vec<Row>>, resource: &ResourceDefinition, filter: Option<&Predicate>) -> Vec<&'a Row> {
        tables
            .get(&resource.kind)
            .map(|rows| {
                rows.iter()
                    .filter(|row| filter.map_or(true, |p| evaluate(resource, p, row)))
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn operand_value<'a>(resource: &ResourceDefinition, operand: &'a Operand, row: &'a Row) -> &'a Value {
    match operand {
        Operand::Column(i) => row.get(&resource.fields[*i].name).unwrap_or(&Value::Null),
        Operand::Value(v) => v,
    }
}

fn evaluate(resource: &ResourceDefinition, predicate: &Predicate, row: &Row) -> bool {
    match predicate {
        Predicate::Constant(b) => *b,
        Predicate::And(parts) => parts.iter().all(|p| evaluate(resource, p, row)),
        Predicate::Or(parts) => parts.iter().any(|p| evaluate(resource, p, row)),
        Predicate::Compare { op, left, right } => {
            let field_type = [left, right].into_iter().find_map(|o| match o {
                Operand::Column(i) => Some(resource.fields[*i].field_type),
                Operand::Value(_) => None,
            });
            op.evaluate(field_type, operand_value(resource, left, row), operand_value(resource, right, row))
        }
    }
}

/// Nulls sort last ascending and first descending, as in PostgreSQL.
fn compare_rows(resource: &ResourceDefinition, query: &BoundedQuery, a: &Row, b: &Row) -> Ordering {
    for term in &query.order {
        let field = &resource.fields[term.field];
        let va = a.get(&field.name).unwrap_or(&Value::Null);
        let vb = b.get(&field.name).unwrap_or(&Value::Null);
        let ordering = match (va.is_null(), vb.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => compare_values(Some(field.field_type), va, vb).unwrap_or(Ordering::Equal),
        };
        let ordering = match term.direction {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn has_key(resource: &ResourceDefinition, row: &Row, key: &[Value]) -> bool {
    resource.primary_key.iter().zip(key).all(|(&i, v)| {
        let field = &resource.fields[i];
        let stored = row.get(&field.name).unwrap_or(&Value::Null);
        CompareOp::Eq.evaluate(Some(field.field_type), stored, v) && !v.is_null()
    })
}

#[async_trait]
impl Store for MemoryStore {
    async fn count(&self, resource: &ResourceDefinition, query: &BoundedQuery) -> Result<u64, AppError> {
        let tables = self.read()?;
        Ok(Self::matching(&tables, resource, query.filter.as_ref()).len() as u64)
    }

    async fn fetch(&self, resource: &ResourceDefinition, query: &BoundedQuery) -> Result<Vec<Row>, AppError> {
        let tables = self.read()?;
        let mut rows = Self::matching(&tables, resource, query.filter.as_ref());
        rows.sort_by(|a, b| compare_rows(resource, query, a, b));

        let (skip, take) = match query.window {
            Some(w) => (usize::try_from(w.offset()).unwrap_or(usize::MAX), w.size as usize),
            None => (0, usize::MAX),
        };
        let projected = |row: &Row| -> Row {
            match &query.projection {
                None => row.clone(),
                Some(fields) => fields
                    .iter()
                    .filter_map(|&i| {
                        let name = &resource.fields[i].name;
                        row.get(name).map(|v| (name.clone(), v.clone()))
                    })
                    .collect(),
            }
        };
        Ok(rows.into_iter().skip(skip).take(take).map(projected).collect())
    }

    async fn fetch_one(&self, resource: &ResourceDefinition, key: &[Value]) -> Result<Option<Row>, AppError> {
        let tables = self.read()?;
        Ok(tables
            .get(&resource.kind)
            .and_then(|rows| rows.iter().find(|row| has_key(resource, row, key)))
            .cloned())
    }

    async fn update_one(
        &self,
        resource: &ResourceDefinition,
        key: &[Value],
        changes: &[(usize, Value)],
    ) -> Result<Option<Row>, AppError> {
        let mut tables = self.write()?;
        let Some(row) = tables
            .get_mut(&resource.kind)
            .and_then(|rows| rows.iter_mut().find(|row| has_key(resource, row, key)))
        else {
            return Ok(None);
        };
        for (i, value) in changes {
            row.insert(resource.fields[*i].name.clone(), value.clone());
        }
        tracing::debug!(kind = %resource.kind, fields = changes.len(), "updated row");
        Ok(Some(row.clone()))
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.read().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{OrderTerm, Window};
    use crate::test_fixtures::{registry, seeded_store};
    use serde_json::json;

    #[tokio::test]
    async fn filters_orders_and_windows() {
        let registry = registry();
        let employees = registry.resolve("employees").unwrap();
        let idx = |n: &str| employees.field_index(n).unwrap();
        let store = seeded_store();

        let query = BoundedQuery::new(Some(Predicate::Compare {
            op: CompareOp::Gt,
            left: Operand::Column(idx("employee_number")),
            right: Operand::Value(json!(1100)),
        }))
        .order_by(vec![
            OrderTerm {
                field: idx("office_code"),
                direction: Direction::Desc,
            },
            OrderTerm {
                field: idx("employee_number"),
                direction: Direction::Asc,
            },
        ]);

        let total = store.count(employees, &query).await.unwrap();
        let all = store.fetch(employees, &query).await.unwrap();
        assert_eq!(total as usize, all.len());
        assert!(all.iter().all(|r| r["employee_number"].as_i64().unwrap() > 1100));
        let offices: Vec<&str> = all.iter().map(|r| r["office_code"].as_str().unwrap()).collect();
        let mut sorted = offices.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(offices, sorted);

        let page = store
            .fetch(employees, &query.clone().paginate(Window { page: 2, size: 2 }))
            .await
            .unwrap();
        assert_eq!(page, all[2..4].to_vec());
    }

    #[tokio::test]
    async fn projection_keeps_only_selected_fields() {
        let registry = registry();
        let employees = registry.resolve("employees").unwrap();
        let store = seeded_store();
        let first = employees.field_index("first_name").unwrap();
        let rows = store
            .fetch(employees, &BoundedQuery::new(None).select(vec![first]))
            .await
            .unwrap();
        assert!(rows.iter().all(|r| r.len() == 1 && r.contains_key("first_name")));
    }

    #[tokio::test]
    async fn nulls_sort_last_ascending() {
        let registry = registry();
        let employees = registry.resolve("employees").unwrap();
        let store = seeded_store();
        let query = BoundedQuery::new(None).order_by(vec![OrderTerm {
            field: employees.field_index("reports_to").unwrap(),
            direction: Direction::Asc,
        }]);
        let rows = store.fetch(employees, &query).await.unwrap();
        assert!(rows.last().unwrap()["reports_to"].is_null());
    }

    #[tokio::test]
    async fn composite_key_lookup() {
        let registry = registry();
        let payments = registry.resolve("payments").unwrap();
        let store = seeded_store();
        let row = store
            .fetch_one(payments, &[json!("HQ336336"), json!(103)])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row["amount"], json!("6066.78"));
        assert!(store.fetch_one(payments, &[json!("HQ336336"), json!(112)]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_applies_all_changes() {
        let registry = registry();
        let employees = registry.resolve("employees").unwrap();
        let store = seeded_store();
        let first = employees.field_index("first_name").unwrap();
        let ext = employees.field_index("extension").unwrap();
        let row = store
            .update_one(employees, &[json!(1002)], &[(first, json!("Di")), (ext, json!("x1"))])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row["first_name"], json!("Di"));
        assert_eq!(row["extension"], json!("x1"));
        assert!(store.update_one(employees, &[json!(9)], &[]).await.unwrap().is_none());
    }
}

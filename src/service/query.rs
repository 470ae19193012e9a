//! Request orchestration: compile query parameters against a collection, run
//! the bounded query on the store, then redact every row for the caller.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::AppError;
use crate::expr::{compile_filter, compile_projection, compile_sort, parse};
use crate::permission::{prepare_update, render, UserId};
use crate::query::{Collection, Direction, OrderTerm, Window, DEFAULT_PAGE, DEFAULT_SIZE, MAX_PAGE};
use crate::registry::Registry;
use crate::response::{ListResponse, Pagination};
use crate::store::{Row, Store};

/// Treat blank parameters as absent.
fn non_blank<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params.get(key).map(String::as_str).filter(|s| !s.trim().is_empty())
}

fn bound(params: &HashMap<String, String>, key: &str, default: u32) -> Result<u32, AppError> {
    let Some(raw) = non_blank(params, key) else {
        return Ok(default);
    };
    let n: i64 = raw
        .trim()
        .parse()
        .map_err(|_| AppError::Validation(format!("{} must be a positive integer", key)))?;
    if n > i64::from(MAX_PAGE) {
        return Err(AppError::Validation("Page and Size must be less than 100".into()));
    }
    if n < 1 {
        return Err(AppError::Validation(format!("{} must be a positive integer", key)));
    }
    Ok(n as u32)
}

/// List parameters, validated before any store call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListParams {
    pub filter: Option<String>,
    pub sort: Option<String>,
    pub fields: Option<String>,
    pub window: Window,
}

impl ListParams {
    pub fn from_query(params: &HashMap<String, String>) -> Result<Self, AppError> {
        let window = Window {
            page: bound(params, "page", DEFAULT_PAGE)?,
            size: bound(params, "size", DEFAULT_SIZE)?,
        };
        Ok(ListParams {
            filter: non_blank(params, "filter").map(str::to_string),
            sort: non_blank(params, "sort").map(str::to_string),
            fields: non_blank(params, "fields").map(str::to_string),
            window,
        })
    }
}

pub struct QueryService;

impl QueryService {
    /// Filter, sort, project and window `collection`, then render each row.
    pub async fn run_list(
        store: &dyn Store,
        collection: &Collection,
        params: &ListParams,
        caller: UserId,
    ) -> Result<ListResponse, AppError> {
        let resource = &collection.resource;
        let mut query = collection.query();

        if let Some(filter) = &params.filter {
            query = query.restrict(compile_filter(&parse(filter)?, resource)?);
        }

        let mut order = match &params.sort {
            Some(sort) => compile_sort(&parse(sort)?, resource)?,
            None => Vec::new(),
        };
        for &pk in &resource.primary_key {
            if !order.iter().any(|t| t.field == pk) {
                order.push(OrderTerm {
                    field: pk,
                    direction: Direction::Asc,
                });
            }
        }
        query = query.order_by(order);

        let allow_list = match &params.fields {
            Some(fields) => compile_projection(&parse(fields)?, resource)?,
            None => Vec::new(),
        };
        if !allow_list.is_empty() {
            let ownership = [resource.ownership.owner, resource.ownership.group];
            let mut projection = allow_list.clone();
            for field in resource.primary_key.iter().copied().chain(ownership.into_iter().flatten()) {
                if !projection.contains(&field) {
                    projection.push(field);
                }
            }
            query = query.select(projection);
        }

        tracing::debug!(kind = %resource.kind, query = ?query, "compiled list query");

        let count = store.count(resource, &query).await?;
        let query = query.paginate(params.window);
        let rows = store.fetch(resource, &query).await?;
        let data = rows
            .iter()
            .map(|row| render(resource, row, caller, &allow_list))
            .collect();

        Ok(ListResponse {
            data,
            pagination: Pagination {
                count,
                page: params.window.page,
                size: params.window.size,
            },
        })
    }

    pub async fn list(
        registry: &Registry,
        store: &dyn Store,
        kind: &str,
        params: &ListParams,
        caller: UserId,
    ) -> Result<ListResponse, AppError> {
        let collection = Collection::all(registry.resolve(kind)?.clone());
        Self::run_list(store, &collection, params, caller).await
    }

    pub async fn list_related(
        registry: &Registry,
        store: &dyn Store,
        kind: &str,
        id: &str,
        edge: &str,
        params: &ListParams,
        caller: UserId,
    ) -> Result<ListResponse, AppError> {
        let instance = registry.resolve_instance(store, kind, id).await?;
        let collection = registry.related(&instance, edge)?;
        Self::run_list(store, &collection, params, caller).await
    }

    pub async fn read(
        registry: &Registry,
        store: &dyn Store,
        kind: &str,
        id: &str,
        caller: UserId,
        fields: Option<&str>,
    ) -> Result<Row, AppError> {
        let instance = registry.resolve_instance(store, kind, id).await?;
        let allow_list = match fields.filter(|f| !f.trim().is_empty()) {
            Some(fields) => compile_projection(&parse(fields)?, &instance.resource)?,
            None => Vec::new(),
        };
        Ok(render(&instance.resource, &instance.row, caller, &allow_list))
    }

    /// Apply `payload` to one row. Either every key is writable by the caller
    /// and all changes land in one store update, or nothing changes.
    pub async fn update(
        registry: &Registry,
        store: &dyn Store,
        kind: &str,
        id: &str,
        payload: &Value,
        caller: UserId,
    ) -> Result<Row, AppError> {
        let payload = payload
            .as_object()
            .ok_or_else(|| AppError::Validation("body must be a JSON object".into()))?;
        let instance = registry.resolve_instance(store, kind, id).await?;
        let resource = &instance.resource;
        let changes = prepare_update(resource, &instance.row, payload, caller)?;
        let key: Vec<Value> = resource
            .primary_key
            .iter()
            .map(|&i| instance.row.get(&resource.fields[i].name).cloned().unwrap_or(Value::Null))
            .collect();
        let row = store
            .update_one(resource, &key, &changes)
            .await?
            .ok_or_else(|| AppError::NotFound {
                kind: kind.to_string(),
                id: id.to_string(),
            })?;
        tracing::info!(kind = %kind, id = %id, caller, fields = changes.len(), "updated");
        Ok(render(resource, &row, caller, &[]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResourceDefinition;
    use crate::query::BoundedQuery;
    use crate::test_fixtures::{registry, seeded_store};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[derive(Default)]
    struct CountingStore {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Store for CountingStore {
        async fn count(&self, _: &ResourceDefinition, _: &BoundedQuery) -> Result<u64, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(0)
        }
        async fn fetch(&self, _: &ResourceDefinition, _: &BoundedQuery) -> Result<Vec<Row>, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
        async fn fetch_one(&self, _: &ResourceDefinition, _: &[Value]) -> Result<Option<Row>, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
        async fn update_one(
            &self,
            _: &ResourceDefinition,
            _: &[Value],
            _: &[(usize, Value)],
        ) -> Result<Option<Row>, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
        async fn ping(&self) -> Result<(), AppError> {
            Ok(())
        }
    }

    #[test]
    fn page_and_size_are_bounded() {
        for (key, value) in [("page", "101"), ("size", "1000")] {
            let err = ListParams::from_query(&params(&[(key, value)])).unwrap_err();
            assert_eq!(err.to_string(), "Page and Size must be less than 100");
        }
        let err = ListParams::from_query(&params(&[("page", "0")])).unwrap_err();
        assert_eq!(err.to_string(), "page must be a positive integer");
        assert!(ListParams::from_query(&params(&[("size", "two")])).is_err());

        let ok = ListParams::from_query(&params(&[("page", "100"), ("size", "100")])).unwrap();
        assert_eq!(ok.window, Window { page: 100, size: 100 });
    }

    #[test]
    fn blank_parameters_are_absent() {
        let p = ListParams::from_query(&params(&[("filter", "  "), ("sort", ""), ("page", "")])).unwrap();
        assert_eq!(p, ListParams::default());
    }

    #[tokio::test]
    async fn invalid_expressions_never_reach_the_store() {
        let registry = registry();
        let store = CountingStore::default();
        for query in [[("filter", "salary > 1")], [("sort", "(")], [("fields", "first_name == 1")]] {
            let p = ListParams::from_query(&params(&query)).unwrap();
            assert!(QueryService::list(&registry, &store, "employees", &p, 0).await.is_err());
        }
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn filters_sorts_and_projects() {
        let registry = registry();
        let store = seeded_store();
        let p = ListParams::from_query(&params(&[
            ("filter", "employee_number>1200 and office_code==3"),
            ("sort", "-office_code,firstName"),
            ("fields", "firstName,lastName"),
        ]))
        .unwrap();
        let out = QueryService::list(&registry, &store, "employees", &p, 0).await.unwrap();
        assert!(out.data.len() <= 5);
        assert_eq!(out.pagination.count as usize, out.data.len());
        let names: Vec<&str> = out.data.iter().map(|r| r["first_name"].as_str().unwrap()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        for row in &out.data {
            assert_eq!(row.keys().collect::<Vec<_>>(), vec!["first_name", "last_name"]);
        }
    }

    #[tokio::test]
    async fn windows_are_stable_across_pages() {
        let registry = registry();
        let store = seeded_store();
        let page = |n: &str| ListParams::from_query(&params(&[("sort", "office_code"), ("page", n), ("size", "3")])).unwrap();
        let first = QueryService::list(&registry, &store, "employees", &page("1"), 0).await.unwrap();
        let second = QueryService::list(&registry, &store, "employees", &page("2"), 0).await.unwrap();
        assert_eq!(first.data.len(), 3);
        assert_eq!(first.pagination.count, second.pagination.count);
        for row in &second.data {
            assert!(!first.data.contains(row));
        }
    }

    #[tokio::test]
    async fn related_lists_traverse_edges() {
        let registry = registry();
        let store = seeded_store();
        let p = ListParams::from_query(&params(&[("size", "100")])).unwrap();
        let staff = QueryService::list_related(&registry, &store, "offices", "1", "employees", &p, 0)
            .await
            .unwrap();
        assert!(staff.pagination.count > 0);
        assert!(staff.data.iter().all(|r| r["office_code"] == json!("1")));

        let office = QueryService::list_related(&registry, &store, "employees", "1002", "office_code", &p, 0)
            .await
            .unwrap();
        assert_eq!(office.pagination.count, 1);

        let boss = QueryService::list_related(&registry, &store, "employees", "1002", "reports_to", &p, 0)
            .await
            .unwrap();
        assert_eq!(boss.pagination.count, 0);
    }

    #[tokio::test]
    async fn read_honours_fields() {
        let registry = registry();
        let store = seeded_store();
        let row = QueryService::read(&registry, &store, "employees", "1002", 1002, Some("email, jobTitle"))
            .await
            .unwrap();
        assert_eq!(row.keys().collect::<Vec<_>>(), vec!["email", "job_title"]);
    }

    #[tokio::test]
    async fn rejected_update_leaves_row_unchanged() {
        let registry = registry();
        let store = seeded_store();
        let payload = json!({"first_name": "Di", "email": "x@y"});
        let err = QueryService::update(&registry, &store, "employees", "1002", &payload, 2)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotWritable(_)));
        let row = QueryService::read(&registry, &store, "employees", "1002", 1002, None).await.unwrap();
        assert_eq!(row["first_name"], json!("Diane"));
    }

    #[tokio::test]
    async fn owner_updates_own_row() {
        let registry = registry();
        let store = seeded_store();
        let payload = json!({"extension": "x9999", "email": "diane@example.com"});
        let row = QueryService::update(&registry, &store, "employees", "1002", &payload, 1002)
            .await
            .unwrap();
        assert_eq!(row["extension"], json!("x9999"));
        assert_eq!(row["email"], json!("diane@example.com"));

        assert!(QueryService::update(&registry, &store, "employees", "1002", &json!([1]), 1002)
            .await
            .is_err());
    }
}

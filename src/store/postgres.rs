//! PostgreSQL store: executes statements from the SQL builder with sqlx.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::PgPool;

use super::{Row, Store};
use crate::config::ResourceDefinition;
use crate::error::AppError;
use crate::query::BoundedQuery;
use crate::sql::{select_by_key, select_count, select_list, update_by_key, PgBindValue, QueryBuf};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn bind(q: &QueryBuf) -> sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments> {
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        query
    }

    async fn query_many(&self, q: &QueryBuf) -> Result<Vec<Row>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let rows = Self::bind(q).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn query_one(&self, q: &QueryBuf) -> Result<Option<Row>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let row = Self::bind(q).fetch_optional(&self.pool).await?;
        Ok(row.map(|r| row_to_json(&r)))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn count(&self, resource: &ResourceDefinition, query: &BoundedQuery) -> Result<u64, AppError> {
        use sqlx::Row as _;
        let q = select_count(resource, query);
        tracing::debug!(sql = %q.sql, params = ?q.params, "count");
        let row = Self::bind(&q).fetch_one(&self.pool).await?;
        let count: i64 = row.try_get(0)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn fetch(&self, resource: &ResourceDefinition, query: &BoundedQuery) -> Result<Vec<Row>, AppError> {
        self.query_many(&select_list(resource, query)).await
    }

    async fn fetch_one(&self, resource: &ResourceDefinition, key: &[Value]) -> Result<Option<Row>, AppError> {
        self.query_one(&select_by_key(resource, key)).await
    }

    async fn update_one(
        &self,
        resource: &ResourceDefinition,
        key: &[Value],
        changes: &[(usize, Value)],
    ) -> Result<Option<Row>, AppError> {
        self.query_one(&update_by_key(resource, key, changes)).await
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await?;
        Ok(())
    }
}

fn row_to_json(row: &PgRow) -> Row {
    use sqlx::Column;
    use sqlx::Row as _;
    let mut map = Row::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    map
}

/// Decimal and date columns are selected as text, so integers, floats,
/// booleans and text cover every cell.
fn cell_to_value(row: &PgRow, name: &str) -> Value {
    use sqlx::Row as _;
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    Value::Null
}

//! Builds parameterized SELECT / COUNT / UPDATE statements from a resource
//! definition and a bounded query.

use serde_json::Value;

use crate::config::{FieldType, ResourceDefinition};
use crate::query::{BoundedQuery, CompareOp, Direction, Operand, Predicate};

/// Quote identifier for PostgreSQL (safe: only from config).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn qualified_table(resource: &ResourceDefinition) -> String {
    match &resource.schema_name {
        Some(schema) => format!("{}.{}", quoted(schema), quoted(&resource.table_name)),
        None => quoted(&resource.table_name),
    }
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf::default()
    }

    /// Push a parameter and return its placeholder, cast when the type is known.
    fn push_param(&mut self, v: Value, cast: Option<FieldType>) -> String {
        self.params.push(v);
        let n = self.params.len();
        match cast {
            Some(t) => format!("${}::{}", n, t.pg_type()),
            None => format!("${}", n),
        }
    }
}

/// SELECT list aliased to field names. Numeric and date columns come back as
/// text so decoding never depends on driver-specific types.
fn select_column_list(resource: &ResourceDefinition, fields: Option<&[usize]>) -> String {
    let all: Vec<usize>;
    let fields = match fields {
        Some(f) => f,
        None => {
            all = (0..resource.fields.len()).collect();
            &all
        }
    };
    fields
        .iter()
        .map(|&i| {
            let f = &resource.fields[i];
            let col = quoted(&f.column);
            let expr = match f.field_type {
                FieldType::Decimal | FieldType::Date => format!("{}::text", col),
                _ => col,
            };
            format!("{} AS {}", expr, quoted(&f.name))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_operand(resource: &ResourceDefinition, operand: &Operand, cast: Option<FieldType>, q: &mut QueryBuf) -> String {
    match operand {
        Operand::Column(i) => quoted(&resource.fields[*i].column),
        Operand::Value(v) => q.push_param(v.clone(), cast),
    }
}

fn render_predicate(resource: &ResourceDefinition, predicate: &Predicate, q: &mut QueryBuf) -> String {
    match predicate {
        Predicate::Constant(true) => "TRUE".into(),
        Predicate::Constant(false) => "FALSE".into(),
        Predicate::And(parts) | Predicate::Or(parts) => {
            let joiner = if matches!(predicate, Predicate::And(_)) { " AND " } else { " OR " };
            let rendered: Vec<String> = parts.iter().map(|p| render_predicate(resource, p, q)).collect();
            format!("({})", rendered.join(joiner))
        }
        Predicate::Compare { op, left, right } => {
            let null_test = match (left, right) {
                (other, Operand::Value(Value::Null)) | (Operand::Value(Value::Null), other) => Some(other),
                _ => None,
            };
            if let Some(other) = null_test {
                let other = render_operand(resource, other, None, q);
                return match op {
                    CompareOp::Eq => format!("{} IS NULL", other),
                    CompareOp::Ne => format!("{} IS NOT NULL", other),
                    _ => "FALSE".into(),
                };
            }
            let cast = [left, right].into_iter().find_map(|o| match o {
                Operand::Column(i) => Some(resource.fields[*i].field_type),
                Operand::Value(_) => None,
            });
            let l = render_operand(resource, left, cast, q);
            let r = render_operand(resource, right, cast, q);
            format!("{} {} {}", l, op.sql(), r)
        }
    }
}

fn where_clause(resource: &ResourceDefinition, filter: Option<&Predicate>, q: &mut QueryBuf) -> String {
    filter
        .map(|p| format!(" WHERE {}", render_predicate(resource, p, q)))
        .unwrap_or_default()
}

fn key_condition(resource: &ResourceDefinition, key: &[Value], q: &mut QueryBuf) -> String {
    resource
        .primary_key
        .iter()
        .zip(key)
        .map(|(&i, v)| {
            let f = &resource.fields[i];
            let ph = q.push_param(v.clone(), Some(f.field_type));
            format!("{} = {}", quoted(&f.column), ph)
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// SELECT COUNT(*) with the query filter; order and window are ignored.
pub fn select_count(resource: &ResourceDefinition, query: &BoundedQuery) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(resource, query.filter.as_ref(), &mut q);
    q.sql = format!("SELECT COUNT(*) FROM {}{}", qualified_table(resource), where_sql);
    q
}

/// SELECT list with filter, ORDER BY, projection and LIMIT/OFFSET.
pub fn select_list(resource: &ResourceDefinition, query: &BoundedQuery) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(resource, query.filter.as_ref(), &mut q);
    let order_clause = if query.order.is_empty() {
        String::new()
    } else {
        let terms: Vec<String> = query
            .order
            .iter()
            .map(|t| {
                let dir = match t.direction {
                    Direction::Asc => "ASC",
                    Direction::Desc => "DESC",
                };
                format!("{} {}", quoted(&resource.fields[t.field].column), dir)
            })
            .collect();
        format!(" ORDER BY {}", terms.join(", "))
    };
    let window_clause = query
        .window
        .map(|w| format!(" LIMIT {} OFFSET {}", w.size, w.offset()))
        .unwrap_or_default();
    q.sql = format!(
        "SELECT {} FROM {}{}{}{}",
        select_column_list(resource, query.projection.as_deref()),
        qualified_table(resource),
        where_sql,
        order_clause,
        window_clause
    );
    q
}

/// SELECT one row by primary key (single or composite).
pub fn select_by_key(resource: &ResourceDefinition, key: &[Value]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let cond = key_condition(resource, key, &mut q);
    q.sql = format!(
        "SELECT {} FROM {} WHERE {}",
        select_column_list(resource, None),
        qualified_table(resource),
        cond
    );
    q
}

/// UPDATE by primary key in one statement, returning the stored row.
/// Without changes this degrades to a plain select.
pub fn update_by_key(resource: &ResourceDefinition, key: &[Value], changes: &[(usize, Value)]) -> QueryBuf {
    if changes.is_empty() {
        return select_by_key(resource, key);
    }
    let mut q = QueryBuf::new();
    let sets: Vec<String> = changes
        .iter()
        .map(|(i, v)| {
            let f = &resource.fields[*i];
            let ph = q.push_param(v.clone(), Some(f.field_type));
            format!("{} = {}", quoted(&f.column), ph)
        })
        .collect();
    let cond = key_condition(resource, key, &mut q);
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} RETURNING {}",
        qualified_table(resource),
        sets.join(", "),
        cond,
        select_column_list(resource, None)
    );
    q
}

//! Backend-neutral bounded query: predicate, ordering, projection, window.

use std::cmp::Ordering;
use std::sync::Arc;

use serde_json::Value;

use crate::config::{FieldType, ResourceDefinition};

/// Hard cap on `page` and `size`.
pub const MAX_PAGE: u32 = 100;
pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_SIZE: u32 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    pub fn sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
        }
    }

    /// Evaluate with SQL-like null handling: `== null` tests for null,
    /// `!= null` for non-null, and ordering against null never holds.
    pub fn evaluate(self, field_type: Option<FieldType>, left: &Value, right: &Value) -> bool {
        if left.is_null() || right.is_null() {
            let both = left.is_null() && right.is_null();
            return match self {
                CompareOp::Eq => both,
                CompareOp::Ne => !both,
                _ => false,
            };
        }
        let Some(ordering) = compare_values(field_type, left, right) else {
            return self == CompareOp::Ne;
        };
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
        }
    }
}

fn as_decimal(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Order two non-null values. Decimals may be stored as text and compare
/// numerically; otherwise only values of the same JSON type are comparable.
pub fn compare_values(field_type: Option<FieldType>, left: &Value, right: &Value) -> Option<Ordering> {
    if field_type == Some(FieldType::Decimal) {
        return as_decimal(left)?.partial_cmp(&as_decimal(right)?);
    }
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
        },
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    /// Field index in the queried resource.
    Column(usize),
    Value(Value),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    Constant(bool),
    Compare {
        op: CompareOp,
        left: Operand,
        right: Operand,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn and(self, other: Predicate) -> Predicate {
        match (self, other) {
            (Predicate::And(mut a), Predicate::And(b)) => {
                a.extend(b);
                Predicate::And(a)
            }
            (Predicate::And(mut a), b) => {
                a.push(b);
                Predicate::And(a)
            }
            (a, b) => Predicate::And(vec![a, b]),
        }
    }

    pub fn or(self, other: Predicate) -> Predicate {
        match (self, other) {
            (Predicate::Or(mut a), Predicate::Or(b)) => {
                a.extend(b);
                Predicate::Or(a)
            }
            (Predicate::Or(mut a), b) => {
                a.push(b);
                Predicate::Or(a)
            }
            (a, b) => Predicate::Or(vec![a, b]),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderTerm {
    pub field: usize,
    pub direction: Direction,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    pub page: u32,
    pub size: u32,
}

impl Default for Window {
    fn default() -> Self {
        Window {
            page: DEFAULT_PAGE,
            size: DEFAULT_SIZE,
        }
    }
}

impl Window {
    pub fn offset(self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.size)
    }
}

/// A query against one resource, accumulated before a single execution.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BoundedQuery {
    pub filter: Option<Predicate>,
    pub order: Vec<OrderTerm>,
    /// `None` selects every field.
    pub projection: Option<Vec<usize>>,
    pub window: Option<Window>,
}

impl BoundedQuery {
    pub fn new(scope: Option<Predicate>) -> Self {
        BoundedQuery {
            filter: scope,
            ..Default::default()
        }
    }

    /// AND a restriction into the current filter.
    pub fn restrict(mut self, predicate: Predicate) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    pub fn order_by(mut self, terms: Vec<OrderTerm>) -> Self {
        self.order = terms;
        self
    }

    pub fn select(mut self, fields: Vec<usize>) -> Self {
        self.projection = Some(fields);
        self
    }

    pub fn paginate(mut self, window: Window) -> Self {
        self.window = Some(window);
        self
    }
}

/// The rows a list request runs over: a whole table or a relation's rows.
#[derive(Clone, Debug)]
pub struct Collection {
    pub resource: Arc<ResourceDefinition>,
    pub scope: Option<Predicate>,
}

impl Collection {
    pub fn all(resource: Arc<ResourceDefinition>) -> Self {
        Collection { resource, scope: None }
    }

    pub fn query(&self) -> BoundedQuery {
        BoundedQuery::new(self.scope.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_semantics() {
        assert!(CompareOp::Eq.evaluate(None, &Value::Null, &Value::Null));
        assert!(!CompareOp::Eq.evaluate(None, &json!(1), &Value::Null));
        assert!(CompareOp::Ne.evaluate(None, &json!(1), &Value::Null));
        assert!(!CompareOp::Lt.evaluate(None, &json!(1), &Value::Null));
    }

    #[test]
    fn decimals_compare_numerically() {
        assert!(CompareOp::Gt.evaluate(Some(FieldType::Decimal), &json!("100.5"), &json!("99.9")));
        assert!(CompareOp::Eq.evaluate(Some(FieldType::Decimal), &json!("2.50"), &json!(2.5)));
    }

    #[test]
    fn mismatched_types_only_differ() {
        assert!(!CompareOp::Eq.evaluate(None, &json!("1"), &json!(1)));
        assert!(CompareOp::Ne.evaluate(None, &json!("1"), &json!(1)));
        assert!(!CompareOp::Gt.evaluate(None, &json!("1"), &json!(1)));
    }

    #[test]
    fn restrict_flattens_conjunctions() {
        let eq = |v: i64| Predicate::Compare {
            op: CompareOp::Eq,
            left: Operand::Column(0),
            right: Operand::Value(json!(v)),
        };
        let query = BoundedQuery::new(Some(eq(1))).restrict(eq(2)).restrict(eq(3));
        assert_eq!(query.filter, Some(Predicate::And(vec![eq(1), eq(2), eq(3)])));
    }

    #[test]
    fn window_offset() {
        assert_eq!(Window { page: 1, size: 5 }.offset(), 0);
        assert_eq!(Window { page: 3, size: 5 }.offset(), 10);
    }
}

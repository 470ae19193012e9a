//! Compile expressions against a resource's declared fields.
//!
//! Every identifier must resolve to a field of the resource; anything else is
//! an error. The output refers to fields by index, never by raw text.

use serde_json::{Number, Value};

use super::ast::{BoolOp, Expr, Literal, Operator, Sign};
use crate::config::{FieldType, ResourceDefinition};
use crate::error::AppError;
use crate::query::{CompareOp, Direction, Operand, OrderTerm, Predicate};

#[derive(Clone, Debug, PartialEq)]
pub enum Term {
    Value(Value),
    Column(usize),
    Order(OrderTerm),
    List(Vec<Term>),
    Predicate(Predicate),
}

pub fn compile(expr: &Expr, resource: &ResourceDefinition) -> Result<Term, AppError> {
    match expr {
        Expr::Literal(literal) => Ok(Term::Value(literal_value(literal))),
        Expr::Identifier(name) => resolve_field(resource, name).map(Term::Column),
        Expr::Tuple(items) => items
            .iter()
            .map(|item| compile(item, resource))
            .collect::<Result<Vec<_>, _>>()
            .map(Term::List),
        Expr::Signed { sign, operand } => {
            let Expr::Identifier(name) = operand.as_ref() else {
                return Err(AppError::InvalidExpression("a sort direction applies to a field name only".into()));
            };
            let direction = match sign {
                Sign::Plus => Direction::Asc,
                Sign::Minus => Direction::Desc,
            };
            Ok(Term::Order(OrderTerm {
                field: resolve_field(resource, name)?,
                direction,
            }))
        }
        Expr::Bool { op, operands } => {
            let mut predicates = operands.iter().map(|operand| {
                let term = compile(operand, resource)?;
                into_predicate(term, resource)
            });
            let first = predicates
                .next()
                .ok_or_else(|| AppError::InvalidExpression("empty boolean expression".into()))??;
            predicates.try_fold(first, |acc, next| {
                let next = next?;
                Ok(match op {
                    BoolOp::And => acc.and(next),
                    BoolOp::Or => acc.or(next),
                })
            })
            .map(Term::Predicate)
        }
        Expr::Compare { op, left, right } => {
            let op = compare_op(*op)?;
            let left = into_operand(compile(left, resource)?)?;
            let right = into_operand(compile(right, resource)?)?;
            compile_comparison(op, left, right, resource).map(Term::Predicate)
        }
    }
}

/// Compile a `filter` expression into a predicate.
pub fn compile_filter(expr: &Expr, resource: &ResourceDefinition) -> Result<Predicate, AppError> {
    into_predicate(compile(expr, resource)?, resource)
}

/// Compile a `sort` expression into ordering terms.
pub fn compile_sort(expr: &Expr, resource: &ResourceDefinition) -> Result<Vec<OrderTerm>, AppError> {
    let order_term = |term: Term| match term {
        Term::Column(field) => Ok(OrderTerm {
            field,
            direction: Direction::Asc,
        }),
        Term::Order(order) => Ok(order),
        _ => Err(AppError::InvalidExpression("sort takes field names, optionally signed".into())),
    };
    match compile(expr, resource)? {
        Term::List(items) => items.into_iter().map(order_term).collect(),
        term => order_term(term).map(|t| vec![t]),
    }
}

/// Compile a `fields` expression into field indices, first occurrence wins.
pub fn compile_projection(expr: &Expr, resource: &ResourceDefinition) -> Result<Vec<usize>, AppError> {
    let column = |term: Term| match term {
        Term::Column(field) => Ok(field),
        _ => Err(AppError::InvalidExpression("fields takes field names only".into())),
    };
    let columns = match compile(expr, resource)? {
        Term::List(items) => items.into_iter().map(column).collect::<Result<Vec<_>, _>>()?,
        term => vec![column(term)?],
    };
    let mut out = Vec::with_capacity(columns.len());
    for c in columns {
        if !out.contains(&c) {
            out.push(c);
        }
    }
    Ok(out)
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Integer(n) => Value::from(*n),
        Literal::Float(n) => Number::from_f64(*n).map(Value::Number).unwrap_or(Value::Null),
        Literal::String(s) => Value::String(s.clone()),
    }
}

fn resolve_field(resource: &ResourceDefinition, name: &str) -> Result<usize, AppError> {
    resource.field_index(name).ok_or_else(|| AppError::UnknownField {
        kind: resource.kind.clone(),
        field: name.to_string(),
    })
}

fn compare_op(op: Operator) -> Result<CompareOp, AppError> {
    match op {
        Operator::Eq => Ok(CompareOp::Eq),
        Operator::Ne => Ok(CompareOp::Ne),
        Operator::Gt => Ok(CompareOp::Gt),
        Operator::Ge => Ok(CompareOp::Ge),
        Operator::Lt => Ok(CompareOp::Lt),
        Operator::Le => Ok(CompareOp::Le),
        Operator::In | Operator::NotIn | Operator::Is | Operator::IsNot | Operator::Like => {
            Err(AppError::UnsupportedOperator(op.to_string()))
        }
    }
}

fn into_operand(term: Term) -> Result<Operand, AppError> {
    match term {
        Term::Column(field) => Ok(Operand::Column(field)),
        Term::Value(value) => Ok(Operand::Value(value)),
        Term::Order(_) => Err(AppError::InvalidExpression(
            "a sort direction is only valid in sort".into(),
        )),
        Term::List(_) | Term::Predicate(_) => Err(AppError::InvalidExpression(
            "comparison operands must be field names or literals".into(),
        )),
    }
}

fn into_predicate(term: Term, resource: &ResourceDefinition) -> Result<Predicate, AppError> {
    match term {
        Term::Predicate(p) => Ok(p),
        Term::Value(Value::Bool(b)) => Ok(Predicate::Constant(b)),
        Term::Column(field) if resource.fields[field].field_type == FieldType::Boolean => {
            Ok(Predicate::Compare {
                op: CompareOp::Eq,
                left: Operand::Column(field),
                right: Operand::Value(Value::Bool(true)),
            })
        }
        Term::Order(_) => Err(AppError::InvalidExpression(
            "a sort direction is only valid in sort".into(),
        )),
        _ => Err(AppError::InvalidExpression("filter must be a condition".into())),
    }
}

/// Coerce a literal to the type of the field it is compared with, and fold
/// comparisons between two literals into a constant.
fn compile_comparison(
    op: CompareOp,
    left: Operand,
    right: Operand,
    resource: &ResourceDefinition,
) -> Result<Predicate, AppError> {
    let coerce = |field: usize, value: Value| {
        let def = &resource.fields[field];
        def.field_type.coerce(&value).ok_or_else(|| AppError::InvalidLiteral {
            field: def.name.clone(),
            value: value.to_string(),
            expected: def.field_type.name(),
        })
    };
    let (left, right) = match (left, right) {
        (Operand::Value(a), Operand::Value(b)) => {
            return Ok(Predicate::Constant(op.evaluate(None, &a, &b)));
        }
        (Operand::Column(c), Operand::Value(v)) => (Operand::Column(c), Operand::Value(coerce(c, v)?)),
        (Operand::Value(v), Operand::Column(c)) => (Operand::Value(coerce(c, v)?), Operand::Column(c)),
        columns => columns,
    };
    Ok(Predicate::Compare { op, left, right })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parse;
    use crate::test_fixtures::employees;
    use serde_json::json;

    fn filter(input: &str) -> Result<Predicate, AppError> {
        compile_filter(&parse(input).unwrap(), &employees())
    }

    fn idx(name: &str) -> usize {
        employees().field_index(name).unwrap()
    }

    #[test]
    fn compiles_conjunction_with_coercion() {
        let predicate = filter("employee_number>1200 and office_code==3").unwrap();
        assert_eq!(
            predicate,
            Predicate::And(vec![
                Predicate::Compare {
                    op: CompareOp::Gt,
                    left: Operand::Column(idx("employee_number")),
                    right: Operand::Value(json!(1200)),
                },
                Predicate::Compare {
                    op: CompareOp::Eq,
                    left: Operand::Column(idx("office_code")),
                    right: Operand::Value(json!("3")),
                },
            ])
        );
    }

    #[test]
    fn or_of_ands() {
        let predicate = filter("job_title=='VP Sales' or employee_number<1100 and reports_to!=null").unwrap();
        let Predicate::Or(parts) = predicate else {
            panic!("expected or");
        };
        assert_eq!(parts.len(), 2);
        assert!(matches!(parts[1], Predicate::And(_)));
    }

    #[test]
    fn identifiers_resolve_by_column_name() {
        let predicate = filter("employeeNumber == 1002").unwrap();
        assert!(matches!(
            predicate,
            Predicate::Compare { left: Operand::Column(c), .. } if c == idx("employee_number")
        ));
    }

    #[test]
    fn unknown_field_is_rejected() {
        assert!(matches!(
            filter("salary > 10"),
            Err(AppError::UnknownField { field, .. }) if field == "salary"
        ));
    }

    #[test]
    fn unsupported_operators_are_rejected() {
        for input in ["employee_number in (1, 2)", "email like 'x'", "reports_to is null"] {
            assert!(matches!(filter(input), Err(AppError::UnsupportedOperator(_))), "{input}");
        }
    }

    #[test]
    fn sort_marker_is_rejected_in_filter() {
        assert!(matches!(filter("-employee_number"), Err(AppError::InvalidExpression(_))));
        assert!(matches!(filter("-employee_number == 1"), Err(AppError::InvalidExpression(_))));
    }

    #[test]
    fn non_condition_filter_is_rejected() {
        assert!(matches!(filter("first_name"), Err(AppError::InvalidExpression(_))));
        assert!(matches!(filter("a_list, b"), Err(AppError::UnknownField { .. })));
        assert!(matches!(filter("first_name, last_name"), Err(AppError::InvalidExpression(_))));
    }

    #[test]
    fn uncoercible_literal_is_rejected() {
        assert!(matches!(
            filter("employee_number == 'abc'"),
            Err(AppError::InvalidLiteral { .. })
        ));
        assert!(matches!(
            filter("employee_number == 99999999999999999999.0"),
            Err(AppError::InvalidLiteral { .. })
        ));
    }

    #[test]
    fn literal_comparisons_fold() {
        assert_eq!(filter("1 == 1").unwrap(), Predicate::Constant(true));
        assert_eq!(filter("true").unwrap(), Predicate::Constant(true));
    }

    #[test]
    fn sort_terms() {
        let terms = compile_sort(&parse("-office_code, firstName").unwrap(), &employees()).unwrap();
        assert_eq!(
            terms,
            vec![
                OrderTerm {
                    field: idx("office_code"),
                    direction: Direction::Desc
                },
                OrderTerm {
                    field: idx("first_name"),
                    direction: Direction::Asc
                },
            ]
        );
        assert!(compile_sort(&parse("a == 1").unwrap(), &employees()).is_err());
    }

    #[test]
    fn projection_dedupes() {
        let fields = compile_projection(&parse("firstName, lastName, first_name").unwrap(), &employees()).unwrap();
        assert_eq!(fields, vec![idx("first_name"), idx("last_name")]);
        assert!(compile_projection(&parse("-firstName").unwrap(), &employees()).is_err());
    }
}

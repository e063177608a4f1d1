//! Query vocabulary: predicates, ordering and the `Filter` bundle.
//!
//! Predicates are plain data. Storage implementations render them into
//! their own dialect and must reject column names the entity schema does
//! not declare.

use std::ops::Not;

use crate::value::Value;

mod filter;
pub use filter::Filter;

/// Comparison operator for a single column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Like,
}

impl ComparisonOperator {
    /// Get the SQL representation of the operator
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::Like => "LIKE",
        }
    }
}

/// A boolean condition over one entity's columns.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        column: String,
        op: ComparisonOperator,
        value: Value,
    },
    In {
        column: String,
        values: Vec<Value>,
    },
    IsNull(String),
    IsNotNull(String),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    fn compare(column: &str, op: ComparisonOperator, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            column: column.to_string(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Self::compare(column, ComparisonOperator::Equal, value)
    }

    pub fn ne(column: &str, value: impl Into<Value>) -> Self {
        Self::compare(column, ComparisonOperator::NotEqual, value)
    }

    pub fn gt(column: &str, value: impl Into<Value>) -> Self {
        Self::compare(column, ComparisonOperator::GreaterThan, value)
    }

    pub fn ge(column: &str, value: impl Into<Value>) -> Self {
        Self::compare(column, ComparisonOperator::GreaterThanOrEqual, value)
    }

    pub fn lt(column: &str, value: impl Into<Value>) -> Self {
        Self::compare(column, ComparisonOperator::LessThan, value)
    }

    pub fn le(column: &str, value: impl Into<Value>) -> Self {
        Self::compare(column, ComparisonOperator::LessThanOrEqual, value)
    }

    pub fn like(column: &str, pattern: &str) -> Self {
        Self::compare(column, ComparisonOperator::Like, pattern)
    }

    pub fn is_in<V: Into<Value>>(column: &str, values: impl IntoIterator<Item = V>) -> Self {
        Predicate::In {
            column: column.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_null(column: &str) -> Self {
        Predicate::IsNull(column.to_string())
    }

    pub fn is_not_null(column: &str) -> Self {
        Predicate::IsNotNull(column.to_string())
    }

    /// Combine with AND, flattening nested ANDs
    pub fn and(self, other: Predicate) -> Self {
        match self {
            Predicate::And(mut parts) => {
                parts.push(other);
                Predicate::And(parts)
            }
            first => Predicate::And(vec![first, other]),
        }
    }

    /// Combine with OR, flattening nested ORs
    pub fn or(self, other: Predicate) -> Self {
        match self {
            Predicate::Or(mut parts) => {
                parts.push(other);
                Predicate::Or(parts)
            }
            first => Predicate::Or(vec![first, other]),
        }
    }

    /// Every column name referenced, in visiting order
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Predicate::Compare { column, .. }
            | Predicate::In { column, .. }
            | Predicate::IsNull(column)
            | Predicate::IsNotNull(column) => out.push(column),
            Predicate::And(parts) | Predicate::Or(parts) => {
                parts.iter().for_each(|p| p.collect_columns(out))
            }
            Predicate::Not(inner) => inner.collect_columns(out),
        }
    }
}

impl Not for Predicate {
    type Output = Predicate;

    fn not(self) -> Self::Output {
        match self {
            Predicate::Not(inner) => *inner,
            other => Predicate::Not(Box::new(other)),
        }
    }
}

/// Order direction for sorting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl OrderDirection {
    /// Get the SQL representation of the direction
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub direction: OrderDirection,
}

impl OrderBy {
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            direction: OrderDirection::Asc,
        }
    }

    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            direction: OrderDirection::Desc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_and_flattens() {
        let p = Predicate::eq("a", 1_i64)
            .and(Predicate::eq("b", 2_i64))
            .and(Predicate::is_null("c"));

        match p {
            Predicate::And(parts) => assert_eq!(parts.len(), 3),
            other => panic!("Expected And, got {:?}", other),
        }
    }

    #[test]
    fn test_or_inside_and_is_kept() {
        let p = Predicate::eq("a", 1_i64)
            .or(Predicate::eq("a", 2_i64))
            .and(Predicate::gt("b", 0_i64));

        assert_eq!(p.columns(), vec!["a", "a", "b"]);
    }

    #[test]
    fn test_double_negation_cancels() {
        let p = Predicate::like("name", "A%");
        assert_eq!(!!p.clone(), p);
        assert!(matches!(!p, Predicate::Not(_)));
    }

    #[test]
    fn test_is_in_collects_values() {
        let p = Predicate::is_in("id", [1_i64, 2, 3]);
        match p {
            Predicate::In { column, values } => {
                assert_eq!(column, "id");
                assert_eq!(values, vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]);
            }
            other => panic!("Expected In, got {:?}", other),
        }
    }

    #[test]
    fn test_operator_sql() {
        assert_eq!(ComparisonOperator::GreaterThanOrEqual.as_sql(), ">=");
        assert_eq!(OrderBy::desc("age").direction.as_sql(), "DESC");
    }
}

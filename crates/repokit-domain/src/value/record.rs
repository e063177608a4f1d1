use serde::Serialize;

use super::{FromValue, Value};
use crate::shared::DomainError;

/// One row read from the store, in column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    /// Builder-style push, handy when assembling records by hand
    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.push(column, value);
        self
    }

    pub fn push(&mut self, column: &str, value: impl Into<Value>) {
        self.fields.push((column.to_string(), value.into()));
    }

    /// Look up a column; exact match first, then ASCII case-insensitive.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .or_else(|| {
                self.fields
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(column))
            })
            .map(|(_, value)| value)
    }

    /// Read and convert a column.
    ///
    /// A missing column is a mapping error, not `None`; use `Option<V>` to
    /// accept NULL.
    pub fn try_get<V: FromValue>(&self, column: &str) -> Result<V, DomainError> {
        let value = self
            .get(column)
            .cloned()
            .ok_or_else(|| DomainError::Mapping(format!("column '{}' not present in row", column)))?;

        V::from_value(value)
            .map_err(|e| DomainError::Mapping(format!("column '{}': {}", column, e.message())))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

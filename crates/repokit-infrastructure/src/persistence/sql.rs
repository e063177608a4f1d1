//! SQLite statement rendering.
//!
//! Identifiers come from static entity schemas and are always quoted;
//! caller-supplied column names are checked against the schema before they
//! reach a statement. Values are always bound, never inlined.

use repokit_domain::{ComparisonOperator, DomainError, EntitySchema, OrderBy, Predicate, Record, Value};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::{Column, QueryBuilder, Row, TypeInfo, ValueRef};

use super::error_mapper::ResultExt;

pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn column_list(schema: &EntitySchema) -> String {
    schema
        .select_columns()
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(", ")
}

fn ensure_column(schema: &EntitySchema, column: &str) -> Result<(), DomainError> {
    if schema.has_column(column) {
        Ok(())
    } else {
        Err(DomainError::InvalidArgument(format!(
            "unknown column '{}' on '{}'",
            column, schema.table
        )))
    }
}

pub(crate) fn push_value(builder: &mut QueryBuilder<'_, Sqlite>, value: Value) {
    match value {
        Value::Null => builder.push_bind(None::<i64>),
        Value::Bool(v) => builder.push_bind(v),
        Value::Integer(v) => builder.push_bind(v),
        Value::Real(v) => builder.push_bind(v),
        Value::Text(v) => builder.push_bind(v),
        Value::Blob(v) => builder.push_bind(v),
    };
}

pub(crate) fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: Value,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(None::<i64>),
        Value::Bool(v) => query.bind(v),
        Value::Integer(v) => query.bind(v),
        Value::Real(v) => query.bind(v),
        Value::Text(v) => query.bind(v),
        Value::Blob(v) => query.bind(v),
    }
}

pub(crate) fn push_predicate(
    builder: &mut QueryBuilder<'_, Sqlite>,
    schema: &EntitySchema,
    predicate: &Predicate,
) -> Result<(), DomainError> {
    match predicate {
        Predicate::Compare { column, op, value } => {
            ensure_column(schema, column)?;
            builder.push(quote_ident(column));

            // `= NULL` never matches in SQL
            match (op, value) {
                (ComparisonOperator::Equal, Value::Null) => {
                    builder.push(" IS NULL");
                }
                (ComparisonOperator::NotEqual, Value::Null) => {
                    builder.push(" IS NOT NULL");
                }
                _ => {
                    builder.push(" ");
                    builder.push(op.as_sql());
                    builder.push(" ");
                    push_value(builder, value.clone());
                }
            }
        }
        Predicate::In { column, values } => {
            ensure_column(schema, column)?;
            if values.is_empty() {
                builder.push("0 = 1");
            } else {
                builder.push(quote_ident(column));
                builder.push(" IN (");
                for (idx, value) in values.iter().enumerate() {
                    if idx > 0 {
                        builder.push(", ");
                    }
                    push_value(builder, value.clone());
                }
                builder.push(")");
            }
        }
        Predicate::IsNull(column) => {
            ensure_column(schema, column)?;
            builder.push(quote_ident(column));
            builder.push(" IS NULL");
        }
        Predicate::IsNotNull(column) => {
            ensure_column(schema, column)?;
            builder.push(quote_ident(column));
            builder.push(" IS NOT NULL");
        }
        Predicate::And(parts) => push_group(builder, schema, parts, " AND ", "1 = 1")?,
        Predicate::Or(parts) => push_group(builder, schema, parts, " OR ", "0 = 1")?,
        Predicate::Not(inner) => {
            builder.push("NOT (");
            push_predicate(builder, schema, inner)?;
            builder.push(")");
        }
    }
    Ok(())
}

fn push_group(
    builder: &mut QueryBuilder<'_, Sqlite>,
    schema: &EntitySchema,
    parts: &[Predicate],
    separator: &str,
    empty: &str,
) -> Result<(), DomainError> {
    if parts.is_empty() {
        builder.push(empty);
        return Ok(());
    }

    builder.push("(");
    for (idx, part) in parts.iter().enumerate() {
        if idx > 0 {
            builder.push(separator);
        }
        push_predicate(builder, schema, part)?;
    }
    builder.push(")");
    Ok(())
}

/// Everything a SELECT over one entity table can carry
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct SelectParts<'a> {
    pub predicate: Option<&'a Predicate>,
    pub order: &'a [OrderBy],
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

pub(crate) fn build_select(
    schema: &EntitySchema,
    parts: SelectParts<'_>,
) -> Result<QueryBuilder<'static, Sqlite>, DomainError> {
    let mut builder = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM {}",
        column_list(schema),
        quote_ident(schema.table)
    ));

    if let Some(predicate) = parts.predicate {
        builder.push(" WHERE ");
        push_predicate(&mut builder, schema, predicate)?;
    }

    if !parts.order.is_empty() {
        builder.push(" ORDER BY ");
        for (idx, order) in parts.order.iter().enumerate() {
            ensure_column(schema, &order.column)?;
            if idx > 0 {
                builder.push(", ");
            }
            builder.push(quote_ident(&order.column));
            builder.push(" ");
            builder.push(order.direction.as_sql());
        }
    }

    push_paging(&mut builder, parts.offset, parts.limit);
    Ok(builder)
}

/// `SELECT COUNT(*)` over the same rows `build_select` would return
pub(crate) fn build_count(
    schema: &EntitySchema,
    parts: SelectParts<'_>,
) -> Result<QueryBuilder<'static, Sqlite>, DomainError> {
    let mut builder = QueryBuilder::<Sqlite>::new(format!(
        "SELECT COUNT(*) FROM (SELECT {} FROM {}",
        quote_ident(schema.key),
        quote_ident(schema.table)
    ));

    if let Some(predicate) = parts.predicate {
        builder.push(" WHERE ");
        push_predicate(&mut builder, schema, predicate)?;
    }

    push_paging(&mut builder, parts.offset, parts.limit);
    builder.push(")");
    Ok(builder)
}

fn push_paging(builder: &mut QueryBuilder<'_, Sqlite>, offset: Option<u64>, limit: Option<u64>) {
    match (limit, offset) {
        (Some(limit), offset) => {
            builder.push(" LIMIT ");
            builder.push_bind(clamp(limit));
            if let Some(offset) = offset {
                builder.push(" OFFSET ");
                builder.push_bind(clamp(offset));
            }
        }
        // SQLite only accepts OFFSET after a LIMIT; -1 means unbounded
        (None, Some(offset)) => {
            builder.push(" LIMIT -1 OFFSET ");
            builder.push_bind(clamp(offset));
        }
        (None, None) => {}
    }
}

fn clamp(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

pub(crate) fn select_all_sql(schema: &EntitySchema) -> String {
    format!(
        "SELECT {} FROM {}",
        column_list(schema),
        quote_ident(schema.table)
    )
}

pub(crate) fn select_by_key_sql(schema: &EntitySchema) -> String {
    format!(
        "{} WHERE {} = ?",
        select_all_sql(schema),
        quote_ident(schema.key)
    )
}

pub(crate) fn count_sql(schema: &EntitySchema) -> String {
    format!("SELECT COUNT(*) FROM {}", quote_ident(schema.table))
}

pub(crate) fn insert_sql(schema: &EntitySchema, with_key: bool) -> String {
    let columns: Vec<&str> = if with_key {
        schema.select_columns().collect()
    } else {
        schema.columns.to_vec()
    };

    if columns.is_empty() {
        return format!("INSERT INTO {} DEFAULT VALUES", quote_ident(schema.table));
    }

    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(schema.table),
        columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", "),
        vec!["?"; columns.len()].join(", ")
    )
}

/// A key-only entity rewrites its key in place, so the row still has to exist
pub(crate) fn update_sql(schema: &EntitySchema) -> String {
    let assignments = if schema.columns.is_empty() {
        format!("{0} = {0}", quote_ident(schema.key))
    } else {
        schema
            .columns
            .iter()
            .map(|c| format!("{} = ?", quote_ident(c)))
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!(
        "UPDATE {} SET {} WHERE {} = ?",
        quote_ident(schema.table),
        assignments,
        quote_ident(schema.key)
    )
}

pub(crate) fn delete_sql(schema: &EntitySchema) -> String {
    format!(
        "DELETE FROM {} WHERE {} = ?",
        quote_ident(schema.table),
        quote_ident(schema.key)
    )
}

/// Read every column of a row into a `Record`, typed by storage class.
pub(crate) fn row_to_record(row: &SqliteRow) -> Result<Record, DomainError> {
    let mut record = Record::with_capacity(row.len());

    for (idx, column) in row.columns().iter().enumerate() {
        let storage_class = {
            let raw = row.try_get_raw(idx).map_repo_error("Read column")?;
            if raw.is_null() {
                None
            } else {
                Some(raw.type_info().name().to_string())
            }
        };

        let value = match storage_class.as_deref() {
            None => Value::Null,
            Some("INTEGER") | Some("BOOLEAN") => {
                Value::Integer(row.try_get(idx).map_repo_error("Decode INTEGER column")?)
            }
            Some("REAL") => Value::Real(row.try_get(idx).map_repo_error("Decode REAL column")?),
            Some("BLOB") => Value::Blob(row.try_get(idx).map_repo_error("Decode BLOB column")?),
            Some(_) => Value::Text(row.try_get(idx).map_repo_error("Decode TEXT column")?),
        };

        record.push(column.name(), value);
    }

    Ok(record)
}

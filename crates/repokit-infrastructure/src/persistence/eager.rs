use std::collections::{HashMap, HashSet};

use repokit_domain::{DomainError, Entity, Record, Relation, RelationKind, Value};
use tracing::debug;

use super::context::StorageContext;

/// Upper bound on bound parameters per `IN (...)` lookup
const RELATED_CHUNK_SIZE: usize = 500;

/// Resolve include names against `T`'s declared relations.
///
/// Runs before the main query so an unknown name fails without touching
/// the store.
pub(crate) fn resolve_relations<T: Entity>(
    includes: &[String],
) -> Result<Vec<&'static Relation>, DomainError> {
    let schema = T::SCHEMA;
    let mut resolved: Vec<&'static Relation> = Vec::with_capacity(includes.len());

    for name in includes {
        let relation = schema.relation(name).ok_or_else(|| {
            DomainError::InvalidArgument(format!(
                "'{}' has no relation named '{}'",
                schema.table, name
            ))
        })?;

        if let RelationKind::BelongsTo { local_column, .. } = relation.kind {
            if !schema.has_column(local_column) {
                return Err(DomainError::InvalidArgument(format!(
                    "relation '{}' joins on '{}', which '{}' does not declare",
                    relation.name, local_column, schema.table
                )));
            }
        }

        if !resolved.iter().any(|r| r.name == relation.name) {
            resolved.push(relation);
        }
    }

    Ok(resolved)
}

/// Map rows to entities and attach the requested relations, one batched
/// lookup per relation.
pub(crate) async fn materialize<T: Entity>(
    context: &StorageContext,
    records: Vec<Record>,
    relations: &[&'static Relation],
) -> Result<Vec<T>, DomainError> {
    let mut entities = records
        .iter()
        .map(T::from_record)
        .collect::<Result<Vec<_>, _>>()?;

    for relation in relations {
        let (parent_column, child_column) = match relation.kind {
            RelationKind::HasMany { foreign_key } => (T::SCHEMA.key, foreign_key),
            RelationKind::BelongsTo {
                local_column,
                target_key,
            } => (local_column, target_key),
        };

        let join_values: Vec<Option<Value>> = records
            .iter()
            .map(|r| r.get(parent_column).filter(|v| !v.is_null()).cloned())
            .collect();

        let mut seen = HashSet::new();
        let distinct: Vec<Value> = join_values
            .iter()
            .flatten()
            .filter(|v| seen.insert((*v).clone()))
            .cloned()
            .collect();

        let mut groups: HashMap<Value, Vec<Record>> = HashMap::new();
        for chunk in distinct.chunks(RELATED_CHUNK_SIZE) {
            for record in context
                .fetch_related(relation.table, child_column, chunk)
                .await?
            {
                if let Some(value) = record.get(child_column).cloned() {
                    groups.entry(value).or_default().push(record);
                }
            }
        }

        debug!(
            target: "repokit::persistence",
            relation = relation.name,
            parents = entities.len(),
            related = groups.values().map(Vec::len).sum::<usize>(),
            "Loaded related rows"
        );

        for (entity, value) in entities.iter_mut().zip(&join_values) {
            let related = value
                .as_ref()
                .and_then(|v| groups.get(v))
                .cloned()
                .unwrap_or_default();
            entity.load_related(relation.name, related)?;
        }
    }

    Ok(entities)
}

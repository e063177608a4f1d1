use std::any::TypeId;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use repokit_domain::{DomainError, Entity, EntitySchema, EntityState, Record, Tracked, Value};
use sqlx::{QueryBuilder, Sqlite, SqlitePool, Transaction};
use tracing::{debug, info, warn};

use super::change_tracker::{ChangeTracker, PendingChange};
use super::error_mapper::ResultExt;
use super::plan_cache::{PlanCacheStats, QueryPlanCache, QueryShape};
use super::sql::{self, bind_value, push_value, quote_ident, row_to_record};

/// Shared state behind one unit of work: the pool, the change tracker
/// and the compiled statement cache.
///
/// Every repository handed out by a unit of work holds an `Arc` to the same
/// context, so they all see one identity map and commit together.
pub struct StorageContext {
    pool: SqlitePool,
    tracker: Mutex<ChangeTracker>,
    plans: QueryPlanCache,
}

impl StorageContext {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            tracker: Mutex::new(ChangeTracker::default()),
            plans: QueryPlanCache::new(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn plan_stats(&self) -> PlanCacheStats {
        self.plans.stats()
    }

    pub(crate) fn plans(&self) -> &QueryPlanCache {
        &self.plans
    }

    pub(crate) fn tracker(&self) -> MutexGuard<'_, ChangeTracker> {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state_of<T: Entity>(&self, tracked: &Tracked<T>) -> EntityState {
        self.tracker().state_of(tracked.handle_id())
    }

    pub fn has_changes(&self) -> bool {
        self.tracker().has_changes()
    }

    pub fn tracked_count(&self) -> usize {
        self.tracker().len()
    }

    pub(crate) fn tracked_value<T: Entity>(&self, key: &Value) -> Option<T> {
        self.tracker().tracked_value::<T>(key)
    }

    pub(crate) async fn fetch_records(
        &self,
        builder: &mut QueryBuilder<'_, Sqlite>,
        context: &str,
    ) -> Result<Vec<Record>, DomainError> {
        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_repo_error(context)?;

        rows.iter().map(row_to_record).collect()
    }

    pub(crate) async fn fetch_by_key(
        &self,
        entity_type: TypeId,
        schema: EntitySchema,
        key: Value,
    ) -> Result<Option<Record>, DomainError> {
        let sql = self
            .plans
            .get_or_build(entity_type, QueryShape::SelectByKey, || {
                sql::select_by_key_sql(&schema)
            });

        let row = bind_value(sqlx::query(&sql), key)
            .fetch_optional(&self.pool)
            .await
            .map_repo_error(&format!("Find {} by key", schema.table))?;

        row.as_ref().map(row_to_record).transpose()
    }

    /// Rows of `table` whose `column` matches any of `keys`
    pub(crate) async fn fetch_related(
        &self,
        table: &str,
        column: &str,
        keys: &[Value],
    ) -> Result<Vec<Record>, DomainError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT * FROM {} WHERE {} IN (",
            quote_ident(table),
            quote_ident(column)
        ));
        for (idx, key) in keys.iter().enumerate() {
            if idx > 0 {
                builder.push(", ");
            }
            push_value(&mut builder, key.clone());
        }
        builder.push(")");

        self.fetch_records(&mut builder, &format!("Load related {}", table))
            .await
    }

    /// Write every staged change in one transaction.
    ///
    /// On failure nothing is written and the tracker is left as it was, so
    /// the caller can fix the offending entity and commit again, or roll back.
    pub async fn save_changes(&self) -> Result<u64, DomainError> {
        let start = Instant::now();
        let pending = self.tracker().pending();

        if pending.is_empty() {
            debug!(target: "repokit::persistence", "Commit with no pending changes");
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_repo_error("Begin transaction")?;

        let mut affected = 0_u64;
        let mut generated_keys = Vec::new();

        for change in &pending {
            match self.apply(&mut tx, change).await {
                Ok((rows, generated)) => {
                    affected += rows;
                    if let Some(key) = generated {
                        generated_keys.push((change, key));
                    }
                }
                Err(e) => {
                    warn!(
                        target: "repokit::persistence",
                        table = change.slot.schema().table,
                        state = %change.state,
                        error = %e,
                        "Commit aborted, rolling back transaction"
                    );
                    // Dropping the transaction rolls it back
                    drop(tx);
                    return Err(e);
                }
            }
        }

        tx.commit().await.map_repo_error("Commit transaction")?;

        for (change, key) in generated_keys {
            change.slot.assign_key(key)?;
        }

        let mut tracker = self.tracker();
        tracker.accept(&pending);
        drop(tracker);

        info!(
            target: "repokit::persistence",
            changes = pending.len(),
            affected_rows = affected,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Committed unit of work"
        );

        Ok(affected)
    }

    async fn apply(
        &self,
        tx: &mut Transaction<'static, Sqlite>,
        change: &PendingChange,
    ) -> Result<(u64, Option<Value>), DomainError> {
        let schema = change.slot.schema();
        let entity_type = change.slot.entity_type();

        match change.state {
            EntityState::Added => {
                let with_key = change.key.is_some();
                let sql = self
                    .plans
                    .get_or_build(entity_type, QueryShape::Insert { with_key }, || {
                        sql::insert_sql(&schema, with_key)
                    });

                let mut query = sqlx::query(&sql);
                if let Some(key) = &change.key {
                    query = bind_value(query, key.clone());
                }
                for value in &change.values {
                    query = bind_value(query, value.clone());
                }

                let result = query
                    .execute(&mut **tx)
                    .await
                    .map_repo_error(&format!("Insert into {}", schema.table))?;

                let generated = if with_key {
                    None
                } else {
                    let key = Value::Integer(result.last_insert_rowid());
                    // Key must fit before the transaction commits
                    change.slot.check_key(&key)?;
                    Some(key)
                };
                Ok((result.rows_affected(), generated))
            }
            EntityState::Modified => {
                let key = Self::key_of(change, &schema)?;
                let sql = self
                    .plans
                    .get_or_build(entity_type, QueryShape::Update, || sql::update_sql(&schema));

                let mut query = sqlx::query(&sql);
                for value in &change.values {
                    query = bind_value(query, value.clone());
                }
                query = bind_value(query, key.clone());

                let result = query
                    .execute(&mut **tx)
                    .await
                    .map_repo_error(&format!("Update {}", schema.table))?;

                Self::expect_row(result.rows_affected(), "update", &schema, &key)?;
                Ok((result.rows_affected(), None))
            }
            EntityState::Deleted => {
                let key = Self::key_of(change, &schema)?;
                let sql = self
                    .plans
                    .get_or_build(entity_type, QueryShape::Delete, || sql::delete_sql(&schema));

                let result = bind_value(sqlx::query(&sql), key.clone())
                    .execute(&mut **tx)
                    .await
                    .map_repo_error(&format!("Delete from {}", schema.table))?;

                Self::expect_row(result.rows_affected(), "delete", &schema, &key)?;
                Ok((result.rows_affected(), None))
            }
            EntityState::Unchanged | EntityState::Detached => Ok((0, None)),
        }
    }

    fn key_of(change: &PendingChange, schema: &EntitySchema) -> Result<Value, DomainError> {
        change.key.clone().ok_or_else(|| {
            DomainError::InvalidOperation(format!(
                "tracked '{}' lost its key before commit",
                schema.table
            ))
        })
    }

    fn expect_row(
        rows: u64,
        action: &str,
        schema: &EntitySchema,
        key: &Value,
    ) -> Result<(), DomainError> {
        if rows == 0 {
            return Err(DomainError::Concurrency(format!(
                "{} of '{}' with key {} matched no row",
                action, schema.table, key
            )));
        }
        Ok(())
    }

    /// Drop pending inserts and reload every other tracked entity from the
    /// store. Entities whose row no longer exists are detached.
    ///
    /// Every row is read and decoded before the tracker is touched; on
    /// failure the tracker keeps all its entries.
    pub async fn discard_changes(&self) -> Result<(), DomainError> {
        let start = Instant::now();
        let slots = self.tracker().reload_candidates();

        let mut reloads = Vec::new();
        let mut vanished = Vec::new();

        for slot in slots {
            let Some(key) = slot.key_value() else {
                vanished.push(slot.handle_id());
                continue;
            };

            match self
                .fetch_by_key(slot.entity_type(), slot.schema(), key)
                .await?
            {
                Some(record) => reloads.push((slot.handle_id(), slot.prepare_reload(&record)?)),
                None => vanished.push(slot.handle_id()),
            }
        }

        let mut tracker = self.tracker();
        let discarded = tracker.discard_added();
        let reloaded = reloads.len();
        for (handle, install) in reloads {
            install();
            tracker.mark_unchanged(handle);
        }
        for handle in &vanished {
            tracker.detach(*handle);
        }
        drop(tracker);

        info!(
            target: "repokit::persistence",
            discarded,
            reloaded,
            detached = vanished.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Rolled back unit of work"
        );

        Ok(())
    }
}

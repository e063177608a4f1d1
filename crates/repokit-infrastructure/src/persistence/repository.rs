use std::any::TypeId;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::TryStreamExt;
use repokit_domain::{
    DomainError, Entity, EntityQuery, EntityState, Filter, Predicate, Repository, Tracked, Value,
};
use tracing::{debug, info};

use super::context::StorageContext;
use super::error_mapper::ResultExt;
use super::plan_cache::QueryShape;
use super::query::SqliteQuery;
use super::sql::{self, bind_value, row_to_record};

/// SQLite-backed repository for one entity type.
///
/// Obtained from [`super::SqliteUnitOfWork::repository`]; every repository
/// of a unit of work shares its [`StorageContext`].
pub struct SqliteRepository<T: Entity> {
    context: Arc<StorageContext>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> SqliteRepository<T> {
    pub(crate) fn new(context: Arc<StorageContext>) -> Self {
        Self {
            context,
            _entity: PhantomData,
        }
    }

    /// Change-tracker state of a handle returned by `add` or `update`
    pub fn state_of(&self, tracked: &Tracked<T>) -> EntityState {
        self.context.state_of(tracked)
    }

    async fn find_by_key(&self, key: Value) -> Result<Option<T>, DomainError> {
        let start = Instant::now();

        if let Some(entity) = self.context.tracked_value::<T>(&key) {
            debug!(
                target: "repokit::persistence",
                table = T::SCHEMA.table,
                key = %key,
                "Resolved from change tracker"
            );
            return Ok(Some(entity));
        }

        let record = self
            .context
            .fetch_by_key(TypeId::of::<T>(), T::SCHEMA, key.clone())
            .await?;

        let entity = record.as_ref().map(T::from_record).transpose()?;

        debug!(
            target: "repokit::persistence",
            table = T::SCHEMA.table,
            key = %key,
            found = entity.is_some(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Find by key"
        );

        Ok(entity)
    }
}

#[async_trait]
impl<T: Entity> Repository<T> for SqliteRepository<T> {
    type Query = SqliteQuery<T>;

    async fn get_all(&self) -> Result<Vec<T>, DomainError> {
        self.query().to_list().await
    }

    async fn get_all_compiled(&self) -> Result<Vec<T>, DomainError> {
        let start = Instant::now();
        let sql = self
            .context
            .plans()
            .get_or_build(TypeId::of::<T>(), QueryShape::SelectAll, || {
                sql::select_all_sql(&T::SCHEMA)
            });

        let mut rows = sqlx::query(&sql).fetch(self.context.pool());
        let mut entities = Vec::new();
        while let Some(row) = rows
            .try_next()
            .await
            .map_repo_error(&format!("Stream {}", T::SCHEMA.table))?
        {
            entities.push(T::from_record(&row_to_record(&row)?)?);
        }

        info!(
            target: "repokit::persistence",
            table = T::SCHEMA.table,
            rows = entities.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Compiled get_all"
        );

        Ok(entities)
    }

    fn query(&self) -> SqliteQuery<T> {
        SqliteQuery::new(Arc::clone(&self.context))
    }

    async fn exec_with_store_procedure(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<Vec<T>, DomainError> {
        let start = Instant::now();

        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_value(query, param.clone());
        }

        let rows = query
            .fetch_all(self.context.pool())
            .await
            .map_repo_error("Execute raw SQL")?;

        let entities = rows
            .iter()
            .map(|row| T::from_record(&row_to_record(row)?))
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            target: "repokit::persistence",
            table = T::SCHEMA.table,
            params = params.len(),
            rows = entities.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Raw SQL executed"
        );

        Ok(entities)
    }

    async fn get_by_id(&self, id: Option<T::Key>) -> Result<Option<T>, DomainError> {
        let Some(id) = id else {
            return Err(DomainError::InvalidArgument(format!(
                "id for '{}' must not be null",
                T::SCHEMA.table
            )));
        };
        self.find_by_key(id.into()).await
    }

    async fn get_by_unique_id(&self, id: &str) -> Result<Option<T>, DomainError> {
        if id.is_empty() {
            return Err(DomainError::InvalidArgument(format!(
                "id for '{}' must not be empty",
                T::SCHEMA.table
            )));
        }
        self.find_by_key(Value::Text(id.to_string())).await
    }

    async fn find(&self, predicate: Predicate) -> Result<Option<T>, DomainError> {
        self.find_by(predicate).single().await
    }

    async fn find_all(&self, predicate: Predicate) -> Result<Vec<T>, DomainError> {
        self.find_by(predicate).to_list().await
    }

    fn add(&self, entity: T) -> Result<Tracked<T>, DomainError> {
        let tracked = self.context.tracker().track_added(entity)?;
        debug!(target: "repokit::persistence", table = T::SCHEMA.table, "Staged insert");
        Ok(tracked)
    }

    fn update(&self, entity: Option<T>) -> Result<Option<Tracked<T>>, DomainError> {
        let Some(entity) = entity else {
            return Ok(None);
        };
        let tracked = self.context.tracker().track_modified(entity)?;
        debug!(target: "repokit::persistence", table = T::SCHEMA.table, "Staged update");
        Ok(Some(tracked))
    }

    fn delete(&self, entity: T) -> Result<(), DomainError> {
        self.context.tracker().track_deleted(entity)?;
        debug!(target: "repokit::persistence", table = T::SCHEMA.table, "Staged delete");
        Ok(())
    }

    async fn count(&self) -> Result<i64, DomainError> {
        let sql = self
            .context
            .plans()
            .get_or_build(TypeId::of::<T>(), QueryShape::Count, || {
                sql::count_sql(&T::SCHEMA)
            });

        sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(self.context.pool())
            .await
            .map_repo_error(&format!("Count {}", T::SCHEMA.table))
    }

    async fn filter(&self, filter: Filter) -> Result<Vec<T>, DomainError> {
        self.query().apply_filter(filter)?.to_list().await
    }

    fn find_by(&self, predicate: Predicate) -> SqliteQuery<T> {
        self.query().filter(predicate)
    }

    async fn exist(&self, predicate: Predicate) -> Result<bool, DomainError> {
        self.find_by(predicate).any().await
    }
}

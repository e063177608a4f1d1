//! Synchronous facade over the async repositories.
//!
//! Each call runs to completion on a private current-thread runtime, and
//! mutations are saved immediately: `add`, `update` and `delete` stage the
//! change and then commit the shared context. Do not use these types from
//! inside an async runtime; `block_on` would panic.

use std::sync::Arc;

use repokit_domain::{
    DomainError, Entity, EntityQuery, EntityState, Filter, Predicate, Repository, Tracked,
    UnitOfWork, UnitOfWorkState, Value,
};
use tokio::runtime::{Builder, Runtime};

use crate::config::StoreConfig;
use crate::persistence::{Database, ResultExt, SqliteRepository, SqliteUnitOfWork, StorageContext};

pub struct BlockingUnitOfWork {
    runtime: Arc<Runtime>,
    inner: SqliteUnitOfWork,
}

impl BlockingUnitOfWork {
    pub fn connect(config: &StoreConfig) -> Result<Self, DomainError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DomainError::Configuration(format!("Failed to build runtime: {}", e)))?;

        let database = runtime.block_on(Database::connect(config))?;

        Ok(Self {
            runtime: Arc::new(runtime),
            inner: SqliteUnitOfWork::new(StorageContext::new(database.into_pool())),
        })
    }

    pub fn execute_script(&self, sql: &str) -> Result<(), DomainError> {
        self.runtime.block_on(async {
            sqlx::raw_sql(sql)
                .execute(self.inner.context().pool())
                .await
                .map_repo_error("Execute script")?;
            Ok(())
        })
    }

    pub fn repository<T: Entity>(&self) -> BlockingRepository<T> {
        BlockingRepository {
            runtime: Arc::clone(&self.runtime),
            context: Arc::clone(self.inner.context()),
            inner: self.inner.repository::<T>(),
        }
    }

    pub fn commit(&self) -> Result<u64, DomainError> {
        self.runtime.block_on(self.inner.commit())
    }

    pub fn rollback(&self) -> Result<(), DomainError> {
        self.runtime.block_on(self.inner.rollback())
    }

    pub fn state(&self) -> UnitOfWorkState {
        self.inner.state()
    }

    pub fn has_changes(&self) -> bool {
        self.inner.has_changes()
    }

    /// The async unit of work underneath
    pub fn as_async(&self) -> &SqliteUnitOfWork {
        &self.inner
    }
}

/// Blocking counterpart of [`SqliteRepository`]
pub struct BlockingRepository<T: Entity> {
    runtime: Arc<Runtime>,
    context: Arc<StorageContext>,
    inner: Arc<SqliteRepository<T>>,
}

impl<T: Entity> BlockingRepository<T> {
    pub fn get_all(&self) -> Result<Vec<T>, DomainError> {
        self.runtime.block_on(self.inner.get_all())
    }

    pub fn get_all_compiled(&self) -> Result<Vec<T>, DomainError> {
        self.runtime.block_on(self.inner.get_all_compiled())
    }

    pub fn exec_with_store_procedure(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<Vec<T>, DomainError> {
        self.runtime
            .block_on(self.inner.exec_with_store_procedure(sql, params))
    }

    pub fn get_by_id(&self, id: Option<T::Key>) -> Result<Option<T>, DomainError> {
        self.runtime.block_on(self.inner.get_by_id(id))
    }

    pub fn get_by_unique_id(&self, id: &str) -> Result<Option<T>, DomainError> {
        self.runtime.block_on(self.inner.get_by_unique_id(id))
    }

    pub fn find(&self, predicate: Predicate) -> Result<Option<T>, DomainError> {
        self.runtime.block_on(self.inner.find(predicate))
    }

    pub fn find_all(&self, predicate: Predicate) -> Result<Vec<T>, DomainError> {
        self.runtime.block_on(self.inner.find_all(predicate))
    }

    pub fn find_by(&self, predicate: Predicate) -> Result<Vec<T>, DomainError> {
        self.runtime
            .block_on(self.inner.find_by(predicate).to_list())
    }

    pub fn filter(&self, filter: Filter) -> Result<Vec<T>, DomainError> {
        self.runtime.block_on(self.inner.filter(filter))
    }

    pub fn count(&self) -> Result<i64, DomainError> {
        self.runtime.block_on(self.inner.count())
    }

    pub fn exist(&self, predicate: Predicate) -> Result<bool, DomainError> {
        self.runtime.block_on(self.inner.exist(predicate))
    }

    /// Insert and save; the returned handle carries the generated key
    pub fn add(&self, entity: T) -> Result<Tracked<T>, DomainError> {
        let tracked = self.inner.add(entity)?;
        self.save()?;
        Ok(tracked)
    }

    /// Overwrite and save; `None` saves nothing and returns `None`
    pub fn update(&self, entity: Option<T>) -> Result<Option<Tracked<T>>, DomainError> {
        let Some(tracked) = self.inner.update(entity)? else {
            return Ok(None);
        };
        self.save()?;
        Ok(Some(tracked))
    }

    /// Delete and save; returns the affected row count
    pub fn delete(&self, entity: T) -> Result<u64, DomainError> {
        self.inner.delete(entity)?;
        self.save()
    }

    pub fn state_of(&self, tracked: &Tracked<T>) -> EntityState {
        self.inner.state_of(tracked)
    }

    fn save(&self) -> Result<u64, DomainError> {
        self.runtime.block_on(self.context.save_changes())
    }
}

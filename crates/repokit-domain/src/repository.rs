use async_trait::async_trait;

use crate::entity::{Entity, Tracked};
use crate::query::{Filter, OrderBy, Predicate};
use crate::shared::DomainError;
use crate::value::Value;

/// Composable, not-yet-executed query over one entity set.
///
/// Builder methods consume and return the query; the async terminals run it.
/// Results are detached: editing them does not reach the store.
#[async_trait]
pub trait EntityQuery<T: Entity>: Send + Sized {
    /// AND another predicate onto the query
    fn filter(self, predicate: Predicate) -> Self;

    fn order_by(self, order: OrderBy) -> Self;

    /// Eager-load a relation declared in the entity schema
    fn include(self, relation: &str) -> Self;

    fn skip(self, count: u64) -> Self;

    fn take(self, count: u64) -> Self;

    async fn to_list(self) -> Result<Vec<T>, DomainError>;

    async fn first(self) -> Result<Option<T>, DomainError>;

    /// `None` for no match, the row for one, `AmbiguousResult` for more
    async fn single(self) -> Result<Option<T>, DomainError>;

    async fn count(self) -> Result<i64, DomainError>;

    async fn any(self) -> Result<bool, DomainError>;
}

/// Typed CRUD and query surface over one entity set.
///
/// Mutations only stage changes in the shared change tracker; nothing
/// reaches the store until the owning unit of work commits.
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    type Query: EntityQuery<T>;

    /// Every row as detached values
    async fn get_all(&self) -> Result<Vec<T>, DomainError>;

    /// Same rows as [`Repository::get_all`], through a cached query plan
    async fn get_all_compiled(&self) -> Result<Vec<T>, DomainError>;

    fn query(&self) -> Self::Query;

    /// Run caller-supplied SQL with positional parameters and map the rows
    /// to `T`.
    ///
    /// The SQL text is forwarded verbatim; only `params` are bound. Never
    /// build `sql` from untrusted input.
    async fn exec_with_store_procedure(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<Vec<T>, DomainError>;

    /// Lookup by primary key; a `None` id is an argument error
    async fn get_by_id(&self, id: Option<T::Key>) -> Result<Option<T>, DomainError>;

    /// Lookup by a string key
    async fn get_by_unique_id(&self, id: &str) -> Result<Option<T>, DomainError>;

    async fn find(&self, predicate: Predicate) -> Result<Option<T>, DomainError>;

    async fn find_all(&self, predicate: Predicate) -> Result<Vec<T>, DomainError>;

    /// Stage `entity` for insertion
    fn add(&self, entity: T) -> Result<Tracked<T>, DomainError>;

    /// Stage a full overwrite of `entity`; `None` is a no-op returning `None`
    fn update(&self, entity: Option<T>) -> Result<Option<Tracked<T>>, DomainError>;

    /// Stage removal of `entity`
    fn delete(&self, entity: T) -> Result<(), DomainError>;

    async fn count(&self) -> Result<i64, DomainError>;

    async fn filter(&self, filter: Filter) -> Result<Vec<T>, DomainError>;

    fn find_by(&self, predicate: Predicate) -> Self::Query;

    async fn exist(&self, predicate: Predicate) -> Result<bool, DomainError>;
}

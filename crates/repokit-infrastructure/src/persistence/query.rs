use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use repokit_domain::{DomainError, Entity, EntityQuery, Filter, OrderBy, Predicate, Record};
use tracing::debug;

use super::context::StorageContext;
use super::eager;
use super::error_mapper::ResultExt;
use super::sql::{self, SelectParts};

/// Deferred query over one SQLite table.
///
/// Nothing runs until a terminal (`to_list`, `first`, `single`, `count`,
/// `any`) is awaited.
pub struct SqliteQuery<T: Entity> {
    context: Arc<StorageContext>,
    predicate: Option<Predicate>,
    order: Vec<OrderBy>,
    includes: Vec<String>,
    offset: Option<u64>,
    limit: Option<u64>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> SqliteQuery<T> {
    pub(crate) fn new(context: Arc<StorageContext>) -> Self {
        Self {
            context,
            predicate: None,
            order: Vec::new(),
            includes: Vec::new(),
            offset: None,
            limit: None,
            _entity: PhantomData,
        }
    }

    /// 1-based page of `page_size` rows
    pub fn page(self, page: u32, page_size: u32) -> Result<Self, DomainError> {
        let paged = Filter::new().page(page, page_size).pagination()?;
        Ok(match paged {
            Some((offset, limit)) => self.skip(offset).take(limit),
            None => self,
        })
    }

    pub fn order_by_desc(self, column: &str) -> Self {
        self.order_by(OrderBy::desc(column))
    }

    pub(crate) fn apply_filter(self, filter: Filter) -> Result<Self, DomainError> {
        let paging = filter.pagination()?;
        let includes: Vec<String> = filter.include_names().into_iter().map(String::from).collect();

        let mut query = self;
        if let Some(predicate) = filter.predicate {
            query = query.filter(predicate);
        }
        query.order.extend(filter.order_by);
        query.includes.extend(includes);

        if let Some((offset, limit)) = paging {
            query = query.skip(offset).take(limit);
        }
        Ok(query)
    }

    fn parts(&self) -> SelectParts<'_> {
        SelectParts {
            predicate: self.predicate.as_ref(),
            order: &self.order,
            offset: self.offset,
            limit: self.limit,
        }
    }

    async fn fetch(&self) -> Result<Vec<T>, DomainError> {
        let relations = eager::resolve_relations::<T>(&self.includes)?;
        let records = self.fetch_rows().await?;
        eager::materialize(&self.context, records, &relations).await
    }

    async fn fetch_rows(&self) -> Result<Vec<Record>, DomainError> {
        let mut builder = sql::build_select(&T::SCHEMA, self.parts())?;
        self.context
            .fetch_records(&mut builder, &format!("Query {}", T::SCHEMA.table))
            .await
    }
}

#[async_trait]
impl<T: Entity> EntityQuery<T> for SqliteQuery<T> {
    fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(match self.predicate.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    fn order_by(mut self, order: OrderBy) -> Self {
        self.order.push(order);
        self
    }

    fn include(mut self, relation: &str) -> Self {
        self.includes.extend(
            relation
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(String::from),
        );
        self
    }

    fn skip(mut self, count: u64) -> Self {
        self.offset = Some(self.offset.unwrap_or(0).saturating_add(count));
        if let Some(limit) = self.limit {
            self.limit = Some(limit.saturating_sub(count));
        }
        self
    }

    fn take(mut self, count: u64) -> Self {
        self.limit = Some(self.limit.map_or(count, |limit| limit.min(count)));
        self
    }

    async fn to_list(self) -> Result<Vec<T>, DomainError> {
        let start = Instant::now();
        let entities = self.fetch().await?;

        debug!(
            target: "repokit::persistence",
            table = T::SCHEMA.table,
            rows = entities.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Query executed"
        );

        Ok(entities)
    }

    async fn first(self) -> Result<Option<T>, DomainError> {
        Ok(self.take(1).fetch().await?.into_iter().next())
    }

    async fn single(self) -> Result<Option<T>, DomainError> {
        let query = self.take(2);
        let relations = eager::resolve_relations::<T>(&query.includes)?;
        let records = query.fetch_rows().await?;

        if records.len() > 1 {
            return Err(DomainError::AmbiguousResult(format!(
                "more than one '{}' matches",
                T::SCHEMA.table
            )));
        }

        let entities = eager::materialize(&query.context, records, &relations).await?;
        Ok(entities.into_iter().next())
    }

    async fn count(self) -> Result<i64, DomainError> {
        let mut builder = sql::build_count(&T::SCHEMA, self.parts())?;
        builder
            .build_query_scalar::<i64>()
            .fetch_one(self.context.pool())
            .await
            .map_repo_error(&format!("Count {}", T::SCHEMA.table))
    }

    async fn any(self) -> Result<bool, DomainError> {
        Ok(self.take(1).count().await? > 0)
    }
}

mod change_tracker;
mod context;
mod database;
mod eager;
mod error_mapper;
mod plan_cache;
mod query;
mod repository;
mod sql;
mod unit_of_work;

pub use context::StorageContext;
pub use database::Database;
pub use error_mapper::{RepositoryErrorMapper, ResultExt};
pub use plan_cache::{PlanCacheStats, QueryPlanCache, QueryShape};
pub use query::SqliteQuery;
pub use repository::SqliteRepository;
pub use unit_of_work::SqliteUnitOfWork;

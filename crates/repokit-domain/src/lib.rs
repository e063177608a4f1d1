// Domain layer - storage-independent contracts
// No dependencies on sqlx or any concrete store

pub mod entity;
pub mod query;
pub mod repository;
pub mod shared;
pub mod value;

// Re-exports for convenience
pub use entity::{Entity, EntitySchema, EntityState, Relation, RelationKind, Tracked};
pub use query::{ComparisonOperator, Filter, OrderBy, OrderDirection, Predicate};
pub use repository::{EntityQuery, Repository};
pub use shared::{DomainError, ErrorCode, ErrorSeverity, UnitOfWork, UnitOfWorkState};
pub use value::{FromValue, Record, Value};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::DomainError;
use crate::entity::Entity;
use crate::repository::Repository;

/// Observable state of a unit of work.
///
/// `Clean -> Dirty` on any staged mutation; `Dirty -> Clean` on a successful
/// commit or on rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitOfWorkState {
    Clean,
    Dirty,
}

impl fmt::Display for UnitOfWorkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clean => write!(f, "clean"),
            Self::Dirty => write!(f, "dirty"),
        }
    }
}

/// Unit of Work trait for managing transactional boundaries.
///
/// One unit of work owns one storage context. Repositories obtained from it
/// share that context, so mutations staged through any of them are flushed
/// together by a single [`UnitOfWork::commit`].
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    type Repo<T: Entity>: Repository<T>;

    /// Get the repository for `T`, creating it on first request.
    ///
    /// Repeated calls for the same `T` return the same instance.
    fn repository<T: Entity>(&self) -> Arc<Self::Repo<T>>;

    /// Flush every pending change in one transaction.
    ///
    /// Returns the number of affected rows.
    async fn commit(&self) -> Result<u64, DomainError>;

    /// Discard pending changes and reload tracked entities from the store.
    async fn rollback(&self) -> Result<(), DomainError>;

    /// Current state of the change tracker
    fn state(&self) -> UnitOfWorkState;

    /// Check if there is anything to commit
    fn has_changes(&self) -> bool {
        self.state() == UnitOfWorkState::Dirty
    }
}

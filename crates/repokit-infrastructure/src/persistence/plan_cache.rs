use std::any::TypeId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;

/// Statement kinds whose SQL depends only on the entity schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryShape {
    SelectAll,
    SelectByKey,
    Count,
    Insert { with_key: bool },
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PlanCacheStats {
    pub plans: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Rendered SQL per (entity type, statement shape), built once per process
/// context and shared by every repository on it.
#[derive(Debug, Default)]
pub struct QueryPlanCache {
    plans: RwLock<HashMap<(TypeId, QueryShape), Arc<str>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl QueryPlanCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_build(
        &self,
        entity: TypeId,
        shape: QueryShape,
        build: impl FnOnce() -> String,
    ) -> Arc<str> {
        let key = (entity, shape);

        if let Some(sql) = self
            .plans
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Arc::clone(sql);
        }

        let mut plans = self.plans.write().unwrap_or_else(PoisonError::into_inner);
        match plans.get(&key) {
            // Raced with another builder
            Some(sql) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Arc::clone(sql)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                let sql: Arc<str> = Arc::from(build());
                plans.insert(key, Arc::clone(&sql));
                sql
            }
        }
    }

    pub fn stats(&self) -> PlanCacheStats {
        PlanCacheStats {
            plans: self.plans.read().unwrap_or_else(PoisonError::into_inner).len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct A;
    struct B;

    #[test]
    fn test_builds_once_per_key() {
        let cache = QueryPlanCache::new();
        let mut builds = 0;

        for _ in 0..3 {
            let sql = cache.get_or_build(TypeId::of::<A>(), QueryShape::Count, || {
                builds += 1;
                "SELECT COUNT(*) FROM a".to_string()
            });
            assert_eq!(&*sql, "SELECT COUNT(*) FROM a");
        }

        assert_eq!(builds, 1);
        assert_eq!(
            cache.stats(),
            PlanCacheStats {
                plans: 1,
                hits: 2,
                misses: 1
            }
        );
    }

    #[test]
    fn test_keys_separate_types_and_shapes() {
        let cache = QueryPlanCache::new();

        cache.get_or_build(TypeId::of::<A>(), QueryShape::Insert { with_key: false }, || "a1".into());
        cache.get_or_build(TypeId::of::<A>(), QueryShape::Insert { with_key: true }, || "a2".into());
        let b = cache.get_or_build(TypeId::of::<B>(), QueryShape::Insert { with_key: false }, || "b1".into());

        assert_eq!(&*b, "b1");
        assert_eq!(cache.stats().plans, 3);
        assert_eq!(cache.stats().hits, 0);
    }
}

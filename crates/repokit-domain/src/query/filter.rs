use super::{OrderBy, Predicate};
use crate::shared::DomainError;

/// Optional predicate, ordering, eager loads and 1-based paging, applied in
/// that order.
///
/// Paging only takes effect when both `page` and `page_size` are set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub predicate: Option<Predicate>,
    pub order_by: Vec<OrderBy>,
    pub include: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    /// Comma-separated relation names, e.g. `"appointments,practitioner"`
    pub fn include(mut self, relations: &str) -> Self {
        self.include = Some(relations.to_string());
        self
    }

    pub fn page(mut self, page: u32, page_size: u32) -> Self {
        self.page = Some(page);
        self.page_size = Some(page_size);
        self
    }

    /// Relation names from `include`, trimmed, empty entries dropped
    pub fn include_names(&self) -> Vec<&str> {
        self.include
            .as_deref()
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// `(offset, limit)` when both paging fields are present.
    pub fn pagination(&self) -> Result<Option<(u64, u64)>, DomainError> {
        let (Some(page), Some(page_size)) = (self.page, self.page_size) else {
            return Ok(None);
        };

        if page == 0 {
            return Err(DomainError::InvalidArgument(
                "page is 1-based and must be at least 1".to_string(),
            ));
        }
        if page_size == 0 {
            return Err(DomainError::InvalidArgument(
                "page_size must be at least 1".to_string(),
            ));
        }

        let offset = u64::from(page - 1) * u64::from(page_size);
        Ok(Some((offset, u64::from(page_size))))
    }
}

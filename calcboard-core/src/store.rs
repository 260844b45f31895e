//! Calculation repository boundary
//!
//! The aggregator and the BREAD operations only talk to storage through
//! [`CalculationStore`]. Every method is scoped by owner: a store must never
//! return, modify or count a record whose `user_id` differs from the owner
//! passed in.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{Calculation, OperationType};

/// Sort order for owner listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Most recently created first (ties broken by id, descending)
    #[default]
    NewestFirst,
    /// Oldest first (ties broken by id, ascending)
    OldestFirst,
}

/// Filter, ordering and paging for [`CalculationStore::list_by_owner`].
#[derive(Debug, Clone, Default)]
pub struct CalculationQuery {
    /// Case-insensitive exact match on the operation tag.
    ///
    /// Kept as a raw string: an unknown tag matches nothing instead of failing.
    pub operation: Option<String>,
    /// Inclusive lower bound on `created_at`
    pub since: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`
    pub until: Option<DateTime<Utc>>,
    pub order: SortOrder,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

impl CalculationQuery {
    /// All of an owner's records, newest first.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn between(mut self, since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self.until = Some(until);
        self
    }

    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    pub fn page(mut self, offset: u64, limit: u64) -> Self {
        self.offset = Some(offset);
        self.limit = Some(limit);
        self
    }

    /// Normalized operation tag used for matching.
    pub fn operation_tag(&self) -> Option<String> {
        self.operation
            .as_deref()
            .map(|tag| tag.trim().to_ascii_lowercase())
    }

    /// In-memory equivalent of the store-side filter (ignores paging).
    pub fn matches(&self, calc: &Calculation) -> bool {
        if let Some(tag) = self.operation_tag() {
            if calc.operation.as_str() != tag {
                return false;
            }
        }
        if let Some(since) = self.since {
            if calc.created_at < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if calc.created_at > until {
                return false;
            }
        }
        true
    }
}

/// Owner-scoped persistence for calculation records.
pub trait CalculationStore: Send + Sync {
    /// Persist a new record.
    fn create(&self, calc: &Calculation) -> Result<()>;

    /// Fetch a record if it exists and belongs to `owner`.
    fn get(&self, id: &str, owner: &str) -> Result<Option<Calculation>>;

    /// List `owner`'s records matching `query`.
    fn list_by_owner(&self, owner: &str, query: &CalculationQuery) -> Result<Vec<Calculation>>;

    /// Count `owner`'s records matching `query`, ignoring offset and limit.
    fn count_by_owner(&self, owner: &str, query: &CalculationQuery) -> Result<i64>;

    /// Overwrite type, inputs, result and `updated_at` of an owned record.
    ///
    /// Returns `false` when no record with that id belongs to `calc.user_id`.
    fn update(&self, calc: &Calculation) -> Result<bool>;

    /// Delete an owned record. Returns `false` when nothing matched.
    fn delete(&self, id: &str, owner: &str) -> Result<bool>;
}

/// Helper for stores and callers that hold a typed operation.
impl From<OperationType> for CalculationQuery {
    fn from(operation: OperationType) -> Self {
        CalculationQuery::all().with_operation(operation.as_str())
    }
}


/// In-memory store used by unit tests across the crate.
#[cfg(test)]
pub(crate) mod memory {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MemoryStore {
        records: Mutex<Vec<Calculation>>,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&self, calc: Calculation) {
            self.records.lock().unwrap().push(calc);
        }
    }

    impl CalculationStore for MemoryStore {
        fn create(&self, calc: &Calculation) -> Result<()> {
            self.insert(calc.clone());
            Ok(())
        }

        fn get(&self, id: &str, owner: &str) -> Result<Option<Calculation>> {
            let records = self.records.lock().unwrap();
            Ok(records
                .iter()
                .find(|c| c.id == id && c.user_id == owner)
                .cloned())
        }

        fn list_by_owner(&self, owner: &str, query: &CalculationQuery) -> Result<Vec<Calculation>> {
            let records = self.records.lock().unwrap();
            let mut matching: Vec<Calculation> = records
                .iter()
                .filter(|c| c.user_id == owner && query.matches(c))
                .cloned()
                .collect();

            matching.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
            if query.order == SortOrder::NewestFirst {
                matching.reverse();
            }

            let offset = query.offset.unwrap_or(0) as usize;
            let limit = query.limit.map(|l| l as usize).unwrap_or(usize::MAX);
            Ok(matching.into_iter().skip(offset).take(limit).collect())
        }

        fn count_by_owner(&self, owner: &str, query: &CalculationQuery) -> Result<i64> {
            let records = self.records.lock().unwrap();
            Ok(records
                .iter()
                .filter(|c| c.user_id == owner && query.matches(c))
                .count() as i64)
        }

        fn update(&self, calc: &Calculation) -> Result<bool> {
            let mut records = self.records.lock().unwrap();
            match records
                .iter_mut()
                .find(|c| c.id == calc.id && c.user_id == calc.user_id)
            {
                Some(existing) => {
                    *existing = calc.clone();
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        fn delete(&self, id: &str, owner: &str) -> Result<bool> {
            let mut records = self.records.lock().unwrap();
            let before = records.len();
            records.retain(|c| !(c.id == id && c.user_id == owner));
            Ok(records.len() < before)
        }
    }
}

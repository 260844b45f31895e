//! Paginated, optionally filtered calculation history.

use serde::Serialize;

use super::MAX_PAGE_SIZE;
use crate::error::{Error, Result};
use crate::store::{CalculationQuery, CalculationStore};
use crate::types::Calculation;

/// One page of a user's history, newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPage {
    pub calculations: Vec<Calculation>,
    /// Matching records before pagination
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    /// `ceil(total / page_size)`, 0 when nothing matches
    pub total_pages: i64,
}

/// Fetch page `page` (1-based) of `user`'s history.
///
/// `operation` is a case-insensitive exact match on the tag; a blank filter is
/// ignored and an unknown tag yields an empty page.
pub fn paginated_history<S: CalculationStore + ?Sized>(
    store: &S,
    user: &str,
    page: i64,
    page_size: i64,
    operation: Option<&str>,
) -> Result<HistoryPage> {
    if page < 1 {
        return Err(Error::InvalidPage(page));
    }
    if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
        return Err(Error::InvalidPageSize(page_size));
    }

    let mut query = CalculationQuery::all();
    if let Some(tag) = operation.filter(|tag| !tag.trim().is_empty()) {
        query = query.with_operation(tag);
    }

    let total = store.count_by_owner(user, &query)?;
    let total_pages = (total + page_size - 1) / page_size;

    let offset = (page - 1).saturating_mul(page_size);
    let calculations = store.list_by_owner(user, &query.page(offset as u64, page_size as u64))?;

    tracing::debug!(
        user,
        page,
        page_size,
        total,
        returned = calculations.len(),
        "Fetched history page"
    );

    Ok(HistoryPage {
        calculations,
        total,
        page,
        page_size,
        total_pages,
    })
}

//! Per-user overview statistics.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::{rounded_mean, RECENT_LIMIT, TREND_DAYS};
use crate::error::Result;
use crate::store::{CalculationQuery, CalculationStore};
use crate::types::{Calculation, OperationType};

/// A calculation as listed in a summary (no owner field).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentCalculation {
    pub id: String,
    #[serde(rename = "type")]
    pub operation: OperationType,
    pub inputs: Vec<f64>,
    pub result: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Calculation> for RecentCalculation {
    fn from(calc: &Calculation) -> Self {
        Self {
            id: calc.id.clone(),
            operation: calc.operation,
            inputs: calc.inputs.clone(),
            result: calc.result,
            created_at: calc.created_at,
            updated_at: calc.updated_at,
        }
    }
}

/// Overview of everything a user has calculated.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct UserSummary {
    pub total_calculations: i64,
    /// Count per operation tag; only tags that occur are present
    pub operations_breakdown: BTreeMap<String, i64>,
    pub average_inputs_count: Option<f64>,
    pub average_result: Option<f64>,
    /// Highest count wins; ties go to the alphabetically first tag
    pub most_used_operation: Option<OperationType>,
    /// Newest first, at most [`RECENT_LIMIT`]
    pub recent_calculations: Vec<RecentCalculation>,
    /// `YYYY-MM-DD` (UTC) to count, over the trailing [`TREND_DAYS`] days
    pub calculations_by_day: BTreeMap<String, i64>,
}

impl UserSummary {
    /// Aggregate an owner's full record set as of `now`.
    pub fn from_records(records: &[Calculation], now: DateTime<Utc>) -> Self {
        if records.is_empty() {
            return Self::default();
        }

        let mut counts: BTreeMap<OperationType, i64> = BTreeMap::new();
        for calc in records {
            *counts.entry(calc.operation).or_insert(0) += 1;
        }

        // ALL is in tag order, so the first strict maximum is the tie winner.
        let mut most_used: Option<(OperationType, i64)> = None;
        for op in OperationType::ALL {
            let count = counts.get(&op).copied().unwrap_or(0);
            if count > 0 && most_used.map_or(true, |(_, best)| count > best) {
                most_used = Some((op, count));
            }
        }

        let mut newest: Vec<&Calculation> = records.iter().collect();
        newest.sort_by(|a, b| (b.created_at, &b.id).cmp(&(a.created_at, &a.id)));

        let window_start = now - Duration::days(TREND_DAYS);
        let mut by_day: BTreeMap<String, i64> = BTreeMap::new();
        for calc in records
            .iter()
            .filter(|c| c.created_at >= window_start && c.created_at <= now)
        {
            let day = calc.created_at.format("%Y-%m-%d").to_string();
            *by_day.entry(day).or_insert(0) += 1;
        }

        Self {
            total_calculations: records.len() as i64,
            operations_breakdown: counts
                .into_iter()
                .map(|(op, count)| (op.as_str().to_string(), count))
                .collect(),
            average_inputs_count: rounded_mean(records.iter().map(|c| c.inputs.len() as f64)),
            average_result: rounded_mean(records.iter().map(|c| c.result)),
            most_used_operation: most_used.map(|(op, _)| op),
            recent_calculations: newest
                .into_iter()
                .take(RECENT_LIMIT)
                .map(RecentCalculation::from)
                .collect(),
            calculations_by_day: by_day,
        }
    }
}

/// Summarize `user`'s calculations as of now.
pub fn user_summary<S: CalculationStore + ?Sized>(store: &S, user: &str) -> Result<UserSummary> {
    user_summary_at(store, user, Utc::now())
}

/// Summarize `user`'s calculations as of `now`.
pub fn user_summary_at<S: CalculationStore + ?Sized>(
    store: &S,
    user: &str,
    now: DateTime<Utc>,
) -> Result<UserSummary> {
    let records = store.list_by_owner(user, &CalculationQuery::all())?;
    let summary = UserSummary::from_records(&records, now);

    tracing::debug!(
        user,
        total = summary.total_calculations,
        days = summary.calculations_by_day.len(),
        "Computed user summary"
    );
    Ok(summary)
}

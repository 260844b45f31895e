//! Statistics for a single operation type.

use serde::Serialize;

use super::{round2, rounded_mean};
use crate::error::Result;
use crate::store::{CalculationQuery, CalculationStore};
use crate::types::Calculation;

/// Count, averages and extremes over one operation's records.
///
/// All numeric fields are `None` when `count` is 0.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct OperationSummary {
    pub count: i64,
    pub average_inputs_count: Option<f64>,
    pub average_result: Option<f64>,
    pub min_result: Option<f64>,
    pub max_result: Option<f64>,
}

impl OperationSummary {
    pub fn from_records(records: &[Calculation]) -> Self {
        let results = || records.iter().map(|c| c.result);

        Self {
            count: records.len() as i64,
            average_inputs_count: rounded_mean(records.iter().map(|c| c.inputs.len() as f64)),
            average_result: rounded_mean(results()),
            min_result: results().reduce(f64::min).map(round2),
            max_result: results().reduce(f64::max).map(round2),
        }
    }
}

/// Summarize `user`'s records whose tag matches `operation` (case-insensitive).
///
/// An unknown tag is not an error; it matches nothing.
pub fn operation_summary<S: CalculationStore + ?Sized>(
    store: &S,
    user: &str,
    operation: &str,
) -> Result<OperationSummary> {
    let records = store.list_by_owner(user, &CalculationQuery::all().with_operation(operation))?;
    Ok(OperationSummary::from_records(&records))
}

//! Statistics over a user's calculation history
//!
//! Provides:
//! - [`user_summary`]: totals, per-operation breakdown, averages, recent
//!   records and a trailing daily trend
//! - [`paginated_history`]: filtered, newest-first pages with totals
//! - [`operation_summary`]: count, averages and extremes for one operation
//!
//! Every aggregate is computed over one owner's records only and never fails
//! on empty data. Averages and extremes are rounded to two decimals.

pub mod history;
pub mod operation;
pub mod summary;

pub use history::{paginated_history, HistoryPage};
pub use operation::{operation_summary, OperationSummary};
pub use summary::{user_summary, user_summary_at, RecentCalculation, UserSummary};

/// Number of records in [`UserSummary::recent_calculations`]
pub const RECENT_LIMIT: usize = 10;

/// Length of the trailing window for [`UserSummary::calculations_by_day`]
pub const TREND_DAYS: i64 = 30;

/// Largest accepted history page size
pub const MAX_PAGE_SIZE: i64 = 100;

/// Round half away from zero to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Rounded arithmetic mean, `None` for an empty sequence.
pub(crate) fn rounded_mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| round2(sum / count as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2() {
        assert_eq!(round2(0.125), 0.13);
        assert_eq!(round2(1.999), 2.0);
        assert_eq!(round2(3.0), 3.0);
        assert_eq!(round2(-0.125), -0.13);
        assert_eq!(round2(1.0 / 3.0), 0.33);
    }

    #[test]
    fn test_rounded_mean() {
        assert_eq!(rounded_mean(Vec::<f64>::new()), None);
        assert_eq!(rounded_mean([1.0, 2.0]), Some(1.5));
        assert_eq!(rounded_mean([1.0, 1.0, 2.0]), Some(1.33));
    }
}

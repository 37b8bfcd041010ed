//! Billing-cycle calendar arithmetic.
//!
//! A billing period is one calendar month. Due dates are anchored on the
//! unit's billing day, clamped to the length of shorter months.

use chrono::{Datelike, Months, NaiveDate};

use crate::error::{LedgerError, LedgerResult};

/// Advances a due date by one billing period.
///
/// The day of month is clamped, so `2025-01-31` becomes `2025-02-28`.
pub fn add_billing_period(due_date: NaiveDate) -> LedgerResult<NaiveDate> {
    due_date
        .checked_add_months(Months::new(1))
        .ok_or_else(|| LedgerError::Validation(format!("due_date {} is out of range", due_date)))
}

/// First day of the month the date falls in. Used as the per-period uniqueness key.
pub fn billing_period_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

/// The unit's billing day within a given month.
pub fn due_date_in_month(year: i32, month: u32, billing_day: u32) -> LedgerResult<NaiveDate> {
    let day = billing_day.clamp(1, days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        LedgerError::Validation(format!("no billing date for {}-{:02}", year, month))
    })
}

/// Next due date on or after `from`, relative to the unit's billing day.
pub fn next_due_date(from: NaiveDate, billing_day: u32) -> LedgerResult<NaiveDate> {
    if !(1..=31).contains(&billing_day) {
        return Err(LedgerError::Validation(format!(
            "billing_day must be between 1 and 31, got {}",
            billing_day
        )));
    }

    let candidate = due_date_in_month(from.year(), from.month(), billing_day)?;
    if candidate >= from {
        return Ok(candidate);
    }

    let next_month = add_billing_period(billing_period_start(from))?;
    due_date_in_month(next_month.year(), next_month.month(), billing_day)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn adds_one_month() {
        assert_eq!(add_billing_period(date(2025, 1, 10)).unwrap(), date(2025, 2, 10));
        assert_eq!(add_billing_period(date(2025, 12, 5)).unwrap(), date(2026, 1, 5));
    }

    #[test]
    fn clamps_month_end() {
        assert_eq!(add_billing_period(date(2025, 1, 31)).unwrap(), date(2025, 2, 28));
        assert_eq!(add_billing_period(date(2024, 1, 31)).unwrap(), date(2024, 2, 29));
    }

    #[test]
    fn computes_period_start() {
        assert_eq!(billing_period_start(date(2025, 3, 17)), date(2025, 3, 1));
    }

    #[test]
    fn counts_days_in_month() {
        assert_eq!(days_in_month(2025, 2), 28);
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2025, 12), 31);
        assert_eq!(days_in_month(2025, 4), 30);
    }

    #[test]
    fn next_due_date_same_month_when_not_passed() {
        assert_eq!(next_due_date(date(2025, 3, 2), 10).unwrap(), date(2025, 3, 10));
        assert_eq!(next_due_date(date(2025, 3, 10), 10).unwrap(), date(2025, 3, 10));
    }

    #[test]
    fn next_due_date_rolls_to_next_month() {
        assert_eq!(next_due_date(date(2025, 3, 11), 10).unwrap(), date(2025, 4, 10));
        assert_eq!(next_due_date(date(2025, 12, 20), 5).unwrap(), date(2026, 1, 5));
    }

    #[test]
    fn next_due_date_clamps_billing_day() {
        assert_eq!(next_due_date(date(2025, 2, 1), 31).unwrap(), date(2025, 2, 28));
        assert_eq!(next_due_date(date(2025, 1, 31), 30).unwrap(), date(2025, 2, 28));
    }

    #[test]
    fn rejects_invalid_billing_day() {
        assert!(next_due_date(date(2025, 2, 1), 0).is_err());
        assert!(next_due_date(date(2025, 2, 1), 32).is_err());
    }
}

//! Calendar-month deal window with an optional status predicate

use super::model::{Deal, DealStatus};
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeriodError {
    #[error("month must be 1-12, got {0}")]
    InvalidMonth(u32),
    #[error("year {0} is out of range")]
    InvalidYear(i32),
}

/// Inclusive [first_day, last_day] range of one calendar month
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthWindow {
    pub month: u32,
    pub year: i32,
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
}

impl MonthWindow {
    pub fn new(month: u32, year: i32) -> Result<Self, PeriodError> {
        if !(1..=12).contains(&month) {
            return Err(PeriodError::InvalidMonth(month));
        }

        let first_day =
            NaiveDate::from_ymd_opt(year, month, 1).ok_or(PeriodError::InvalidYear(year))?;
        let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
        let last_day = NaiveDate::from_ymd_opt(next_year, next_month, 1)
            .and_then(|d| d.pred_opt())
            .ok_or(PeriodError::InvalidYear(year))?;

        Ok(Self {
            month,
            year,
            first_day,
            last_day,
        })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.first_day <= date && date <= self.last_day
    }

    /// `M-YYYY`, the label used in report headers and file names
    pub fn label(&self) -> String {
        format!("{}-{}", self.month, self.year)
    }
}

pub struct DealFilter {
    window: MonthWindow,
    status: Option<DealStatus>,
}

impl DealFilter {
    pub fn new(window: MonthWindow) -> Self {
        Self { window, status: None }
    }

    pub fn with_status(mut self, status: Option<DealStatus>) -> Self {
        self.status = status;
        self
    }

    /// Deals without a creation timestamp never match
    pub fn matches(&self, deal: &Deal) -> bool {
        let Some(created_at) = deal.created_at else {
            return false;
        };

        if !self.window.contains(created_at.date()) {
            return false;
        }

        match self.status {
            Some(status) => deal.status == status,
            None => true,
        }
    }

    /// Keeps input order
    pub fn apply(&self, deals: &[Deal]) -> Vec<Deal> {
        let filtered: Vec<Deal> = deals.iter().filter(|d| self.matches(d)).cloned().collect();

        log::debug!(
            "Filtered deals for {} ({} to {}): {} of {}",
            self.window.label(),
            self.window.first_day,
            self.window.last_day,
            filtered.len(),
            deals.len()
        );

        filtered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn deal_at(id: i64, ts: Option<&str>, status: DealStatus) -> Deal {
        Deal {
            id,
            created_at: ts.map(|s| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()),
            value: None,
            status,
            person: None,
        }
    }

    #[test]
    fn test_month_window_bounds() {
        let feb_leap = MonthWindow::new(2, 2024).unwrap();
        assert_eq!(feb_leap.last_day, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

        let dec = MonthWindow::new(12, 2024).unwrap();
        assert_eq!(dec.first_day, NaiveDate::from_ymd_opt(2024, 12, 1).unwrap());
        assert_eq!(dec.last_day, NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
        assert_eq!(dec.label(), "12-2024");
    }

    #[test]
    fn test_invalid_month_rejected() {
        assert_eq!(MonthWindow::new(0, 2024), Err(PeriodError::InvalidMonth(0)));
        assert_eq!(MonthWindow::new(13, 2024), Err(PeriodError::InvalidMonth(13)));
    }

    #[test]
    fn test_last_day_included_next_month_excluded() {
        let filter = DealFilter::new(MonthWindow::new(10, 2024).unwrap());
        let deals = vec![
            deal_at(1, Some("2024-10-01 00:00:00"), DealStatus::Open),
            deal_at(2, Some("2024-10-31 23:59:59"), DealStatus::Open),
            deal_at(3, Some("2024-11-01 00:00:00"), DealStatus::Open),
            deal_at(4, Some("2024-09-30 23:59:59"), DealStatus::Open),
        ];

        let ids: Vec<i64> = filter.apply(&deals).iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_missing_timestamp_excluded() {
        let filter = DealFilter::new(MonthWindow::new(10, 2024).unwrap());
        let deals = vec![deal_at(1, None, DealStatus::Open)];
        assert!(filter.apply(&deals).is_empty());
    }

    #[test]
    fn test_status_predicate_composes_with_window() {
        let filter =
            DealFilter::new(MonthWindow::new(10, 2024).unwrap()).with_status(Some(DealStatus::Open));
        let deals = vec![
            deal_at(1, Some("2024-10-05 09:00:00"), DealStatus::Open),
            deal_at(2, Some("2024-10-05 09:00:00"), DealStatus::Won),
            deal_at(3, Some("2024-11-05 09:00:00"), DealStatus::Open),
        ];

        let ids: Vec<i64> = filter.apply(&deals).iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![1]);
    }
}

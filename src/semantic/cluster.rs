//! Model Cluster Definition
//!
//! A model cluster groups the metrics and dimensions of one business subject
//! area. Identifier resolution is always scoped to a single cluster.

use crate::semantic::dimension::Dimension;
use crate::semantic::metric::Metric;
use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// Time grain for default windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeGrain {
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl TimeGrain {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "day" => Some(TimeGrain::Day),
            "week" => Some(TimeGrain::Week),
            "month" => Some(TimeGrain::Month),
            "quarter" => Some(TimeGrain::Quarter),
            "year" => Some(TimeGrain::Year),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeGrain::Day => "day",
            TimeGrain::Week => "week",
            TimeGrain::Month => "month",
            TimeGrain::Quarter => "quarter",
            TimeGrain::Year => "year",
        }
    }
}

/// The last `unit` periods of `grain`, ending on a reference date (inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub grain: TimeGrain,
    pub unit: u32,
}

impl DateWindow {
    pub fn new(grain: TimeGrain, unit: u32) -> Self {
        Self { grain, unit }
    }

    pub fn days(unit: u32) -> Self {
        Self::new(TimeGrain::Day, unit)
    }

    /// Inclusive (start, end) dates of the window ending on `end`
    ///
    /// A zero unit is treated as one period. `None` when the start date falls
    /// outside the representable calendar.
    pub fn range(&self, end: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
        let unit = self.unit.max(1);
        let start = match self.grain {
            TimeGrain::Day => end.checked_sub_days(Days::new(u64::from(unit) - 1)),
            TimeGrain::Week => end.checked_sub_days(Days::new(7 * u64::from(unit) - 1)),
            TimeGrain::Month => months_before(end, Some(unit)),
            TimeGrain::Quarter => months_before(end, unit.checked_mul(3)),
            TimeGrain::Year => months_before(end, unit.checked_mul(12)),
        }?;
        Some((start, end))
    }
}

/// Day after `end` minus `months` months
fn months_before(end: NaiveDate, months: Option<u32>) -> Option<NaiveDate> {
    end.checked_sub_months(Months::new(months?))?
        .checked_add_days(Days::new(1))
}

/// Named grouping of metrics and dimensions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCluster {
    /// Cluster identifier, unique within the catalog
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    /// Physical table the bound SQL selects from
    pub table: String,
    #[serde(default)]
    pub metrics: Vec<Metric>,
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
    /// Partition time dimension used for default windows
    #[serde(default)]
    pub time_dimension: Option<String>,
    /// Metric injected when a draft references none
    #[serde(default)]
    pub default_metric: Option<String>,
    /// Time window injected when a draft has no time predicate
    #[serde(default)]
    pub default_window: Option<DateWindow>,
}

impl ModelCluster {
    pub fn new(name: &str, table: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: String::new(),
            table: table.to_string(),
            metrics: Vec::new(),
            dimensions: Vec::new(),
            time_dimension: None,
            default_metric: None,
            default_window: None,
        }
    }

    pub fn with_display_name(mut self, display_name: &str) -> Self {
        self.display_name = display_name.to_string();
        self
    }

    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metrics.push(metric);
        self
    }

    pub fn with_dimension(mut self, dimension: Dimension) -> Self {
        self.dimensions.push(dimension);
        self
    }

    pub fn with_time_dimension(mut self, name: &str) -> Self {
        self.time_dimension = Some(name.to_string());
        self
    }

    pub fn with_default_metric(mut self, name: &str) -> Self {
        self.default_metric = Some(name.to_string());
        self
    }

    pub fn with_default_window(mut self, window: DateWindow) -> Self {
        self.default_window = Some(window);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_day_window() {
        let (start, end) = DateWindow::days(3).range(date(2024, 3, 10)).unwrap();
        assert_eq!(start, date(2024, 3, 8));
        assert_eq!(end, date(2024, 3, 10));

        // A zero unit still covers the reference day
        let (start, _) = DateWindow::days(0).range(date(2024, 3, 10)).unwrap();
        assert_eq!(start, date(2024, 3, 10));
    }

    #[test]
    fn test_calendar_windows() {
        let end = date(2024, 3, 31);
        assert_eq!(DateWindow::new(TimeGrain::Week, 1).range(end).unwrap().0, date(2024, 3, 25));
        assert_eq!(DateWindow::new(TimeGrain::Month, 1).range(end).unwrap().0, date(2024, 3, 1));
        assert_eq!(DateWindow::new(TimeGrain::Quarter, 1).range(end).unwrap().0, date(2024, 1, 1));
        assert_eq!(DateWindow::new(TimeGrain::Year, 1).range(end).unwrap().0, date(2023, 4, 1));
    }

    #[test]
    fn test_oversized_window_has_no_range() {
        let end = date(2024, 3, 10);
        assert_eq!(DateWindow::new(TimeGrain::Year, 400_000_000).range(end), None);
        assert_eq!(DateWindow::new(TimeGrain::Quarter, u32::MAX).range(end), None);
        assert_eq!(DateWindow::new(TimeGrain::Month, u32::MAX).range(end), None);
        assert_eq!(DateWindow::days(u32::MAX).range(end), None);
        assert_eq!(DateWindow::new(TimeGrain::Week, u32::MAX).range(end), None);
    }
}

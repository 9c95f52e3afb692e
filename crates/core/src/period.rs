use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid reporting month: {0}")]
pub struct InvalidMonth(pub String);

/// A calendar month as declared by a settlement report ("luna raportare").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReportingMonth {
    year: i32,
    month: u32,
}

impl ReportingMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(ReportingMonth { year, month })
    }

    /// For compile-time constants; `month` must already be in `1..=12`.
    pub(crate) const fn known(year: i32, month: u32) -> Self {
        ReportingMonth { year, month }
    }

    pub fn of(date: NaiveDate) -> Self {
        ReportingMonth {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(self) -> i32 {
        self.year
    }

    pub fn month(self) -> u32 {
        self.month
    }

    pub fn first_day(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(self) -> NaiveDate {
        self.first_day()
            .checked_add_months(Months::new(1))
            .and_then(|d| d.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            ReportingMonth { year: self.year + 1, month: 1 }
        } else {
            ReportingMonth { year: self.year, month: self.month + 1 }
        }
    }

    pub fn range(self) -> DateRange {
        DateRange::new(self.first_day(), self.last_day())
    }
}

impl fmt::Display for ReportingMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Accepts `2025-07`, `07.2025`, `07/2025` and `2025/07`; a full date is
/// reduced to its month.
impl FromStr for ReportingMonth {
    type Err = InvalidMonth;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        for fmt in ["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y"] {
            if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
                return Ok(ReportingMonth::of(date));
            }
        }

        let parts: Vec<&str> = s.split(['-', '.', '/']).map(str::trim).collect();
        let (year, month) = match parts.as_slice() {
            [a, b] if a.len() == 4 => (a.parse::<i32>().ok(), b.parse::<u32>().ok()),
            [a, b] if b.len() == 4 => (b.parse::<i32>().ok(), a.parse::<u32>().ok()),
            _ => (None, None),
        };
        match (year, month) {
            (Some(y), Some(m)) => ReportingMonth::new(y, m).ok_or_else(|| InvalidMonth(s.to_string())),
            _ => Err(InvalidMonth(s.to_string())),
        }
    }
}

impl TryFrom<String> for ReportingMonth {
    type Error = InvalidMonth;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ReportingMonth> for String {
    fn from(value: ReportingMonth) -> Self {
        value.to_string()
    }
}

/// Inclusive date window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start <= end {
            DateRange { start, end }
        } else {
            DateRange { start: end, end: start }
        }
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn overlaps(self, other: DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// The month a range is reported under: the month it ends in.
    pub fn closing_month(self) -> ReportingMonth {
        ReportingMonth::of(self.end)
    }

    /// Every month touched by the range, in order.
    pub fn months(self) -> Vec<ReportingMonth> {
        let last = ReportingMonth::of(self.end);
        let mut current = ReportingMonth::of(self.start);
        let mut months = vec![current];
        while current < last {
            current = current.next();
            months.push(current);
        }
        months
    }
}

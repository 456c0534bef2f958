use chrono::{Datelike, Days, NaiveDate};
use std::fmt;
use std::iter::FusedIterator;
use thiserror::Error;

pub const MAX_RANGE_DAYS: i64 = 31;
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("'{0}' is not a valid YYYY-MM-DD date")]
    InvalidDate(String),
    #[error("start date {start} is after end date {end}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },
    #[error("range spans {days} days, the planner accepts at most {max}", max = MAX_RANGE_DAYS)]
    RangeTooLong { days: i64 },
}

/// An inclusive span of calendar days, `start <= end` and at most
/// `MAX_RANGE_DAYS` apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, RangeError> {
        if start > end {
            return Err(RangeError::InvertedRange { start, end });
        }
        let days = (end - start).num_days();
        if days > MAX_RANGE_DAYS {
            return Err(RangeError::RangeTooLong { days });
        }
        Ok(Self { start, end })
    }

    /// Parses both bounds as `YYYY-MM-DD` and validates the span. Both dates are
    /// checked for validity before ordering or length.
    pub fn parse(start: &str, end: &str) -> Result<Self, RangeError> {
        let start = parse_date(start)?;
        let end = parse_date(end)?;
        Self::new(start, end)
    }

    /// Monday to Sunday of the week after `today`. When `today` is itself a
    /// Monday the range still starts seven days later.
    pub fn default_week(today: NaiveDate) -> Self {
        let from_monday = i64::from(today.weekday().num_days_from_monday());
        let days_until_monday = match (7 - from_monday) % 7 {
            0 => 7,
            n => n,
        };
        let start = today + chrono::Duration::days(days_until_monday);
        Self {
            start,
            end: start + chrono::Duration::days(6),
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of calendar days covered, both ends included.
    pub fn day_count(&self) -> usize {
        (self.end - self.start).num_days() as usize + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Every date from `start` to `end`, one day apart. Each call starts over.
    pub fn dates(&self) -> Dates {
        Dates {
            next: Some(self.start),
            end: self.end,
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} .. {}", self.start, self.end)
    }
}

impl IntoIterator for &DateRange {
    type Item = NaiveDate;
    type IntoIter = Dates;

    fn into_iter(self) -> Self::IntoIter {
        self.dates()
    }
}

#[derive(Debug, Clone)]
pub struct Dates {
    next: Option<NaiveDate>,
    end: NaiveDate,
}

impl Iterator for Dates {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = if current < self.end {
            current.checked_add_days(Days::new(1))
        } else {
            None
        };
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .next
            .map(|d| (self.end - d).num_days() as usize + 1)
            .unwrap_or(0);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Dates {}
impl FusedIterator for Dates {}

pub fn parse_date(raw: &str) -> Result<NaiveDate, RangeError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| RangeError::InvalidDate(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_dates_cover_every_allowed_length() {
        let start = date(2024, 2, 20); // crosses the leap day
        for span in 0..=MAX_RANGE_DAYS {
            let end = start + chrono::Duration::days(span);
            let range = DateRange::new(start, end).unwrap();
            let dates: Vec<NaiveDate> = range.dates().collect();

            assert_eq!(dates.len() as i64, span + 1);
            assert_eq!(range.day_count(), dates.len());
            assert_eq!(dates.first(), Some(&start));
            assert_eq!(dates.last(), Some(&end));
            for pair in dates.windows(2) {
                assert_eq!((pair[1] - pair[0]).num_days(), 1);
            }
        }
    }

    #[test]
    fn test_dates_are_restartable() {
        let range = DateRange::parse("2024-03-30", "2024-04-02").unwrap();
        let first: Vec<_> = range.dates().collect();
        let second: Vec<_> = (&range).into_iter().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
    }

    #[test]
    fn test_single_day_range() {
        let range = DateRange::parse("2024-01-01", "2024-01-01").unwrap();
        assert_eq!(range.dates().collect::<Vec<_>>(), vec![date(2024, 1, 1)]);
    }

    #[test]
    fn test_parse_rejects_malformed_dates() {
        assert_eq!(
            DateRange::parse("2024-02-30", "2024-03-01"),
            Err(RangeError::InvalidDate("2024-02-30".to_string()))
        );
        assert!(matches!(
            DateRange::parse("2024-01-01", "next friday"),
            Err(RangeError::InvalidDate(_))
        ));
        assert!(matches!(DateRange::parse("", ""), Err(RangeError::InvalidDate(_))));
    }

    #[test]
    fn test_parse_rejects_inverted_range() {
        assert!(matches!(
            DateRange::parse("2024-01-07", "2024-01-01"),
            Err(RangeError::InvertedRange { .. })
        ));
    }

    #[test]
    fn test_thirty_one_days_is_the_limit() {
        assert!(DateRange::parse("2024-01-01", "2024-02-01").is_ok());
        assert_eq!(
            DateRange::parse("2024-01-01", "2024-02-02"),
            Err(RangeError::RangeTooLong { days: 32 })
        );
    }

    #[test]
    fn test_default_week_from_wednesday() {
        let range = DateRange::default_week(date(2024, 1, 3));
        assert_eq!(range.start(), date(2024, 1, 8));
        assert_eq!(range.end(), date(2024, 1, 14));
        assert_eq!(range.start().weekday(), chrono::Weekday::Mon);
        assert_eq!(range.dates().count(), 7);
    }

    #[test]
    fn test_default_week_from_monday_skips_a_full_week() {
        let range = DateRange::default_week(date(2024, 1, 8));
        assert_eq!(range.start(), date(2024, 1, 15));
    }

    #[test]
    fn test_default_week_from_sunday() {
        let range = DateRange::default_week(date(2024, 1, 14));
        assert_eq!(range.start(), date(2024, 1, 15));
        assert_eq!(range.end(), date(2024, 1, 21));
    }

    #[test]
    fn test_contains() {
        let range = DateRange::parse("2024-01-01", "2024-01-07").unwrap();
        assert!(range.contains(date(2024, 1, 7)));
        assert!(!range.contains(date(2024, 1, 8)));
    }
}

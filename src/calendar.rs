use std::fmt;

use once_cell::sync::Lazy;
use time::format_description::{self, FormatItem};
use time::{Date, Duration, Month, Weekday};

static DATE_FORMAT: Lazy<Vec<FormatItem<'static>>> = Lazy::new(|| {
    format_description::parse("[year]-[month]-[day]").expect("valid date format description")
});

/// Formats a date as its `YYYY-MM-DD` bucket key.
pub fn date_key(date: Date) -> String {
    date.format(&*DATE_FORMAT)
        .unwrap_or_else(|_| format!("{}-{:02}-{:02}", date.year(), date.month() as u8, date.day()))
}

pub fn parse_date_key(raw: &str) -> Option<Date> {
    Date::parse(raw.trim(), &*DATE_FORMAT).ok()
}

/// A whole calendar month. Ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct YearMonth {
    year: i32,
    month: u8,
}

impl YearMonth {
    pub fn new(year: i32, month: Month) -> Self {
        Self {
            year,
            month: month as u8,
        }
    }

    pub fn of(date: Date) -> Self {
        Self::new(date.year(), date.month())
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let (year, month) = raw.trim().split_once('-')?;
        let year: i32 = year.parse().ok()?;
        let month: u8 = month.parse().ok()?;
        let month = Month::try_from(month).ok()?;
        Some(Self::new(year, month))
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> Month {
        Month::try_from(self.month).unwrap_or(Month::January)
    }

    pub fn key(&self) -> String {
        format!("{}-{:02}", self.year, self.month)
    }

    pub fn first_day(&self) -> Date {
        Date::from_calendar_date(self.year, self.month(), 1).unwrap_or(Date::MIN)
    }

    pub fn last_day(&self) -> Date {
        let days = time::util::days_in_year_month(self.year, self.month());
        Date::from_calendar_date(self.year, self.month(), days).unwrap_or(Date::MAX)
    }

    pub fn contains(&self, date: Date) -> bool {
        Self::of(date) == *self
    }

    pub fn add_months(&self, delta: i32) -> Self {
        let index = self.year * 12 + (self.month as i32 - 1) + delta;
        let year = index.div_euclid(12);
        let month = (index.rem_euclid(12) + 1) as u8;
        Self { year, month }
    }

    pub fn next(&self) -> Self {
        self.add_months(1)
    }

    pub fn previous(&self) -> Self {
        self.add_months(-1)
    }

    /// Number of whole months from `self` to `other` (negative when `other` is earlier).
    pub fn months_until(&self, other: YearMonth) -> i32 {
        (other.year * 12 + other.month as i32) - (self.year * 12 + self.month as i32)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

pub fn week_start(date: Date) -> Date {
    let back = date.weekday().number_days_from_sunday() as i64;
    date.checked_sub(Duration::days(back)).unwrap_or(date)
}

pub fn week_end(date: Date) -> Date {
    let forward = 6 - date.weekday().number_days_from_sunday() as i64;
    date.checked_add(Duration::days(forward)).unwrap_or(date)
}

pub fn is_weekend(date: Date) -> bool {
    matches!(date.weekday(), Weekday::Saturday | Weekday::Sunday)
}

/// One Sunday-first week. A week belongs to the month of its Saturday and is
/// numbered by its ordinal inside that month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Week {
    pub start: Date,
    pub owner: YearMonth,
    pub row: usize,
}

impl Week {
    pub fn containing(date: Date) -> Self {
        let start = week_start(date);
        let saturday = week_end(date);
        Self {
            start,
            owner: YearMonth::of(saturday),
            row: (saturday.day() as usize - 1) / 7,
        }
    }

    pub fn end(&self) -> Date {
        week_end(self.start)
    }

    pub fn days(&self) -> impl Iterator<Item = Date> {
        let start = self.start;
        (0..7).filter_map(move |offset| start.checked_add(Duration::days(offset)))
    }

    pub fn contains(&self, date: Date) -> bool {
        date >= self.start && date <= self.end()
    }

    pub fn label(&self) -> String {
        let end = self.end();
        format!(
            "{}/{}-{}/{}",
            self.start.month() as u8,
            self.start.day(),
            end.month() as u8,
            end.day()
        )
    }
}

/// Every week that touches `[start, end)` in whole months, in order.
pub fn weeks_between(start: YearMonth, end: YearMonth) -> Vec<Week> {
    let mut weeks = Vec::new();
    if end <= start {
        return weeks;
    }
    let first = start.first_day();
    let last = end.previous().last_day();
    let mut cursor = week_start(first);
    while cursor <= last {
        weeks.push(Week::containing(cursor));
        match cursor.checked_add(Duration::days(7)) {
            Some(next) => cursor = next,
            None => break,
        }
    }
    weeks
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn date_keys_round_trip_through_parse() {
        let day = date!(2025 - 06 - 10);
        assert_eq!(date_key(day), "2025-06-10");
        assert_eq!(parse_date_key("2025-06-10"), Some(day));
        assert_eq!(parse_date_key("2025-13-01"), None);
        assert_eq!(parse_date_key("junk"), None);
    }

    #[test]
    fn month_arithmetic_wraps_years() {
        let dec = YearMonth::new(2024, Month::December);
        assert_eq!(dec.next(), YearMonth::new(2025, Month::January));
        assert_eq!(dec.next().previous(), dec);
        assert_eq!(dec.add_months(-12), YearMonth::new(2023, Month::December));
        assert_eq!(dec.months_until(YearMonth::new(2025, Month::March)), 3);
        assert_eq!(YearMonth::parse("2025-07"), Some(YearMonth::new(2025, Month::July)));
        assert_eq!(YearMonth::parse("2025-7x"), None);
    }

    #[test]
    fn weeks_belong_to_the_month_of_their_saturday() {
        // 2025-06-01 is a Sunday, so June starts on a fresh row 0.
        let june_first = Week::containing(date!(2025 - 06 - 01));
        assert_eq!(june_first.owner, YearMonth::new(2025, Month::June));
        assert_eq!(june_first.row, 0);

        // 2025-06-30 is a Monday; its Saturday is July 5th.
        let straddling = Week::containing(date!(2025 - 06 - 30));
        assert_eq!(straddling.owner, YearMonth::new(2025, Month::July));
        assert_eq!(straddling.row, 0);
        assert_eq!(straddling.label(), "6/29-7/5");
    }

    #[test]
    fn weeks_between_covers_every_day_of_the_range() {
        let june = YearMonth::new(2025, Month::June);
        let weeks = weeks_between(june, june.next());
        assert_eq!(weeks.first().map(|w| w.start), Some(date!(2025 - 06 - 01)));
        assert!(weeks.last().map(|w| w.contains(date!(2025 - 06 - 30))).unwrap_or(false));
        assert_eq!(weeks.len(), 5);
        assert!(weeks_between(june, june).is_empty());
    }
}

//! Year-less recurring dates
//!
//! Episode status dates recur annually and are exchanged as "DD-Mon"
//! (for example `05-Mar`). The year is never exchanged or trusted; it is
//! inferred from a sliding window around today:
//!
//! ```text
//! [today - 3 months, today + 9 months)
//! ```
//!
//! Locally the date is persisted as an absolute `NaiveDate`.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, Local, Months, NaiveDate};
use thiserror::Error;

/// How far into the past a resolved date may fall
pub const WINDOW_MONTHS_BEFORE: u32 = 3;

/// How far into the future a resolved date may fall (exclusive)
pub const WINDOW_MONTHS_AFTER: u32 = 9;

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Errors parsing a "DD-Mon" string
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PartialDateError {
    #[error("Invalid partial date '{0}': expected DD-Mon")]
    Format(String),

    #[error("Invalid day in partial date '{0}'")]
    Day(String),

    #[error("Unknown month in partial date '{0}'")]
    Month(String),
}

/// A day and month with no year
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartialDate {
    month: u32,
    day: u32,
}

impl PartialDate {
    /// Create a partial date, validating the day against the month.
    ///
    /// 29-Feb is accepted; in non-leap years it resolves to 28-Feb.
    pub fn new(day: u32, month: u32) -> Option<Self> {
        if !(1..=12).contains(&month) || day == 0 || day > max_day(month) {
            return None;
        }
        Some(Self { month, day })
    }

    /// The partial date of an absolute date
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            month: date.month(),
            day: date.day(),
        }
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Place this day and month in a specific year, clamping to the end of
    /// the month when the day does not exist in that year.
    pub fn in_year(&self, year: i32) -> NaiveDate {
        (1..=self.day)
            .rev()
            .find_map(|day| NaiveDate::from_ymd_opt(year, self.month, day))
            .unwrap_or(NaiveDate::MIN)
    }

    /// Resolve to the absolute date inside the sliding window around `today`
    pub fn resolve(&self, today: NaiveDate) -> NaiveDate {
        let (earliest, latest) = window(today);
        let candidate = self.in_year(today.year());

        if candidate < today {
            if candidate >= earliest {
                candidate
            } else {
                self.in_year(today.year() + 1)
            }
        } else if candidate < latest {
            candidate
        } else {
            self.in_year(today.year() - 1)
        }
    }
}

impl fmt::Display for PartialDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}-{}",
            self.day,
            MONTH_ABBREVIATIONS[(self.month - 1) as usize]
        )
    }
}

impl FromStr for PartialDate {
    type Err = PartialDateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (day, month) = trimmed
            .split_once('-')
            .ok_or_else(|| PartialDateError::Format(s.to_string()))?;

        let day: u32 = day
            .parse()
            .map_err(|_| PartialDateError::Day(s.to_string()))?;

        let month = MONTH_ABBREVIATIONS
            .iter()
            .position(|abbr| abbr.eq_ignore_ascii_case(month))
            .map(|index| index as u32 + 1)
            .ok_or_else(|| PartialDateError::Month(s.to_string()))?;

        Self::new(day, month).ok_or_else(|| PartialDateError::Day(s.to_string()))
    }
}

/// The sliding window `[earliest, latest)` for `today`.
///
/// `latest` is the anniversary of `earliest` rather than `today + 9 months`
/// so the window always spans exactly one year, even when month arithmetic
/// clamps at the end of February.
pub fn window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let earliest = today - Months::new(WINDOW_MONTHS_BEFORE);
    (earliest, anniversary(earliest))
}

fn anniversary(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year() + 1, date.month(), date.day())
        .or_else(|| NaiveDate::from_ymd_opt(date.year() + 1, 3, 1))
        .unwrap_or(date + Months::new(WINDOW_MONTHS_BEFORE + WINDOW_MONTHS_AFTER))
}

/// The status warning range `[today, today + days)`
pub fn warning_window(today: NaiveDate, days: u32) -> (NaiveDate, NaiveDate) {
    (today, today + Days::new(u64::from(days)))
}

/// Convert a "DD-Mon" string to an absolute date relative to `today`
pub fn to_absolute(partial: &str, today: NaiveDate) -> Result<NaiveDate, PartialDateError> {
    Ok(partial.parse::<PartialDate>()?.resolve(today))
}

/// Format an absolute date as "DD-Mon"
pub fn to_partial(date: NaiveDate) -> String {
    PartialDate::from_date(date).to_string()
}

/// Re-resolve a persisted date against `today`
pub fn reresolve(date: NaiveDate, today: NaiveDate) -> NaiveDate {
    PartialDate::from_date(date).resolve(today)
}

/// Today's date in local time
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn max_day(month: u32) -> u32 {
    match month {
        2 => 29,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// Serde codec for `Option<NaiveDate>` fields exchanged as "DD-Mon".
///
/// `None` is written as an empty string. On input the year is inferred
/// from today's sliding window.
pub mod partial_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(date) => serializer.serialize_str(&super::to_partial(*date)),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        if raw.trim().is_empty() {
            return Ok(None);
        }
        super::to_absolute(&raw, super::today())
            .map(Some)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn all_partials() -> Vec<PartialDate> {
        (1..=12)
            .flat_map(|month| (1..=max_day(month)).filter_map(move |day| PartialDate::new(day, month)))
            .collect()
    }

    #[test]
    fn test_parse_and_display() {
        let partial: PartialDate = "05-Mar".parse().unwrap();
        assert_eq!(partial.day(), 5);
        assert_eq!(partial.month(), 3);
        assert_eq!(partial.to_string(), "05-Mar");

        let lower: PartialDate = "5-mar".parse().unwrap();
        assert_eq!(lower, partial);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            "March 5".parse::<PartialDate>(),
            Err(PartialDateError::Format(_))
        ));
        assert!(matches!(
            "xx-Mar".parse::<PartialDate>(),
            Err(PartialDateError::Day(_))
        ));
        assert!(matches!(
            "31-Apr".parse::<PartialDate>(),
            Err(PartialDateError::Day(_))
        ));
        assert!(matches!(
            "01-Foo".parse::<PartialDate>(),
            Err(PartialDateError::Month(_))
        ));
    }

    #[test]
    fn test_resolve_keeps_recent_past() {
        let today = date(2024, 6, 15);
        assert_eq!(to_absolute("01-Apr", today).unwrap(), date(2024, 4, 1));
        assert_eq!(to_absolute("20-Mar", today).unwrap(), date(2024, 3, 20));
    }

    #[test]
    fn test_resolve_rolls_distant_past_forward() {
        let today = date(2024, 6, 15);
        assert_eq!(to_absolute("01-Jan", today).unwrap(), date(2025, 1, 1));
        assert_eq!(to_absolute("01-Mar", today).unwrap(), date(2025, 3, 1));
    }

    #[test]
    fn test_resolve_rolls_distant_future_back() {
        let today = date(2024, 2, 10);
        assert_eq!(to_absolute("25-Dec", today).unwrap(), date(2023, 12, 25));
        assert_eq!(to_absolute("01-Nov", today).unwrap(), date(2024, 11, 1));
    }

    #[test]
    fn test_resolve_today_is_today() {
        let today = date(2024, 8, 31);
        assert_eq!(to_absolute("31-Aug", today).unwrap(), today);
    }

    #[test]
    fn test_leap_day_clamps_in_common_year() {
        let today = date(2023, 2, 1);
        assert_eq!(to_absolute("29-Feb", today).unwrap(), date(2023, 2, 28));

        // Rolling into a leap year picks up the real 29th
        let today = date(2023, 7, 1);
        assert_eq!(to_absolute("29-Feb", today).unwrap(), date(2024, 2, 29));
    }

    #[test]
    fn test_resolved_date_always_inside_window() {
        let partials = all_partials();
        let mut today = date(2023, 1, 1);
        while today < date(2025, 1, 1) {
            let (earliest, latest) = window(today);
            for partial in &partials {
                let resolved = partial.resolve(today);
                assert!(
                    resolved >= earliest && resolved < latest,
                    "{} resolved to {} outside [{}, {}) for today {}",
                    partial,
                    resolved,
                    earliest,
                    latest,
                    today
                );
            }
            today = today.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_round_trip_inside_window() {
        let mut today = date(2023, 1, 1);
        while today < date(2025, 1, 1) {
            let (earliest, latest) = window(today);
            let mut day = earliest;
            while day < latest {
                assert_eq!(to_absolute(&to_partial(day), today).unwrap(), day);
                day = day.succ_opt().unwrap();
            }
            today = today + Days::new(7);
        }
    }

    #[test]
    fn test_partial_round_trip_keeps_text() {
        let today = date(2024, 5, 20);
        for partial in all_partials() {
            let text = partial.to_string();
            let resolved = to_absolute(&text, today).unwrap();
            if resolved.day() == partial.day() {
                assert_eq!(to_partial(resolved), text);
            }
        }
    }

    #[test]
    fn test_warning_window() {
        let (from, until) = warning_window(date(2024, 12, 28), 7);
        assert_eq!(from, date(2024, 12, 28));
        assert_eq!(until, date(2025, 1, 4));
    }

    #[test]
    fn test_serde_codec() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct Holder {
            #[serde(with = "partial_date", default)]
            when: Option<NaiveDate>,
        }

        let json = serde_json::to_string(&Holder {
            when: Some(date(2024, 3, 5)),
        })
        .unwrap();
        assert_eq!(json, r#"{"when":"05-Mar"}"#);

        let empty: Holder = serde_json::from_str(r#"{"when":""}"#).unwrap();
        assert!(empty.when.is_none());

        let parsed: Holder = serde_json::from_str(r#"{"when":"05-Mar"}"#).unwrap();
        let resolved = parsed.when.unwrap();
        assert_eq!((resolved.day(), resolved.month()), (5, 3));
    }
}

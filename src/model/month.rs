//! Calendar month keys and their canonical `YYYY-MonthName` labels.
//!
//! Every conversion between a label, a `(year, month)` pair and a 0-based
//! slot index goes through this module.

use std::fmt;
use std::str::FromStr;

use chrono::Datelike;

use crate::error::{Result, StatusError};

/// English month names as used in mailing-list archive file names.
const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// A calendar month, ordered by `(year, month)`.
///
/// # Examples
/// - `MonthKey::new(2023, 11)` → label `"2023-November"`
/// - `MonthKey::parse("2022-January")` → `(2022, 1)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    /// Create a key, rejecting months outside `1..=12`.
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(StatusError::InvalidMonth(format!("{year}-{month}")));
        }
        Ok(Self { year, month })
    }

    /// Parse a canonical label such as `"2023-November"`.
    pub fn parse(label: &str) -> Result<Self> {
        let invalid = || StatusError::InvalidMonth(label.to_string());
        let (year, name) = label.trim().split_once('-').ok_or_else(invalid)?;
        if year.is_empty() || !year.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let index = MONTH_NAMES
            .iter()
            .position(|m| *m == name)
            .ok_or_else(invalid)?;
        Self::new(year, index as u32 + 1)
    }

    /// The month containing today's local date.
    pub fn current() -> Self {
        let today = chrono::Local::now().date_naive();
        Self {
            year: today.year(),
            month: today.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// Month number, `1..=12`.
    pub fn month(&self) -> u32 {
        self.month
    }

    /// Slot index into a 12-element year array (`month - 1`).
    pub fn index(&self) -> usize {
        (self.month - 1) as usize
    }

    /// Canonical label, e.g. `"2023-November"`.
    pub fn label(&self) -> String {
        format!("{}-{}", self.year, MONTH_NAMES[self.index()])
    }

    /// The following calendar month.
    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Every month from `first` through `last`, inclusive. Empty when
    /// `first > last`.
    pub fn range(first: MonthKey, last: MonthKey) -> Vec<MonthKey> {
        let mut months = Vec::new();
        let mut key = first;
        while key <= last {
            months.push(key);
            key = key.next();
        }
        months
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.year, MONTH_NAMES[self.index()])
    }
}

impl FromStr for MonthKey {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl serde::Serialize for MonthKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label())
    }
}

impl<'de> serde::Deserialize<'de> for MonthKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Self::parse(&label).map_err(serde::de::Error::custom)
    }
}

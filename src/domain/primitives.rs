//! Domain primitives: identifiers, tier numbers and calendar months.

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn new(id: i64) -> Self {
                $name(id)
            }

            pub fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{} {}", $label, self.0)
            }
        }
    };
}

id_newtype!(
    /// Supplier that fulfils allocated volume under a tiered contract.
    ProviderId,
    "provider"
);
id_newtype!(
    /// Sellable product whose demand is split across providers.
    ProductId,
    "product"
);
id_newtype!(
    /// Priced component consumed once per product unit.
    ItemId,
    "item"
);

/// Tier bracket number. Tier numbers start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TierNumber(pub u32);

impl TierNumber {
    pub fn new(n: u32) -> Self {
        TierNumber(n)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TierNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("month must be in 1..=12, got {0}")]
pub struct InvalidMonth(pub u32);

/// A calendar month. Ordering is `(year, month)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawTimePoint")]
pub struct TimePoint {
    year: i32,
    month: u32,
}

#[derive(Deserialize)]
struct RawTimePoint {
    year: i32,
    month: u32,
}

impl TryFrom<RawTimePoint> for TimePoint {
    type Error = InvalidMonth;

    fn try_from(raw: RawTimePoint) -> Result<Self, Self::Error> {
        TimePoint::new(raw.year, raw.month)
    }
}

impl TimePoint {
    pub fn new(year: i32, month: u32) -> Result<Self, InvalidMonth> {
        if !(1..=12).contains(&month) {
            return Err(InvalidMonth(month));
        }
        Ok(TimePoint { year, month })
    }

    /// Month containing the given date.
    pub fn from_date(date: chrono::NaiveDate) -> Self {
        TimePoint {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The following calendar month, or `None` past the last representable year.
    pub fn next(&self) -> Option<Self> {
        if self.month == 12 {
            Some(TimePoint {
                year: self.year.checked_add(1)?,
                month: 1,
            })
        } else {
            Some(TimePoint {
                year: self.year,
                month: self.month + 1,
            })
        }
    }

    /// Up to `count` consecutive months starting at `self`. Stops early at
    /// the last representable month.
    pub fn range(&self, count: usize) -> Vec<TimePoint> {
        std::iter::successors(Some(*self), TimePoint::next)
            .take(count)
            .collect()
    }
}

impl fmt::Display for TimePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

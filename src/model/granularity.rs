//! Temporal granularities.
//!
//! A granularity either truncates a temporal value (`year`, `month`, ...) or
//! extracts a numeric part of it (`month_num`, `hour_of_day`, ...). The set is
//! closed: dialects match on it exhaustively, and parsing an unknown tag is an
//! error rather than a silent default.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::dimension::DimensionType;
use crate::semantic::error::SemanticError;

/// Temporal truncation/extraction unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Time,
    Date,
    Year,
    Quarter,
    QuarterOfYear,
    Month,
    MonthNum,
    Week,
    WeekNum,
    DayOfMonth,
    Hour,
    HourOfDay,
    Minute,
}

impl Granularity {
    /// Every granularity, in declaration order.
    pub const ALL: [Granularity; 13] = [
        Granularity::Time,
        Granularity::Date,
        Granularity::Year,
        Granularity::Quarter,
        Granularity::QuarterOfYear,
        Granularity::Month,
        Granularity::MonthNum,
        Granularity::Week,
        Granularity::WeekNum,
        Granularity::DayOfMonth,
        Granularity::Hour,
        Granularity::HourOfDay,
        Granularity::Minute,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Time => "time",
            Granularity::Date => "date",
            Granularity::Year => "year",
            Granularity::Quarter => "quarter",
            Granularity::QuarterOfYear => "quarter_of_year",
            Granularity::Month => "month",
            Granularity::MonthNum => "month_num",
            Granularity::Week => "week",
            Granularity::WeekNum => "week_num",
            Granularity::DayOfMonth => "day_of_month",
            Granularity::Hour => "hour",
            Granularity::HourOfDay => "hour_of_day",
            Granularity::Minute => "minute",
        }
    }

    /// Whether this granularity can be derived from a dimension of `ty`.
    ///
    /// Dates carry no time-of-day parts and times carry no calendar parts.
    pub fn applies_to(&self, ty: DimensionType) -> bool {
        match ty {
            DimensionType::Datetime => true,
            DimensionType::Date => matches!(
                self,
                Granularity::Date
                    | Granularity::Year
                    | Granularity::Quarter
                    | Granularity::QuarterOfYear
                    | Granularity::Month
                    | Granularity::MonthNum
                    | Granularity::Week
                    | Granularity::WeekNum
                    | Granularity::DayOfMonth
            ),
            DimensionType::Time => matches!(
                self,
                Granularity::Time | Granularity::Hour | Granularity::HourOfDay | Granularity::Minute
            ),
            DimensionType::String | DimensionType::Number | DimensionType::Boolean => false,
        }
    }

    /// The type of the derived dimension.
    pub fn result_type(&self) -> DimensionType {
        match self {
            Granularity::Time => DimensionType::Time,
            Granularity::Date => DimensionType::Date,
            Granularity::Year
            | Granularity::Quarter
            | Granularity::Month
            | Granularity::Week
            | Granularity::Hour
            | Granularity::Minute => DimensionType::Datetime,
            Granularity::QuarterOfYear
            | Granularity::MonthNum
            | Granularity::WeekNum
            | Granularity::DayOfMonth
            | Granularity::HourOfDay => DimensionType::Number,
        }
    }
}

impl FromStr for Granularity {
    type Err = SemanticError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Granularity::ALL
            .iter()
            .copied()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| SemanticError::UnknownGranularity(s.to_string()))
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

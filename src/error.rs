//! Typed errors for row parsing and factor computation.
//!
//! Parse errors never abort a run: the loader drops the offending row or cell
//! and tallies it in [`crate::stats::LoadStats`]. [`DisaggError`] signals a
//! caller asking for something the period hierarchy cannot answer.

use thiserror::Error;

use crate::analyzers::types::Granularity;

/// Why a single input row or cell was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unparseable timestamp '{0}'")]
    Timestamp(String),

    #[error("unparseable measure '{0}'")]
    Measure(String),

    #[error("unparseable period label '{0}'")]
    PeriodLabel(String),

    #[error("row has {found} fields, expected at least {expected}")]
    ShortRow { found: usize, expected: usize },
}

impl ParseError {
    /// Short stable name used as the tally key in load statistics.
    pub fn kind(&self) -> &'static str {
        match self {
            ParseError::Timestamp(_) => "timestamp",
            ParseError::Measure(_) => "measure",
            ParseError::PeriodLabel(_) => "period_label",
            ParseError::ShortRow { .. } => "short_row",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisaggError {
    #[error("{parent} periods do not contain {fine} periods")]
    InvalidNesting {
        fine: Granularity,
        parent: Granularity,
    },

    #[error("invalid calendar month {year}-{month:02}")]
    InvalidMonth { year: i32, month: u32 },

    #[error("cannot take {axis} position from a {granularity} period")]
    AxisMismatch {
        axis: &'static str,
        granularity: Granularity,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_kinds_are_distinct() {
        let kinds = [
            ParseError::Timestamp("x".into()).kind(),
            ParseError::Measure("x".into()).kind(),
            ParseError::PeriodLabel("x".into()).kind(),
            ParseError::ShortRow {
                found: 1,
                expected: 3,
            }
            .kind(),
        ];
        let mut deduped = kinds.to_vec();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), kinds.len());
    }

    #[test]
    fn test_invalid_nesting_message() {
        let err = DisaggError::InvalidNesting {
            fine: Granularity::Week,
            parent: Granularity::Month,
        };
        assert_eq!(err.to_string(), "month periods do not contain week periods");
    }
}

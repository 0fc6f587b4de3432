//! Field parsers for timestamps, measures and "Month Year" period labels.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// Conventions for day/month order, decimal marks and month names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateLocale {
    /// Day-first dates, comma decimals, Portuguese month names.
    #[default]
    #[serde(rename = "pt-BR", alias = "pt_BR", alias = "pt")]
    PtBr,
    /// ISO / month-first dates, point decimals, English month names.
    #[serde(rename = "en", alias = "en-US")]
    En,
}

impl fmt::Display for DateLocale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateLocale::PtBr => f.write_str("pt-BR"),
            DateLocale::En => f.write_str("en"),
        }
    }
}

impl FromStr for DateLocale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "pt-br" | "pt" => Ok(DateLocale::PtBr),
            "en" | "en-us" => Ok(DateLocale::En),
            other => Err(format!("unsupported date locale '{other}'; use pt-BR or en")),
        }
    }
}

const ISO_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const PT_DATETIME_FORMATS: &[&str] = &["%d/%m/%Y %H:%M:%S", "%d/%m/%Y %H:%M"];
const EN_DATETIME_FORMATS: &[&str] = &["%m/%d/%Y %H:%M:%S", "%m/%d/%Y %H:%M"];

/// Parses a timestamp in ISO form or in the locale's slash form. A bare
/// date means midnight.
pub fn parse_timestamp(raw: &str, locale: DateLocale) -> Result<NaiveDateTime, ParseError> {
    let s = raw.trim();
    let local_formats = match locale {
        DateLocale::PtBr => PT_DATETIME_FORMATS,
        DateLocale::En => EN_DATETIME_FORMATS,
    };
    for fmt in ISO_DATETIME_FORMATS.iter().chain(local_formats) {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(ts);
        }
    }

    let date_format = match locale {
        DateLocale::PtBr => "%d/%m/%Y",
        DateLocale::En => "%m/%d/%Y",
    };
    ["%Y-%m-%d", date_format]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .map(|date| date.and_time(NaiveTime::MIN))
        .ok_or_else(|| ParseError::Timestamp(raw.to_string()))
}

/// Parses a finite number.
///
/// Under `pt-BR` a comma is the decimal mark and points group thousands
/// (`1.234,5`); a value with no comma is read as-is.
pub fn parse_measure(raw: &str, locale: DateLocale) -> Result<f64, ParseError> {
    let s = raw.trim();
    let normalized = match locale {
        DateLocale::PtBr if s.contains(',') => s.replace('.', "").replace(',', "."),
        DateLocale::En => s.replace(',', ""),
        _ => s.to_string(),
    };
    normalized
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ParseError::Measure(raw.to_string()))
}

const PT_MONTHS: [&str; 12] = [
    "janeiro",
    "fevereiro",
    "março",
    "abril",
    "maio",
    "junho",
    "julho",
    "agosto",
    "setembro",
    "outubro",
    "novembro",
    "dezembro",
];

const EN_MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Month number (1–12) for a month name in the given locale.
pub fn month_number(name: &str, locale: DateLocale) -> Option<u32> {
    let name = name.trim().to_lowercase();
    let names = match locale {
        DateLocale::PtBr => &PT_MONTHS,
        DateLocale::En => &EN_MONTHS,
    };
    let found = names.iter().position(|m| *m == name).or_else(|| {
        // "marco" is a common ASCII rendering of "março"
        (locale == DateLocale::PtBr && name == "marco").then_some(2)
    })?;
    u32::try_from(found + 1).ok()
}

/// Parses a `"<month name> <year>"` column label into `(year, month)`.
pub fn parse_month_label(label: &str, locale: DateLocale) -> Result<(i32, u32), ParseError> {
    let err = || ParseError::PeriodLabel(label.to_string());
    let mut parts = label.split_whitespace();
    let (Some(month), Some(year), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(err());
    };
    let month = month_number(month, locale).ok_or_else(err)?;
    let year = year.parse::<i32>().map_err(|_| err())?;
    Ok((year, month))
}

/// Picks the most frequent of `;`, `,`, tab and `|` in a header line.
/// Falls back to `,`.
pub fn sniff_delimiter(header_line: &str) -> u8 {
    [b';', b',', b'\t', b'|']
        .into_iter()
        .map(|d| (d, header_line.bytes().filter(|b| *b == d).count()))
        .filter(|(_, count)| *count > 0)
        .max_by_key(|(_, count)| *count)
        .map(|(d, _)| d)
        .unwrap_or(b',')
}

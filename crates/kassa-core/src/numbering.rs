//! # Document Numbering
//!
//! Human-readable sequential numbers for orders and returns, e.g.
//! `ORD-000123`. The counter itself lives in storage and is advanced inside
//! the commit transaction; this module only knows the format.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Minimum width of the zero-padded numeric part.
pub const NUMBER_WIDTH: usize = 6;

/// A numbered document series with its own counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSeries {
    Order,
    Return,
}

impl DocumentSeries {
    /// Key of the series row in `document_sequences`.
    pub const fn key(self) -> &'static str {
        match self {
            DocumentSeries::Order => "order",
            DocumentSeries::Return => "return",
        }
    }

    /// Constant tag in front of every number of this series.
    pub const fn prefix(self) -> &'static str {
        match self {
            DocumentSeries::Order => "ORD",
            DocumentSeries::Return => "RET",
        }
    }

    /// Formats the `value`-th number of this series.
    ///
    /// ```rust
    /// use kassa_core::numbering::DocumentSeries;
    ///
    /// assert_eq!(DocumentSeries::Order.format(123), "ORD-000123");
    /// assert_eq!(DocumentSeries::Return.format(1), "RET-000001");
    /// ```
    pub fn format(self, value: i64) -> String {
        format!("{}-{:0width$}", self.prefix(), value, width = NUMBER_WIDTH)
    }
}

/// Extracts the numeric suffix of a document number.
///
/// Tolerates any prefix: the suffix is the trailing run of ASCII digits.
/// Returns `None` when the number has no trailing digits.
///
/// ```rust
/// use kassa_core::numbering::parse_document_number;
///
/// assert_eq!(parse_document_number("ORD-000123"), Some(123));
/// assert_eq!(parse_document_number("ORD-"), None);
/// ```
pub fn parse_document_number(number: &str) -> Option<i64> {
    let digits: String = number
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Next counter value after the most recent document number.
///
/// Starts at 1 when there is no previous document (or it has no numeric
/// suffix).
pub fn next_after(last_number: Option<&str>) -> i64 {
    last_number
        .and_then(parse_document_number)
        .map(|n| n + 1)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_grows_past_width() {
        assert_eq!(DocumentSeries::Order.format(1_234_567), "ORD-1234567");
    }

    #[test]
    fn test_parse_legacy_numbers() {
        assert_eq!(parse_document_number("000042"), Some(42));
        assert_eq!(parse_document_number("INV2024-0007"), Some(7));
        assert_eq!(parse_document_number(""), None);
    }

    #[test]
    fn test_next_after() {
        assert_eq!(next_after(None), 1);
        assert_eq!(next_after(Some("ORD-000009")), 10);
        assert_eq!(next_after(Some("garbage")), 1);
    }
}

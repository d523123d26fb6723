//! Strict parser for ASCII grid dumps.
//!
//! The upstream feed answers with a dense list of scalars, one per grid index,
//! optionally wrapped across lines, preceded by `#` comment lines and sometimes
//! prefixed by a stray `(nx, ny)` dimension pair. The parser returns exactly
//! `expected_count` values or fails.

use crate::grid::error::ParseError;
use crate::types::snapshot::{GridSnapshot, SentinelBand};
use log::debug;

/// How many leading tokens are scanned for a dimension header.
const HEADER_SCAN_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridResponseParser {
    expected_count: usize,
    band: SentinelBand,
}

impl GridResponseParser {
    pub fn new(expected_count: usize, band: SentinelBand) -> Self {
        Self {
            expected_count,
            band,
        }
    }

    pub fn expected_count(&self) -> usize {
        self.expected_count
    }

    pub fn band(&self) -> &SentinelBand {
        &self.band
    }

    /// Parses one wire response into a snapshot of exactly `expected_count` values.
    ///
    /// # Examples
    ///
    /// ```
    /// use fusion_weather::{GridResponseParser, SentinelBand};
    ///
    /// let parser = GridResponseParser::new(6, SentinelBand::default());
    /// let snapshot = parser.parse("# grid\n2 3\n1.0, 2.0, 3.0\n4.0 5.0 -999\n").unwrap();
    /// assert_eq!(snapshot.len(), 6);
    /// assert_eq!(snapshot.values()[5], None);
    /// ```
    pub fn parse(&self, raw_text: &str) -> Result<GridSnapshot, ParseError> {
        if self.expected_count == 0 {
            return Err(ParseError::ZeroExpectedCount);
        }
        if raw_text.trim().is_empty() {
            return Err(ParseError::EmptyBody);
        }

        let mut tokens = numeric_tokens(raw_text);
        if tokens.is_empty() {
            return Err(ParseError::NoNumericTokens);
        }

        let parsed = tokens.len();
        let mut header = None;
        if parsed > self.expected_count {
            if let Some((at, pair)) = find_dimension_header(&tokens, self.expected_count) {
                debug!(
                    "Stripping dimension header {:?} at token {} (expected {} values)",
                    pair, at, self.expected_count
                );
                tokens.drain(at..at + 2);
                header = Some(pair);
            }
        }

        if tokens.len() != self.expected_count {
            return Err(ParseError::CountMismatch {
                expected: self.expected_count,
                parsed,
                after_strip: tokens.len(),
                header,
            });
        }

        Ok(GridSnapshot::from_raw(tokens, &self.band))
    }
}

/// Convenience wrapper around [`GridResponseParser::parse`].
pub fn parse(
    raw_text: &str,
    expected_count: usize,
    band: &SentinelBand,
) -> Result<GridSnapshot, ParseError> {
    GridResponseParser::new(expected_count, *band).parse(raw_text)
}

/// Every numeric token of every non-comment line, in order.
/// Tokens are separated by commas or whitespace; anything that is not a number is skipped.
fn numeric_tokens(raw_text: &str) -> Vec<f64> {
    raw_text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(|line| line.split(|c: char| c == ',' || c.is_whitespace()))
        .filter(|token| !token.is_empty())
        .filter_map(|token| token.parse::<f64>().ok())
        .collect()
}

/// Finds an adjacent pair of positive integers within the first tokens whose
/// product equals `expected`. Returns the index of the first element and the pair.
fn find_dimension_header(tokens: &[f64], expected: usize) -> Option<(usize, (u64, u64))> {
    let limit = HEADER_SCAN_LIMIT.min(tokens.len().saturating_sub(1));
    (0..limit).find_map(|i| {
        let a = as_positive_integer(tokens[i])?;
        let b = as_positive_integer(tokens[i + 1])?;
        (a.checked_mul(b)? == expected as u64).then_some((i, (a, b)))
    })
}

fn as_positive_integer(value: f64) -> Option<u64> {
    (value.is_finite() && value >= 1.0 && value.fract() == 0.0 && value <= u64::MAX as f64)
        .then_some(value as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser(expected: usize) -> GridResponseParser {
        GridResponseParser::new(expected, SentinelBand::default())
    }

    #[test]
    fn test_strips_dimension_header() -> Result<(), ParseError> {
        let snapshot = parser(6).parse("2 3 1.0 2.0 3.0 4.0 5.0 6.0")?;
        assert_eq!(
            snapshot.values(),
            &[Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0), Some(6.0)]
        );
        Ok(())
    }

    #[test]
    fn test_insufficient_values_fail() {
        let result = parser(6).parse("1.0 2.0 3.0 4.0 5.0");
        match result {
            Err(ParseError::CountMismatch {
                expected, parsed, ..
            }) => {
                assert_eq!(expected, 6);
                assert_eq!(parsed, 5);
            }
            other => panic!("Expected count mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_surplus_without_header_fails() {
        // 7 tokens, no adjacent integer pair multiplies to 6
        let result = parser(6).parse("1.5 2.5 3.5 4.5 5.5 6.5 7.5");
        assert!(matches!(
            result,
            Err(ParseError::CountMismatch {
                after_strip: 7,
                header: None,
                ..
            })
        ));
    }

    #[test]
    fn test_header_strip_that_still_mismatches_fails() {
        // Header found, but one value too many remains
        let result = parser(6).parse("2 3 1 2 3 4 5 6 7");
        assert!(matches!(
            result,
            Err(ParseError::CountMismatch {
                after_strip: 7,
                header: Some((2, 3)),
                ..
            })
        ));
    }

    #[test]
    fn test_header_beyond_scan_window_is_ignored() {
        let mut text = String::new();
        for _ in 0..25 {
            text.push_str("0.5 ");
        }
        text.push_str("5 5");
        // 27 tokens, expected 25; the only pair multiplying to 25 starts at token 25
        let result = parser(25).parse(&text);
        assert!(matches!(
            result,
            Err(ParseError::CountMismatch { header: None, .. })
        ));
    }

    #[test]
    fn test_comments_separators_and_junk_tokens() -> Result<(), ParseError> {
        let raw = "# header line\n\n  # indented comment\n1.0,2.0 , 3.0\nabc 4.0\t5.0\n6.0\n";
        let snapshot = parser(6).parse(raw)?;
        assert_eq!(snapshot.len(), 6);
        assert_eq!(snapshot.missing_count(), 0);
        Ok(())
    }

    #[test]
    fn test_sentinels_normalized_at_parse_time() -> Result<(), ParseError> {
        let snapshot = parser(3).parse("-999 15.5 2049")?;
        assert_eq!(snapshot.values(), &[None, Some(15.5), None]);
        Ok(())
    }

    #[test]
    fn test_empty_and_non_numeric_bodies() {
        assert!(matches!(parser(3).parse("  \n"), Err(ParseError::EmptyBody)));
        assert!(matches!(
            parser(3).parse("# only comments\nno numbers here"),
            Err(ParseError::NoNumericTokens)
        ));
        assert!(matches!(
            GridResponseParser::new(0, SentinelBand::default()).parse("1 2"),
            Err(ParseError::ZeroExpectedCount)
        ));
    }

    #[test]
    fn test_length_always_matches_expected() {
        let inputs = [
            "1 2 3 4",
            "2 2 1 2 3 4",
            "1 4 9 9 9 9",
            "4 1 0.1 0.2 0.3 0.4",
            "1 2 3",
            "1,2,3,4,5",
            "",
        ];
        for input in inputs {
            if let Ok(snapshot) = parser(4).parse(input) {
                assert_eq!(snapshot.len(), 4, "input {:?}", input);
            }
        }
    }
}

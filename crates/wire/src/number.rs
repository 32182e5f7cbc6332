//! Number formats used on the wire.
//!
//! Two formats exist and they are not mutually distinguishable: `"1,234"` is one thousand two
//! hundred and thirty-four in `en_US` and one point two three four in `de_DE`. Every caller must
//! say which one it means.

use crate::{WireError, WireResult};
use serde::{Deserialize, Serialize};

/// Which convention a numeric string follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumberFormat {
    /// Fixed internal format: `.` decimal separator, no grouping, locale independent.
    Bridge,
    /// Format of the user's current locale.
    Localized,
}

/// Separators for one locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberLocale {
    identifier: String,
    decimal: char,
    grouping: Option<char>,
}

const NARROW_NBSP: char = '\u{202F}';
const NBSP: char = '\u{00A0}';

impl NumberLocale {
    /// Separators for a locale identifier such as `en_US`, `de-DE` or `fr`.
    ///
    /// Unknown languages fall back to `.` and `,`.
    pub fn for_identifier(identifier: &str) -> Self {
        let identifier = identifier.trim();
        if identifier.eq_ignore_ascii_case("en_US_POSIX") || identifier.eq_ignore_ascii_case("POSIX") {
            return Self::posix();
        }
        let mut parts = identifier.split(['_', '-']);
        let language = parts.next().unwrap_or_default().to_ascii_lowercase();
        let region = parts.next().unwrap_or_default().to_ascii_uppercase();

        let (decimal, grouping) = match (language.as_str(), region.as_str()) {
            (_, "CH") | (_, "LI") => ('.', Some('\'')),
            ("pt", "PT") => (',', Some(NBSP)),
            ("de" | "es" | "it" | "nl" | "pt" | "da" | "id" | "tr" | "el" | "ro" | "hr", _) => {
                (',', Some('.'))
            }
            ("fr" | "ru" | "sv" | "nb" | "no" | "fi" | "pl" | "cs" | "sk" | "uk" | "hu", _) => {
                (',', Some(NARROW_NBSP))
            }
            _ => ('.', Some(',')),
        };
        Self {
            identifier: identifier.to_owned(),
            decimal,
            grouping,
        }
    }

    /// The fixed locale: `.` decimal separator and no grouping.
    pub fn posix() -> Self {
        Self {
            identifier: "en_US_POSIX".into(),
            decimal: '.',
            grouping: None,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn decimal_separator(&self) -> char {
        self.decimal
    }

    pub fn grouping_separator(&self) -> Option<char> {
        self.grouping
    }

    fn is_grouping(&self, c: char) -> bool {
        match self.grouping {
            Some(g) if g == NARROW_NBSP || g == NBSP => c == NARROW_NBSP || c == NBSP || c == ' ',
            Some(g) => c == g,
            None => false,
        }
    }

    /// Parse a string written in this locale.
    ///
    /// Grouping separators are accepted in the integer part only, and when one is used every
    /// group after the first must hold exactly three digits, so `1,2` is rejected in `en_US`
    /// rather than read as twelve. Exponents are not accepted.
    pub fn parse(&self, text: &str) -> WireResult<f64> {
        let invalid = || WireError::InvalidNumber(text.to_owned());
        let trimmed = text.trim();
        let (negative, digits) = match trimmed.chars().next() {
            Some(c @ ('-' | '\u{2212}')) => (true, &trimmed[c.len_utf8()..]),
            Some('+') => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };

        let mut normalized = String::with_capacity(digits.len() + 1);
        if negative {
            normalized.push('-');
        }
        let mut seen_decimal = false;
        let mut seen_digit = false;
        let mut grouped = false;
        // Integer digits since the last grouping separator.
        let mut run = 0usize;
        for c in digits.chars() {
            if c.is_ascii_digit() {
                normalized.push(c);
                seen_digit = true;
                if !seen_decimal {
                    run += 1;
                }
            } else if c == self.decimal && !seen_decimal {
                if grouped && run != 3 {
                    return Err(invalid());
                }
                normalized.push('.');
                seen_decimal = true;
            } else if self.is_grouping(c) && !seen_decimal {
                let complete = if grouped { run == 3 } else { (1..=3).contains(&run) };
                if !complete {
                    return Err(invalid());
                }
                grouped = true;
                run = 0;
            } else {
                return Err(invalid());
            }
        }
        if !seen_digit || (grouped && !seen_decimal && run != 3) {
            return Err(invalid());
        }
        normalized.parse::<f64>().map_err(|_| invalid())
    }

    /// Render a value with this locale's separators, grouping the integer part in threes.
    pub fn format(&self, value: f64) -> String {
        let plain = format_bridge(value);
        let (sign, unsigned) = match plain.strip_prefix('-') {
            Some(rest) => ("-", rest),
            None => ("", plain.as_str()),
        };
        let (integer, fraction) = match unsigned.split_once('.') {
            Some((i, f)) => (i, Some(f)),
            None => (unsigned, None),
        };

        let mut out = String::from(sign);
        let len = integer.len();
        for (i, c) in integer.chars().enumerate() {
            if let Some(g) = self.grouping {
                if i > 0 && (len - i) % 3 == 0 {
                    out.push(g);
                }
            }
            out.push(c);
        }
        if let Some(fraction) = fraction {
            out.push(self.decimal);
            out.push_str(fraction);
        }
        out
    }
}

impl Default for NumberLocale {
    fn default() -> Self {
        Self::posix()
    }
}

/// Render a number in the fixed bridge format.
///
/// Integral values carry no fractional part; other values use the shortest representation that
/// reads back to the same `f64`. Never uses exponent notation.
pub fn format_bridge(value: f64) -> String {
    if value == 0.0 {
        // Avoid "-0".
        return "0".into();
    }
    format!("{value}")
}

/// Parse a number written in the fixed bridge format.
pub fn parse_bridge(text: &str) -> WireResult<f64> {
    let invalid = || WireError::InvalidNumber(text.to_owned());
    if text.is_empty()
        || !text
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
    {
        return Err(invalid());
    }
    let value = text.parse::<f64>().map_err(|_| invalid())?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(invalid())
    }
}

/// Parse `text` with the given format, using `locale` for [`NumberFormat::Localized`].
pub fn parse_number(text: &str, format: NumberFormat, locale: &NumberLocale) -> WireResult<f64> {
    match format {
        NumberFormat::Bridge => parse_bridge(text),
        NumberFormat::Localized => locale.parse(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bridge_format_is_plain() {
        assert_eq!(format_bridge(1500.0), "1500");
        assert_eq!(format_bridge(98.6), "98.6");
        assert_eq!(format_bridge(-0.0), "0");
        assert_eq!(format_bridge(0.1), "0.1");
        assert_eq!(format_bridge(1e21), "1000000000000000000000");
    }

    #[test]
    fn bridge_parse_is_strict() {
        assert_eq!(parse_bridge("1500").expect("integer"), 1500.0);
        assert_eq!(parse_bridge("-12.25").expect("negative"), -12.25);
        for bad in ["", " 1", "1,5", "1 000", "inf", "NaN", "abc"] {
            assert!(parse_bridge(bad).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn bridge_reads_back_what_it_writes() {
        for value in [0.1, 1.0 / 3.0, 72.5, 10_000.0, -4.75] {
            assert_eq!(parse_bridge(&format_bridge(value)).expect("own output"), value);
        }
    }

    #[test]
    fn same_string_means_different_things() {
        let us = NumberLocale::for_identifier("en_US");
        let de = NumberLocale::for_identifier("de_DE");
        assert_eq!(us.parse("1,234").expect("us grouping"), 1234.0);
        assert_eq!(de.parse("1,234").expect("de decimal"), 1.234);
        assert_eq!(de.parse("1.234,5").expect("de grouping"), 1234.5);
    }

    #[test]
    fn french_accepts_spaces_for_grouping() {
        let fr = NumberLocale::for_identifier("fr-FR");
        assert_eq!(fr.parse("1 234,5").expect("plain space"), 1234.5);
        assert_eq!(fr.parse("1\u{202F}234,5").expect("narrow nbsp"), 1234.5);
    }

    #[test]
    fn localized_rejects_garbage() {
        let us = NumberLocale::for_identifier("en_US");
        for bad in ["", "-", "1.2.3", "1,", "1e5", "12abc", ",5", "1.5,0"] {
            assert!(us.parse(bad).is_err(), "{bad:?}");
        }
        assert_eq!(us.parse(" -3.5 ").expect("trimmed"), -3.5);
        assert_eq!(us.parse(".5").expect("leading decimal"), 0.5);
    }

    #[test]
    fn grouping_needs_whole_groups_of_three() {
        let us = NumberLocale::for_identifier("en_US");
        for bad in ["1,2", "1,23", "1,2345", "1234,567", "1,234,5", "1,23.5", ",234"] {
            assert!(us.parse(bad).is_err(), "{bad:?}");
        }
        assert_eq!(us.parse("12,345,678.5").expect("grouped"), 12345678.5);
        assert_eq!(us.parse("1234567").expect("ungrouped"), 1234567.0);

        let de = NumberLocale::for_identifier("de_DE");
        assert!(de.parse("1.2").is_err());
        assert_eq!(de.parse("1.234").expect("grouped thousand"), 1234.0);
    }

    #[test]
    fn posix_has_no_grouping() {
        let posix = NumberLocale::for_identifier("en_US_POSIX");
        assert_eq!(posix.grouping_separator(), None);
        assert!(posix.parse("1,234").is_err());
        assert_eq!(posix.format(1234567.5), "1234567.5");
    }

    #[test]
    fn format_groups_integer_part() {
        let us = NumberLocale::for_identifier("en_US");
        assert_eq!(us.format(1234567.25), "1,234,567.25");
        assert_eq!(us.format(-999.0), "-999");
        let ch = NumberLocale::for_identifier("de_CH");
        assert_eq!(ch.format(12345.5), "12'345.5");
        assert_eq!(ch.parse("12'345.5").expect("swiss"), 12345.5);
    }

    #[test]
    fn parse_number_dispatches_on_format() {
        let de = NumberLocale::for_identifier("de_DE");
        assert_eq!(parse_number("2,5", NumberFormat::Localized, &de).expect("localized"), 2.5);
        assert!(parse_number("2,5", NumberFormat::Bridge, &de).is_err());
    }
}

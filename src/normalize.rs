// 🧮 Amount & Date Normalizer
// Locale-formatted numbers/dates → canonical minor-unit integers and ISO dates.
//
// Never fails: an unparsable value falls back to a default and carries a warning
// message the caller turns into a ParseFailure.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Largest amount kept as-is (2^53 - 1); larger values are clamped
pub const MAX_SAFE_AMOUNT: i64 = 9_007_199_254_740_991;

// ============================================================================
// NUMBER FORMAT
// ============================================================================

/// How a bank prints its amounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberFormat {
    pub decimal_separator: char,
    pub thousands_separator: Option<char>,
    /// Digits of the minor unit (3 for millimes)
    pub minor_digits: u32,
}

impl NumberFormat {
    /// "1 250 000,500"
    pub const SPACE_COMMA: NumberFormat = NumberFormat {
        decimal_separator: ',',
        thousands_separator: Some(' '),
        minor_digits: 3,
    };

    /// "1.250.000,500"
    pub const DOT_COMMA: NumberFormat = NumberFormat {
        decimal_separator: ',',
        thousands_separator: Some('.'),
        minor_digits: 3,
    };

    /// "1,250,000.500"
    pub const COMMA_DOT: NumberFormat = NumberFormat {
        decimal_separator: '.',
        thousands_separator: Some(','),
        minor_digits: 3,
    };

    fn minor_factor(&self) -> u128 {
        10u128.pow(self.minor_digits)
    }
}

impl Default for NumberFormat {
    fn default() -> Self {
        NumberFormat::SPACE_COMMA
    }
}

/// A normalized value plus the reason it had to be defaulted or altered
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<T> {
    pub value: T,
    pub warning: Option<String>,
}

impl<T> Parsed<T> {
    fn clean(value: T) -> Self {
        Parsed { value, warning: None }
    }

    fn degraded(value: T, warning: String) -> Self {
        Parsed {
            value,
            warning: Some(warning),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.warning.is_none()
    }
}

// ============================================================================
// AMOUNTS
// ============================================================================

/// Parse a printed amount into signed minor units.
///
/// Whitespace (including NBSP) and the thousands separator are stripped, the
/// fraction is scaled to `minor_digits`. Unparsable → 0, oversized → clamped.
pub fn parse_amount(raw: &str, format: &NumberFormat) -> Parsed<i64> {
    let trimmed = raw.trim();
    let (negative, body) = split_sign(trimmed);

    let mut integer_digits = String::new();
    let mut fraction_digits = String::new();
    let mut in_fraction = false;

    for c in body.chars() {
        if c.is_ascii_digit() {
            if in_fraction {
                fraction_digits.push(c);
            } else {
                integer_digits.push(c);
            }
        } else if c == format.decimal_separator {
            if in_fraction {
                return Parsed::degraded(0, format!("unparsable amount '{}'", trimmed));
            }
            in_fraction = true;
        } else if Some(c) == format.thousands_separator || c.is_whitespace() || c == '\'' {
            continue;
        } else {
            return Parsed::degraded(0, format!("unparsable amount '{}'", trimmed));
        }
    }

    if integer_digits.is_empty() && fraction_digits.is_empty() {
        return Parsed::degraded(0, format!("unparsable amount '{}'", trimmed));
    }

    let mut warning = None;
    let minor_digits = format.minor_digits as usize;
    if fraction_digits.len() > minor_digits {
        if fraction_digits[minor_digits..].chars().any(|c| c != '0') {
            warning = Some(format!(
                "amount '{}' has more than {} decimals; extra digits dropped",
                trimmed, minor_digits
            ));
        }
        fraction_digits.truncate(minor_digits);
    }
    while fraction_digits.len() < minor_digits {
        fraction_digits.push('0');
    }

    // 30 digits fit in u128 and are far beyond the safe bound anyway
    if integer_digits.trim_start_matches('0').len() > 30 {
        return clamp(negative, trimmed);
    }

    let major: u128 = integer_digits.parse().unwrap_or(0);
    let minor: u128 = fraction_digits.parse().unwrap_or(0);
    let total = major * format.minor_factor() + minor;

    if total > MAX_SAFE_AMOUNT as u128 {
        return clamp(negative, trimmed);
    }

    let value = if negative { -(total as i64) } else { total as i64 };
    Parsed { value, warning }
}

fn clamp(negative: bool, raw: &str) -> Parsed<i64> {
    let value = if negative { -MAX_SAFE_AMOUNT } else { MAX_SAFE_AMOUNT };
    Parsed::degraded(value, format!("amount '{}' exceeds the safe integer bound; clamped", raw))
}

/// Leading '-' / '−', trailing '-', or accounting parentheses
fn split_sign(s: &str) -> (bool, &str) {
    if let Some(inner) = s.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
        return (true, inner.trim());
    }
    if let Some(rest) = s.strip_prefix('-').or_else(|| s.strip_prefix('−')) {
        return (true, rest.trim());
    }
    if let Some(rest) = s.strip_prefix('+') {
        return (false, rest.trim());
    }
    if let Some(rest) = s.strip_suffix('-') {
        return (true, rest.trim());
    }
    (false, s)
}

/// Render minor units back in a bank's format ("2 000,000")
pub fn format_amount(minor: i64, format: &NumberFormat) -> String {
    let factor = format.minor_factor() as i128;
    let abs = (minor as i128).abs();
    let major = (abs / factor).to_string();
    let fraction = abs % factor;

    let grouped = match format.thousands_separator {
        Some(sep) => {
            let mut out = String::new();
            for (i, c) in major.chars().enumerate() {
                if i > 0 && (major.len() - i) % 3 == 0 {
                    out.push(sep);
                }
                out.push(c);
            }
            out
        }
        None => major,
    };

    let sign = if minor < 0 { "-" } else { "" };
    if format.minor_digits == 0 {
        format!("{}{}", sign, grouped)
    } else {
        format!(
            "{}{}{}{:0width$}",
            sign,
            grouped,
            format.decimal_separator,
            fraction,
            width = format.minor_digits as usize
        )
    }
}

// ============================================================================
// DATES
// ============================================================================

/// Parse DD/MM/YYYY (also '-' and '.' separators, two-digit years) or ISO YYYY-MM-DD
pub fn parse_date_strict(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    let parts: Vec<&str> = s.split(['/', '-', '.']).collect();
    if parts.len() != 3 {
        return None;
    }
    if parts
        .iter()
        .any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit()))
    {
        return None;
    }

    let (year, month, day) = if parts[0].len() == 4 {
        (parts[0], parts[1], parts[2])
    } else {
        (parts[2], parts[1], parts[0])
    };

    if day.len() > 2 || month.len() > 2 {
        return None;
    }

    let year: i32 = match year.len() {
        2 => 2000 + year.parse::<i32>().ok()?,
        4 => year.parse().ok()?,
        _ => return None,
    };

    NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)
}

/// Parse a date, falling back to the processing date with a warning
pub fn parse_date(raw: &str, fallback: NaiveDate) -> Parsed<NaiveDate> {
    match parse_date_strict(raw) {
        Some(date) => Parsed::clean(date),
        None => Parsed::degraded(
            fallback,
            format!("unparsable date '{}'; using processing date {}", raw.trim(), to_iso(fallback)),
        ),
    }
}

pub fn to_iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Absolute distance in days
pub fn days_apart(a: NaiveDate, b: NaiveDate) -> i64 {
    (a - b).num_days().abs()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_amount_space_comma() {
        let parsed = parse_amount("1 250 000,500", &NumberFormat::SPACE_COMMA);
        assert_eq!(parsed.value, 1_250_000_500);
        assert!(parsed.is_clean());
    }

    #[test]
    fn test_parse_amount_nbsp_and_missing_fraction() {
        let parsed = parse_amount("2\u{a0}000", &NumberFormat::SPACE_COMMA);
        assert_eq!(parsed.value, 2_000_000);
        assert!(parsed.is_clean());
    }

    #[test]
    fn test_parse_amount_dot_thousands() {
        let parsed = parse_amount("15.450,000", &NumberFormat::DOT_COMMA);
        assert_eq!(parsed.value, 15_450_000);
    }

    #[test]
    fn test_parse_amount_english_format() {
        let parsed = parse_amount("1,250.75", &NumberFormat::COMMA_DOT);
        assert_eq!(parsed.value, 1_250_750);
    }

    #[test]
    fn test_parse_amount_signs() {
        assert_eq!(parse_amount("-500,000", &NumberFormat::SPACE_COMMA).value, -500_000);
        assert_eq!(parse_amount("500,000-", &NumberFormat::SPACE_COMMA).value, -500_000);
        assert_eq!(parse_amount("(500,000)", &NumberFormat::SPACE_COMMA).value, -500_000);
    }

    #[test]
    fn test_parse_amount_garbage_defaults_to_zero() {
        let parsed = parse_amount("N/A", &NumberFormat::SPACE_COMMA);
        assert_eq!(parsed.value, 0);
        assert!(parsed.warning.unwrap().contains("unparsable"));

        let parsed = parse_amount("1,2,3", &NumberFormat::SPACE_COMMA);
        assert_eq!(parsed.value, 0);
        assert!(!parsed.is_clean());
    }

    #[test]
    fn test_parse_amount_clamps_beyond_safe_bound() {
        let parsed = parse_amount("99 999 999 999 999 999", &NumberFormat::SPACE_COMMA);
        assert_eq!(parsed.value, MAX_SAFE_AMOUNT);
        assert!(parsed.warning.unwrap().contains("clamped"));
    }

    #[test]
    fn test_parse_amount_extra_decimals_dropped() {
        let parsed = parse_amount("1,23456", &NumberFormat::SPACE_COMMA);
        assert_eq!(parsed.value, 1_234);
        assert!(!parsed.is_clean());
    }

    #[test]
    fn test_format_amount_round_trips_display() {
        assert_eq!(format_amount(2_000_000, &NumberFormat::SPACE_COMMA), "2 000,000");
        assert_eq!(format_amount(-1_250_500, &NumberFormat::DOT_COMMA), "-1.250,500");
        assert_eq!(format_amount(999, &NumberFormat::COMMA_DOT), "0.999");
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date_strict("20/06/2025"), Some(date(2025, 6, 20)));
        assert_eq!(parse_date_strict("20-06-2025"), Some(date(2025, 6, 20)));
        assert_eq!(parse_date_strict("20.06.25"), Some(date(2025, 6, 20)));
        assert_eq!(parse_date_strict("2025-06-20"), Some(date(2025, 6, 20)));
        assert_eq!(parse_date_strict("31/02/2025"), None);
        assert_eq!(parse_date_strict("June 20"), None);
    }

    #[test]
    fn test_parse_date_falls_back_to_processing_date() {
        let today = date(2025, 7, 1);
        let parsed = parse_date("99/99/2025", today);
        assert_eq!(parsed.value, today);
        assert!(parsed.warning.unwrap().contains("2025-07-01"));
    }

    #[test]
    fn test_days_apart_is_symmetric() {
        assert_eq!(days_apart(date(2025, 6, 20), date(2025, 6, 23)), 3);
        assert_eq!(days_apart(date(2025, 6, 23), date(2025, 6, 20)), 3);
    }
}

//! Lenient cell value parsing
//!
//! Bad values never fail a row: amounts fall back to 0, quantities to 1 and
//! dates to the caller's default.

use chrono::NaiveDate;

/// Parse a currency cell like `"$1,234.56"`.
///
/// Everything except digits, `.` and `-` is dropped, then the longest valid
/// leading decimal is read. Empty or unparsable input yields 0.
pub fn parse_currency(raw: &str) -> f64 {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    leading_decimal(&cleaned).unwrap_or(0.0)
}

fn leading_decimal(s: &str) -> Option<f64> {
    let bytes = s.as_bytes();
    let mut end = 0;

    if bytes.first() == Some(&b'-') {
        end = 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        end = frac_end;
    }

    if digits == 0 {
        return None;
    }
    s[..end].parse().ok()
}

/// Parse a quantity cell by its leading integer; missing, zero or negative becomes 1
pub fn parse_quantity(raw: &str) -> i64 {
    let s = raw.trim();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());

    match digits[..end].parse::<i64>() {
        Ok(n) if !negative && n >= 1 => n,
        _ => 1,
    }
}

// Two-digit years first: "%Y" would accept "24" as the year 24
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%y",
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%m-%d-%Y",
    "%d-%b-%Y",
    "%b %d, %Y",
    "%B %d, %Y",
];

/// Parse a date cell in any of the common export formats
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    let try_all = |candidate: &str| {
        DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(candidate, fmt).ok())
    };

    try_all(s).or_else(|| {
        // Timestamps: keep the date part
        let date_part = s.split(['T', ' ']).next().unwrap_or(s);
        if date_part.len() < s.len() {
            try_all(date_part)
        } else {
            None
        }
    })
}

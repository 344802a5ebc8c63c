//! Date normalization.

use chrono::NaiveDate;

use super::patterns::{
    DATE_DAY_FIRST, DATE_DOTTED, DATE_ISO, DATE_MONTH_NAME_FIRST, DATE_NUMERIC, DATE_YMD,
    is_null_literal,
};

/// Parse a calendar date in any of the forms invoices commonly use.
///
/// Unrecognized or impossible dates give `None`.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if is_null_literal(s) {
        return None;
    }

    // 2024-01-15, 2024-01-15T10:30:00Z
    if let Some(caps) = DATE_ISO.captures(s) {
        return ymd(caps[1].parse().ok()?, &caps[2], &caps[3]);
    }

    // 2024/01/15, 2024.01.15
    if let Some(caps) = DATE_YMD.captures(s) {
        return ymd(caps[1].parse().ok()?, &caps[2], &caps[3]);
    }

    // 15.01.2024
    if let Some(caps) = DATE_DOTTED.captures(s) {
        return ymd(parse_year(&caps[3]), &caps[2], &caps[1]);
    }

    // 01/15/2024, 15/01/2024, 1-15-24
    if let Some(caps) = DATE_NUMERIC.captures(s) {
        let first: u32 = caps[1].parse().ok()?;
        let second: u32 = caps[2].parse().ok()?;
        let year = parse_year(&caps[3]);
        let (month, day) = if first > 12 { (second, first) } else { (first, second) };
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    if let Some(caps) = DATE_MONTH_NAME_FIRST.captures(s) {
        let month = month_from_name(&caps[1])?;
        return NaiveDate::from_ymd_opt(caps[3].parse().ok()?, month, caps[2].parse().ok()?);
    }

    if let Some(caps) = DATE_DAY_FIRST.captures(s) {
        let month = month_from_name(&caps[2])?;
        return NaiveDate::from_ymd_opt(caps[3].parse().ok()?, month, caps[1].parse().ok()?);
    }

    None
}

fn ymd(year: i32, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)
}

fn parse_year(s: &str) -> i32 {
    let year: i32 = s.parse().unwrap_or(0);
    if s.len() <= 2 {
        // Two-digit year: assume 2000s for 00-50, 1900s for 51-99
        if year <= 50 {
            2000 + year
        } else {
            1900 + year
        }
    } else {
        year
    }
}

fn month_from_name(name: &str) -> Option<u32> {
    let name = name.to_lowercase();
    let month = match name.get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

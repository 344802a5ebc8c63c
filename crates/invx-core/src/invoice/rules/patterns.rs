//! Common regex patterns for normalizing backend output.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Markdown code fences, optionally tagged as json
    pub static ref JSON_FENCE: Regex = Regex::new(
        r"(?s)```[ \t]*(?:json|JSON)?[ \t]*\r?\n?(.*?)```"
    ).unwrap();

    // Date patterns
    pub static ref DATE_ISO: Regex = Regex::new(
        r"^(\d{4})-(\d{1,2})-(\d{1,2})(?:[T ]\d{1,2}:\d{2}.*)?$"
    ).unwrap();

    pub static ref DATE_YMD: Regex = Regex::new(
        r"^(\d{4})[./](\d{1,2})[./](\d{1,2})$"
    ).unwrap();

    pub static ref DATE_DOTTED: Regex = Regex::new(
        r"^(\d{1,2})\.(\d{1,2})\.(\d{4}|\d{2})$"
    ).unwrap();

    pub static ref DATE_NUMERIC: Regex = Regex::new(
        r"^(\d{1,2})[/\-](\d{1,2})[/\-](\d{4}|\d{2})$"
    ).unwrap();

    // "January 15, 2024", "Jan. 15th 2024"
    pub static ref DATE_MONTH_NAME_FIRST: Regex = Regex::new(
        r"(?i)^([a-z]+)\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})$"
    ).unwrap();

    // "15 January 2024", "15-Jan-2024"
    pub static ref DATE_DAY_FIRST: Regex = Regex::new(
        r"(?i)^(\d{1,2})(?:st|nd|rd|th)?[\s\-]+([a-z]+)\.?,?[\s\-]+(\d{4})$"
    ).unwrap();

    // Amount patterns
    pub static ref AMOUNT_SCIENTIFIC: Regex = Regex::new(
        r"^-?\d+(?:\.\d+)?[eE][+\-]?\d+$"
    ).unwrap();

    pub static ref CURRENCY_CODE: Regex = Regex::new(
        r"\b([A-Za-z]{3})\b"
    ).unwrap();

    pub static ref PERCENT: Regex = Regex::new(
        r"^(.*?)\s*%$"
    ).unwrap();
}

/// Values models use to say "nothing here".
pub fn is_null_literal(s: &str) -> bool {
    let s = s.trim();
    s.is_empty()
        || s.eq_ignore_ascii_case("null")
        || s.eq_ignore_ascii_case("none")
        || s.eq_ignore_ascii_case("n/a")
}

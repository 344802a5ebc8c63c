//! Amount, tax rate and currency normalization.

use rust_decimal::Decimal;
use std::str::FromStr;

use super::patterns::{AMOUNT_SCIENTIFIC, CURRENCY_CODE, PERCENT, is_null_literal};

/// Currency symbols and the codes they stand for, longest first.
const CURRENCY_SYMBOLS: &[(&str, &str)] = &[
    ("US$", "USD"),
    ("zł", "PLN"),
    ("$", "USD"),
    ("€", "EUR"),
    ("£", "GBP"),
    ("¥", "JPY"),
    ("₹", "INR"),
    ("₩", "KRW"),
    ("₽", "RUB"),
    ("₺", "TRY"),
];

/// Parse a monetary amount written the way invoices write them.
///
/// Accepts currency symbols or codes, thousands separators (`,` `.` space or
/// apostrophe), a decimal comma, a leading minus or accounting parentheses, and
/// scientific notation. Returns `None` for anything that is not a number.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let s = s.trim();
    if is_null_literal(s) {
        return None;
    }

    let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    if AMOUNT_SCIENTIFIC.is_match(&compact) {
        return Decimal::from_scientific(&compact).ok();
    }

    let negative = s.starts_with('-')
        || s.ends_with('-')
        || (s.starts_with('(') && s.ends_with(')'))
        || s.contains("-$")
        || s.contains("$-");

    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();
    let cleaned = cleaned.trim_end_matches([',', '.']);
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    let cleaned = if cleaned.starts_with([',', '.']) {
        format!("0{}", cleaned)
    } else {
        cleaned.to_string()
    };

    let value = Decimal::from_str(&normalize_separators(&cleaned)).ok()?;
    Some(if negative { -value } else { value })
}

/// Rewrite digits with mixed separators into `1234.56` form.
fn normalize_separators(cleaned: &str) -> String {
    let commas = cleaned.matches(',').count();
    let dots = cleaned.matches('.').count();

    match (commas, dots) {
        (0, 0) => cleaned.to_string(),
        // Whichever separator comes last is the decimal one
        (c, d) if c > 0 && d > 0 => {
            let comma_pos = cleaned.rfind(',');
            let dot_pos = cleaned.rfind('.');
            if comma_pos > dot_pos {
                cleaned.replace('.', "").replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        }
        (1, 0) => {
            let (head, tail) = cleaned.split_once(',').unwrap_or((cleaned, ""));
            // "1,234" groups thousands, "12,50" is a decimal comma
            if tail.len() == 3 && !head.is_empty() && head != "0" {
                format!("{}{}", head, tail)
            } else {
                format!("{}.{}", head, tail)
            }
        }
        (_, 0) => cleaned.replace(',', ""),
        (0, 1) => cleaned.to_string(),
        _ => cleaned.replace('.', ""),
    }
}

/// Parse a tax rate into a fraction.
///
/// `"8%"`, `8` and `0.08` all give `0.08`.
pub fn parse_tax_rate(s: &str) -> Option<Decimal> {
    let s = s.trim();
    if let Some(caps) = PERCENT.captures(s) {
        return parse_amount(&caps[1]).map(percent_to_fraction);
    }
    parse_amount(s).map(fraction_or_percent)
}

/// Interpret a bare number as a rate: values above one are percentages.
pub fn fraction_or_percent(value: Decimal) -> Decimal {
    if value.abs() > Decimal::ONE {
        percent_to_fraction(value)
    } else {
        value
    }
}

fn percent_to_fraction(value: Decimal) -> Decimal {
    (value / Decimal::ONE_HUNDRED).normalize()
}

/// Normalize a currency field to an ISO 4217 code.
pub fn normalize_currency(s: &str) -> Option<String> {
    let s = s.trim();
    if is_null_literal(s) {
        return None;
    }

    if s.len() == 3 && s.chars().all(|c| c.is_ascii_alphabetic()) {
        return Some(s.to_ascii_uppercase());
    }
    currency_hint(s)
}

/// Find a currency mentioned inside a value such as `"€1.234,50"` or `"1200 CHF"`.
pub fn currency_hint(s: &str) -> Option<String> {
    let code = CURRENCY_CODE
        .captures_iter(s)
        .map(|caps| caps[1].to_string())
        .find(|word| is_plausible_code(word));
    if code.is_some() {
        return code;
    }

    CURRENCY_SYMBOLS
        .iter()
        .find(|(symbol, _)| s.contains(symbol))
        .map(|(_, code)| code.to_string())
}

/// A three-letter word counts as a code only when written in upper case.
fn is_plausible_code(word: &str) -> bool {
    word.chars().all(|c| c.is_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_plain_amounts() {
        assert_eq!(parse_amount("1234.56"), Some(dec("1234.56")));
        assert_eq!(parse_amount("42"), Some(dec("42")));
        assert_eq!(parse_amount("0.10"), Some(dec("0.10")));
        assert_eq!(parse_amount(".50"), Some(dec("0.50")));
    }

    #[test]
    fn test_currency_and_separators() {
        assert_eq!(parse_amount("$1,234.56"), Some(dec("1234.56")));
        assert_eq!(parse_amount("€1.234,56"), Some(dec("1234.56")));
        assert_eq!(parse_amount("1 234,56 zł"), Some(dec("1234.56")));
        assert_eq!(parse_amount("CHF 1'234.50"), Some(dec("1234.50")));
        assert_eq!(parse_amount("USD 1,000,000"), Some(dec("1000000")));
        assert_eq!(parse_amount("12,50"), Some(dec("12.50")));
        assert_eq!(parse_amount("1,234"), Some(dec("1234")));
        assert_eq!(parse_amount("1.234.567"), Some(dec("1234567")));
    }

    #[test]
    fn test_negative_amounts() {
        assert_eq!(parse_amount("-15.00"), Some(dec("-15.00")));
        assert_eq!(parse_amount("(15.00)"), Some(dec("-15.00")));
        assert_eq!(parse_amount("-$15"), Some(dec("-15")));
    }

    #[test]
    fn test_scientific_amounts() {
        assert_eq!(parse_amount("1.5e3"), Some(dec("1500")));
        assert_eq!(parse_amount("2E-2"), Some(dec("0.02")));
    }

    #[test]
    fn test_not_amounts() {
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("null"), None);
        assert_eq!(parse_amount("N/A"), None);
        assert_eq!(parse_amount("free"), None);
    }

    #[test]
    fn test_tax_rates() {
        assert_eq!(parse_tax_rate("8%"), Some(dec("0.08")));
        assert_eq!(parse_tax_rate("8.5 %"), Some(dec("0.085")));
        assert_eq!(parse_tax_rate("23"), Some(dec("0.23")));
        assert_eq!(parse_tax_rate("0.2"), Some(dec("0.2")));
        assert_eq!(parse_tax_rate("none"), None);
    }

    #[test]
    fn test_currency() {
        assert_eq!(normalize_currency("usd"), Some("USD".to_string()));
        assert_eq!(normalize_currency("€"), Some("EUR".to_string()));
        assert_eq!(normalize_currency("£"), Some("GBP".to_string()));
        assert_eq!(normalize_currency(""), None);
        assert_eq!(currency_hint("€1.234,50"), Some("EUR".to_string()));
        assert_eq!(currency_hint("1200 CHF"), Some("CHF".to_string()));
        assert_eq!(currency_hint("1 234,56 zł"), Some("PLN".to_string()));
        assert_eq!(currency_hint("Net 30, EUR"), Some("EUR".to_string()));
        assert_eq!(currency_hint("1234.56"), None);
    }
}

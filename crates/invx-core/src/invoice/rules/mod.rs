//! Normalization rules for values found in backend output.

pub mod amounts;
pub mod dates;
pub mod patterns;

pub use amounts::{currency_hint, fraction_or_percent, normalize_currency, parse_amount, parse_tax_rate};
pub use dates::parse_date;
pub use patterns::is_null_literal;

//! Parser mapping backend output onto [`InvoiceData`].
//!
//! Models are asked for JSON but answer in many shapes: fenced or bare, one
//! object per page, renamed keys, amounts as formatted strings. The parser
//! takes whatever JSON objects it can find, maps their keys leniently and
//! merges them. Output with no JSON at all is kept verbatim in `notes`.

use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::models::invoice::{
    Address, DEFAULT_CURRENCY, Entity, InvoiceData, LineItem, Totals,
};

use super::rules::patterns::JSON_FENCE;
use super::rules::{
    currency_hint, fraction_or_percent, is_null_literal, normalize_currency, parse_amount,
    parse_date, parse_tax_rate,
};

/// Characters of raw output kept when no JSON is present.
const RAW_PREVIEW_CHARS: usize = 500;

/// Characters of raw output kept alongside a parse error.
const ERROR_PREVIEW_CHARS: usize = 200;

/// Wrapper objects are unwrapped at most this deep.
const MAX_WRAPPER_DEPTH: usize = 3;

// Key aliases, compared after lower-casing and dropping non-alphanumerics
const INVOICE_NUMBER: &[&str] = &[
    "invoicenumber",
    "invoiceno",
    "invoicenum",
    "invoiceid",
    "number",
    "documentnumber",
    "invoice",
];
const ISSUE_DATE: &[&str] = &["date", "issuedate", "invoicedate", "dateofissue", "dateissued"];
const DUE_DATE: &[&str] = &["duedate", "paymentduedate", "datedue", "due"];
const VENDOR: &[&str] = &[
    "vendor",
    "supplier",
    "seller",
    "vendorinformation",
    "supplierinformation",
    "issuer",
    "billfrom",
    "from",
];
const CUSTOMER: &[&str] = &[
    "customer",
    "billto",
    "buyer",
    "client",
    "customerinformation",
    "recipient",
    "soldto",
    "to",
];
const VENDOR_PREFIXES: &[&str] = &["vendor", "supplier", "seller"];
const CUSTOMER_PREFIXES: &[&str] = &["customer", "client", "buyer", "billto"];
const TOTALS: &[&str] = &["totals", "summary", "amounts", "total"];
const LINE_ITEMS: &[&str] = &["lineitems", "items", "lines", "products", "services"];
const NOTES: &[&str] = &["notes", "note", "remarks", "comments"];
const PAYMENT_TERMS: &[&str] = &["paymentterms", "terms", "termsofpayment"];
const WRAPPERS: &[&str] = &["invoice", "invoicedata", "data", "result"];

const NAME: &[&str] = &["name", "companyname", "company", "businessname", "legalname"];
const ADDRESS: &[&str] = &["address", "billingaddress", "postaladdress"];
const TAX_ID: &[&str] = &[
    "taxid",
    "taxnumber",
    "taxidentifier",
    "vatid",
    "vatnumber",
    "tin",
    "ein",
    "gstin",
    "abn",
    "nip",
];
const EMAIL: &[&str] = &["email", "emailaddress", "mail"];
const PHONE: &[&str] = &["phone", "phonenumber", "telephone", "tel", "mobile"];
const CONTACT: &[&str] = &["contact", "contactinfo", "contactinformation"];

const STREET: &[&str] = &["street", "streetaddress", "addressline1", "line1", "address"];
const STREET_EXTRA: &[&str] = &["addressline2", "line2"];
const CITY: &[&str] = &["city", "town", "locality"];
const STATE: &[&str] = &["state", "region", "province", "county"];
const ZIP_CODE: &[&str] = &["zipcode", "zip", "postalcode", "postcode"];
const COUNTRY: &[&str] = &["country", "countrycode"];

const DESCRIPTION: &[&str] = &["description", "item", "name", "product", "service", "details"];
const QUANTITY: &[&str] = &["quantity", "qty", "units", "hours"];
const UNIT_PRICE: &[&str] = &["unitprice", "price", "rate", "unitcost", "priceperunit"];
const LINE_TOTAL: &[&str] = &["total", "amount", "linetotal", "totalprice", "lineamount"];
const TAX_RATE: &[&str] = &["taxrate", "vatrate", "taxpercent", "taxpercentage"];

const SUBTOTAL: &[&str] = &["subtotal", "nettotal", "netamount", "totalnet", "net"];
const TAX: &[&str] = &["tax", "taxamount", "totaltax", "vat", "vatamount", "salestax"];
const GRAND_TOTAL: &[&str] = &[
    "total",
    "grandtotal",
    "totalamount",
    "amountdue",
    "totaldue",
    "balancedue",
    "totalgross",
];
const CURRENCY: &[&str] = &["currency", "currencycode"];

/// Trait for invoice parsing.
pub trait InvoiceParser {
    /// Parse backend output. Never fails: problems end up in `notes`.
    fn parse(&self, text: &str) -> InvoiceData;
}

/// Parser for vision model responses.
#[derive(Debug, Clone, Default)]
pub struct ResponseParser;

impl ResponseParser {
    pub fn new() -> Self {
        Self
    }
}

impl InvoiceParser for ResponseParser {
    fn parse(&self, text: &str) -> InvoiceData {
        let candidates = json_candidates(text);
        if candidates.is_empty() {
            debug!("Backend output has no JSON, keeping raw text");
            return raw_content(text);
        }

        let mut merged: Option<InvoiceData> = None;
        let mut first_error: Option<String> = None;

        for candidate in &candidates {
            match serde_json::from_str::<Value>(candidate.text) {
                Ok(value) => {
                    for object in objects(&value) {
                        let data = invoice_from_object(object, 0);
                        match merged.as_mut() {
                            Some(current) => current.merge(data),
                            None => merged = Some(data),
                        }
                    }
                }
                Err(e) if candidate.looks_like_json => {
                    debug!("Skipping JSON candidate: {}", e);
                    first_error.get_or_insert_with(|| e.to_string());
                }
                Err(e) => debug!("Ignoring braces in prose: {}", e),
            }
        }

        match merged {
            Some(data) if data.is_unstructured() && data.notes.is_none() => {
                debug!("JSON carried no invoice fields, keeping raw text");
                raw_content(text)
            }
            Some(data) => {
                debug!(
                    "Parsed invoice {:?} with {} line item(s)",
                    data.invoice_number,
                    data.line_items.len()
                );
                data
            }
            None => {
                let Some(detail) = first_error else {
                    debug!("Backend output has only prose braces, keeping raw text");
                    return raw_content(text);
                };
                warn!("Backend output is not valid JSON: {}", detail);
                InvoiceData::with_notes(format!(
                    "Parsing error: {}. Raw content: {}...",
                    detail,
                    preview(text, ERROR_PREVIEW_CHARS)
                ))
            }
        }
    }
}

fn raw_content(text: &str) -> InvoiceData {
    InvoiceData::with_notes(format!(
        "Raw extracted content: {}...",
        preview(text, RAW_PREVIEW_CHARS)
    ))
}

fn preview(text: &str, chars: usize) -> String {
    text.chars().take(chars).collect()
}

/// A region of the output that may hold JSON.
struct Candidate<'a> {
    text: &'a str,
    /// Fenced, leading the output, or opening like an object. Only these
    /// report a parse error when they fail.
    looks_like_json: bool,
}

/// JSON-looking regions of the output, fenced blocks first.
fn json_candidates(text: &str) -> Vec<Candidate<'_>> {
    let fenced: Vec<Candidate<'_>> = JSON_FENCE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .flat_map(|m| regions(m.as_str()))
        .map(|(_, region)| Candidate {
            text: region,
            looks_like_json: true,
        })
        .collect();

    if !fenced.is_empty() {
        return fenced;
    }

    let lead = text.len() - text.trim_start().len();
    regions(text)
        .into_iter()
        .map(|(start, region)| Candidate {
            text: region,
            looks_like_json: start == lead || opens_like_object(region),
        })
        .collect()
}

/// `{` followed by a key or by the closing brace.
fn opens_like_object(region: &str) -> bool {
    matches!(
        region.strip_prefix('{').map(str::trim_start),
        Some(rest) if rest.starts_with('"') || rest.starts_with('}')
    )
}

/// Regions with their byte offset in `source`.
fn regions(source: &str) -> Vec<(usize, &str)> {
    let trimmed = source.trim();
    if trimmed.starts_with('[') && trimmed.ends_with(']') {
        return vec![(source.len() - source.trim_start().len(), trimmed)];
    }
    balanced_objects(source)
}

/// Top-level `{...}` regions, skipping braces inside strings.
///
/// An object still open at the end of the input is returned as-is so the
/// caller can report why it does not parse.
fn balanced_objects(source: &str) -> Vec<(usize, &str)> {
    let mut found = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in source.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    found.push((start, &source[start..=i]));
                }
            }
            _ => {}
        }
    }

    if depth > 0 {
        found.push((start, &source[start..]));
    }
    found
}

fn objects(value: &Value) -> Vec<&Map<String, Value>> {
    match value {
        Value::Object(map) => vec![map],
        Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
        _ => Vec::new(),
    }
}

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Object fields indexed by normalized key.
struct Fields<'a> {
    by_key: HashMap<String, &'a Value>,
}

impl<'a> Fields<'a> {
    fn new(map: &'a Map<String, Value>) -> Self {
        let mut by_key = HashMap::with_capacity(map.len());
        for (key, value) in map {
            by_key.entry(normalize_key(key)).or_insert(value);
        }
        Self { by_key }
    }

    fn values<'k>(&'k self, aliases: &'k [&str]) -> impl Iterator<Item = &'a Value> + 'k {
        aliases.iter().filter_map(|alias| self.by_key.get(*alias).copied())
    }

    fn text(&self, aliases: &[&str]) -> Option<String> {
        self.values(aliases).find_map(text)
    }

    fn decimal(&self, aliases: &[&str]) -> Option<Decimal> {
        self.values(aliases).find_map(decimal)
    }

    fn tax_rate(&self, aliases: &[&str]) -> Option<Decimal> {
        self.values(aliases).find_map(|value| match value {
            Value::String(s) => parse_tax_rate(s),
            other => decimal(other).map(fraction_or_percent),
        })
    }

    fn date(&self, aliases: &[&str]) -> Option<chrono::NaiveDate> {
        self.values(aliases)
            .find_map(|value| value.as_str().and_then(parse_date))
    }

    fn object(&self, aliases: &[&str]) -> Option<&'a Map<String, Value>> {
        self.values(aliases).find_map(Value::as_object)
    }

    fn array(&self, aliases: &[&str]) -> Option<&'a Vec<Value>> {
        self.values(aliases).find_map(Value::as_array)
    }

    /// Keys formed by a prefix and a field alias, such as `vendor_name`.
    fn prefixed(&self, prefixes: &[&str], aliases: &[&str]) -> Option<&'a Value> {
        prefixes.iter().find_map(|prefix| {
            aliases
                .iter()
                .find_map(|alias| self.by_key.get(&format!("{prefix}{alias}")).copied())
        })
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !is_null_literal(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Numbers are read from their literal text, never through `f64`.
fn decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            let literal = n.to_string();
            Decimal::from_str(&literal)
                .or_else(|_| Decimal::from_scientific(&literal))
                .ok()
        }
        Value::String(s) => parse_amount(s),
        _ => None,
    }
}

fn invoice_from_object(map: &Map<String, Value>, depth: usize) -> InvoiceData {
    let fields = Fields::new(map);

    let mut data = InvoiceData {
        invoice_number: fields.text(INVOICE_NUMBER),
        issue_date: fields.date(ISSUE_DATE),
        due_date: fields.date(DUE_DATE),
        vendor: party(&fields, VENDOR, VENDOR_PREFIXES),
        customer: party(&fields, CUSTOMER, CUSTOMER_PREFIXES),
        totals: totals(&fields),
        line_items: fields
            .array(LINE_ITEMS)
            .map(|items| items.iter().filter_map(line_item).collect())
            .unwrap_or_default(),
        notes: fields.text(NOTES),
        payment_terms: fields.text(PAYMENT_TERMS),
    };

    if depth < MAX_WRAPPER_DEPTH {
        for inner in fields.values(WRAPPERS).filter_map(Value::as_object) {
            data.merge(invoice_from_object(inner, depth + 1));
        }
    }
    data
}

fn party(fields: &Fields<'_>, aliases: &[&str], prefixes: &[&str]) -> Option<Entity> {
    let mut entity = fields.values(aliases).find_map(entity).unwrap_or_default();

    // Flat layouts: "vendor_name", "vendor_address", ...
    let flat = Entity {
        name: fields.prefixed(prefixes, NAME).and_then(text),
        address: fields.prefixed(prefixes, ADDRESS).and_then(address),
        tax_id: fields.prefixed(prefixes, TAX_ID).and_then(text),
        email: fields.prefixed(prefixes, EMAIL).and_then(text),
        phone: fields.prefixed(prefixes, PHONE).and_then(text),
    };
    entity.merge(flat);

    (!entity.is_empty()).then_some(entity)
}

fn entity(value: &Value) -> Option<Entity> {
    let map = match value {
        Value::Object(map) => map,
        other => {
            return text(other).map(|name| Entity {
                name: Some(name),
                ..Entity::default()
            });
        }
    };
    let fields = Fields::new(map);

    let mut entity = Entity {
        name: fields.text(NAME),
        address: fields.values(ADDRESS).find_map(address),
        tax_id: fields.text(TAX_ID),
        email: fields.text(EMAIL),
        phone: fields.text(PHONE),
    };

    for contact in fields.values(CONTACT) {
        match contact {
            Value::Object(inner) => {
                let inner = Fields::new(inner);
                entity.merge(Entity {
                    email: inner.text(EMAIL),
                    phone: inner.text(PHONE),
                    ..Entity::default()
                });
            }
            other => {
                if let Some(value) = text(other) {
                    if value.contains('@') {
                        entity.merge(Entity {
                            email: Some(value),
                            ..Entity::default()
                        });
                    } else {
                        entity.merge(Entity {
                            phone: Some(value),
                            ..Entity::default()
                        });
                    }
                }
            }
        }
    }

    (!entity.is_empty()).then_some(entity)
}

fn address(value: &Value) -> Option<Address> {
    let map = match value {
        Value::Object(map) => map,
        other => {
            return text(other).map(|street| Address {
                street: Some(street),
                ..Address::default()
            });
        }
    };
    let fields = Fields::new(map);

    let street = match (fields.text(STREET), fields.text(STREET_EXTRA)) {
        (Some(line1), Some(line2)) => Some(format!("{}, {}", line1, line2)),
        (line1, line2) => line1.or(line2),
    };
    let address = Address {
        street,
        city: fields.text(CITY),
        state: fields.text(STATE),
        zip_code: fields.text(ZIP_CODE),
        country: fields.text(COUNTRY),
    };

    (!address.is_empty()).then_some(address)
}

fn line_item(value: &Value) -> Option<LineItem> {
    let map = match value {
        Value::Object(map) => map,
        other => {
            return text(other).map(|description| LineItem {
                description: Some(description),
                ..LineItem::default()
            });
        }
    };
    let fields = Fields::new(map);

    let item = LineItem {
        description: fields.text(DESCRIPTION),
        quantity: fields.decimal(QUANTITY),
        unit_price: fields.decimal(UNIT_PRICE),
        total: fields.decimal(LINE_TOTAL),
        tax_rate: fields.tax_rate(TAX_RATE),
    };

    (!item.is_empty()).then_some(item)
}

fn totals(fields: &Fields<'_>) -> Option<Totals> {
    let nested = fields.object(TOTALS).map(|map| totals_from(&Fields::new(map)));
    let flat = totals_from(fields);

    // Top-level fields (including a top-level currency) fill gaps in nested totals
    let totals = match nested {
        Some(mut nested) => {
            nested.merge(flat);
            nested
        }
        None => flat,
    };

    if totals.subtotal.is_none()
        && totals.tax.is_none()
        && totals.total.is_none()
        && totals.currency.is_none()
    {
        return None;
    }

    Some(Totals {
        subtotal: totals.subtotal,
        tax: totals.tax,
        total: totals.total,
        currency: totals
            .currency
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
    })
}

/// Totals whose currency may still be unknown.
#[derive(Default)]
struct PartialTotals {
    subtotal: Option<Decimal>,
    tax: Option<Decimal>,
    total: Option<Decimal>,
    currency: Option<String>,
}

impl PartialTotals {
    fn merge(&mut self, other: PartialTotals) {
        self.subtotal = self.subtotal.or(other.subtotal);
        self.tax = self.tax.or(other.tax);
        self.total = self.total.or(other.total);
        if self.currency.is_none() {
            self.currency = other.currency;
        }
    }
}

fn totals_from(fields: &Fields<'_>) -> PartialTotals {
    let currency = fields
        .text(CURRENCY)
        .and_then(|c| normalize_currency(&c))
        .or_else(|| {
            // "€1.234,50" names its currency
            [SUBTOTAL, TAX, GRAND_TOTAL]
                .into_iter()
                .flat_map(|aliases| fields.values(aliases))
                .filter_map(Value::as_str)
                .find_map(currency_hint)
        });

    PartialTotals {
        subtotal: fields.decimal(SUBTOTAL),
        tax: fields.decimal(TAX),
        total: fields.decimal(GRAND_TOTAL),
        currency,
    }
}

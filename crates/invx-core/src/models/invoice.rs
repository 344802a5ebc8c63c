//! Invoice data models.
//!
//! Every field is optional. Monetary values use [`Decimal`] and serialize as
//! strings so no precision is lost; dates serialize as `YYYY-MM-DD`.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Currency assumed when the document does not state one.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Placeholder confidence reported for successful extractions.
pub const PLACEHOLDER_CONFIDENCE: f64 = 0.9;

/// Postal address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: Option<String>,
    pub city: Option<String>,
    /// State or region.
    pub state: Option<String>,
    /// Postal code.
    pub zip_code: Option<String>,
    pub country: Option<String>,
}

impl Address {
    pub fn is_empty(&self) -> bool {
        self.street.is_none()
            && self.city.is_none()
            && self.state.is_none()
            && self.zip_code.is_none()
            && self.country.is_none()
    }

    pub fn merge(&mut self, other: Address) {
        fill(&mut self.street, other.street);
        fill(&mut self.city, other.city);
        fill(&mut self.state, other.state);
        fill(&mut self.zip_code, other.zip_code);
        fill(&mut self.country, other.country);
    }
}

/// A business taking part in the invoice (vendor or customer).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub name: Option<String>,
    pub address: Option<Address>,
    /// Tax identification number (VAT ID, EIN, NIP...).
    pub tax_id: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl Entity {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.address.is_none()
            && self.tax_id.is_none()
            && self.email.is_none()
            && self.phone.is_none()
    }

    pub fn merge(&mut self, other: Entity) {
        fill(&mut self.name, other.name);
        merge_nested(&mut self.address, other.address, Address::merge);
        fill(&mut self.tax_id, other.tax_id);
        fill(&mut self.email, other.email);
        fill(&mut self.phone, other.phone);
    }
}

/// A single invoice line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    /// Line total.
    pub total: Option<Decimal>,
    /// Tax rate as a fraction (0.08 for 8%).
    pub tax_rate: Option<Decimal>,
}

impl LineItem {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.quantity.is_none()
            && self.unit_price.is_none()
            && self.total.is_none()
            && self.tax_rate.is_none()
    }
}

/// Invoice totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Option<Decimal>,
    pub tax: Option<Decimal>,
    /// Grand total.
    pub total: Option<Decimal>,
    /// ISO 4217 currency code.
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

impl Default for Totals {
    fn default() -> Self {
        Self {
            subtotal: None,
            tax: None,
            total: None,
            currency: default_currency(),
        }
    }
}

impl Totals {
    pub fn merge(&mut self, other: Totals) {
        fill(&mut self.subtotal, other.subtotal);
        fill(&mut self.tax, other.tax);
        fill(&mut self.total, other.total);
        if self.currency == DEFAULT_CURRENCY && other.currency != DEFAULT_CURRENCY {
            self.currency = other.currency;
        }
    }
}

/// Structured invoice content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceData {
    pub invoice_number: Option<String>,
    /// Issue date.
    #[serde(rename = "date")]
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub vendor: Option<Entity>,
    pub customer: Option<Entity>,
    pub totals: Option<Totals>,
    /// Lines in document order; empty when none were found.
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    pub notes: Option<String>,
    pub payment_terms: Option<String>,
}

impl InvoiceData {
    /// An invoice carrying nothing but a note.
    pub fn with_notes(notes: impl Into<String>) -> Self {
        Self {
            notes: Some(notes.into()),
            ..Self::default()
        }
    }

    /// True when no structured field is set (notes are not counted).
    pub fn is_unstructured(&self) -> bool {
        self.invoice_number.is_none()
            && self.issue_date.is_none()
            && self.due_date.is_none()
            && self.vendor.is_none()
            && self.customer.is_none()
            && self.totals.is_none()
            && self.line_items.is_empty()
            && self.payment_terms.is_none()
    }

    /// Fold a later fragment (for example the next page) into this one.
    ///
    /// Values already present win; line items are appended in order.
    pub fn merge(&mut self, other: InvoiceData) {
        fill(&mut self.invoice_number, other.invoice_number);
        fill(&mut self.issue_date, other.issue_date);
        fill(&mut self.due_date, other.due_date);
        merge_nested(&mut self.vendor, other.vendor, Entity::merge);
        merge_nested(&mut self.customer, other.customer, Entity::merge);
        merge_nested(&mut self.totals, other.totals, Totals::merge);
        self.line_items.extend(other.line_items);
        fill(&mut self.notes, other.notes);
        fill(&mut self.payment_terms, other.payment_terms);
    }
}

fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
    if slot.is_none() {
        *slot = value;
    }
}

fn merge_nested<T>(slot: &mut Option<T>, value: Option<T>, merge: fn(&mut T, T)) {
    if let Some(next) = value {
        match slot {
            Some(current) => merge(current, next),
            None => *slot = Some(next),
        }
    }
}

/// Outcome of processing one document.
///
/// Built only through [`ProcessingResult::success`] and
/// [`ProcessingResult::failure`], so a successful result always carries data
/// and a failed one always carries an error message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingResult {
    success: bool,
    invoice_data: Option<InvoiceData>,
    error_message: Option<String>,
    /// Wall-clock duration in seconds.
    processing_time: Option<f64>,
    confidence_score: Option<f64>,
}

impl ProcessingResult {
    pub fn success(invoice_data: InvoiceData, processing_time: f64) -> Self {
        Self {
            success: true,
            invoice_data: Some(invoice_data),
            error_message: None,
            processing_time: Some(processing_time),
            confidence_score: Some(PLACEHOLDER_CONFIDENCE),
        }
    }

    pub fn failure(error_message: impl Into<String>, processing_time: f64) -> Self {
        Self {
            success: false,
            invoice_data: None,
            error_message: Some(error_message.into()),
            processing_time: Some(processing_time),
            confidence_score: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn invoice_data(&self) -> Option<&InvoiceData> {
        self.invoice_data.as_ref()
    }

    pub fn into_invoice_data(self) -> Option<InvoiceData> {
        self.invoice_data
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn processing_time(&self) -> Option<f64> {
        self.processing_time
    }

    pub fn confidence_score(&self) -> Option<f64> {
        self.confidence_score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_result_invariants() {
        let ok = ProcessingResult::success(InvoiceData::default(), 1.5);
        assert!(ok.is_success());
        assert!(ok.invoice_data().is_some());
        assert_eq!(ok.error_message(), None);
        assert_eq!(ok.confidence_score(), Some(0.9));

        let failed = ProcessingResult::failure("Processing failed: boom", 0.2);
        assert!(!failed.is_success());
        assert!(failed.invoice_data().is_none());
        assert_eq!(failed.error_message(), Some("Processing failed: boom"));
        assert_eq!(failed.processing_time(), Some(0.2));

        assert_eq!(ok.into_invoice_data(), Some(InvoiceData::default()));
        assert_eq!(failed.into_invoice_data(), None);
    }

    #[test]
    fn test_serialization_shape() {
        let invoice = InvoiceData {
            invoice_number: Some("INV-001".to_string()),
            issue_date: NaiveDate::from_ymd_opt(2024, 1, 15),
            totals: Some(Totals {
                total: Some(dec("1234.50")),
                ..Totals::default()
            }),
            ..InvoiceData::default()
        };

        let value = serde_json::to_value(&invoice).unwrap();
        assert_eq!(value["date"], "2024-01-15");
        assert_eq!(value["totals"]["total"], "1234.50");
        assert_eq!(value["totals"]["currency"], "USD");
        assert_eq!(value["line_items"], serde_json::json!([]));
        assert!(value["vendor"].is_null());
    }

    #[test]
    fn test_decimal_round_trip() {
        let item = LineItem {
            quantity: Some(dec("3")),
            unit_price: Some(dec("0.1")),
            total: Some(dec("0.30")),
            ..LineItem::default()
        };
        let json = serde_json::to_string(&item).unwrap();
        let back: LineItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_merge_keeps_first_values() {
        let mut first = InvoiceData {
            invoice_number: Some("A-1".to_string()),
            vendor: Some(Entity {
                name: Some("Acme".to_string()),
                ..Entity::default()
            }),
            line_items: vec![LineItem {
                description: Some("Widget".to_string()),
                ..LineItem::default()
            }],
            ..InvoiceData::default()
        };
        let second = InvoiceData {
            invoice_number: Some("B-2".to_string()),
            vendor: Some(Entity {
                name: Some("Other".to_string()),
                email: Some("billing@acme.test".to_string()),
                ..Entity::default()
            }),
            totals: Some(Totals {
                total: Some(dec("10")),
                currency: "EUR".to_string(),
                ..Totals::default()
            }),
            line_items: vec![LineItem {
                description: Some("Gadget".to_string()),
                ..LineItem::default()
            }],
            ..InvoiceData::default()
        };

        first.merge(second);

        assert_eq!(first.invoice_number.as_deref(), Some("A-1"));
        let vendor = first.vendor.as_ref().unwrap();
        assert_eq!(vendor.name.as_deref(), Some("Acme"));
        assert_eq!(vendor.email.as_deref(), Some("billing@acme.test"));
        assert_eq!(first.totals.as_ref().unwrap().currency, "EUR");
        let descriptions: Vec<_> = first
            .line_items
            .iter()
            .filter_map(|i| i.description.as_deref())
            .collect();
        assert_eq!(descriptions, vec!["Widget", "Gadget"]);
    }
}

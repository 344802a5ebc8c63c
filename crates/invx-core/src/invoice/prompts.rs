//! Task instruction sent to the vision backend.

/// Fixed instruction for invoice extraction.
///
/// Field names match the keys [`super::ResponseParser`] looks for first.
pub const INVOICE_INSTRUCTION: &str = r#"You are an expert invoice data extraction system.
Extract structured data from the provided invoice document.

Extract the following information:
- Invoice number
- Issue date and due date
- Vendor/supplier information (name, address, tax ID, contact details)
- Customer/bill-to information (name, address)
- Line items with descriptions, quantities, unit prices and totals
- Subtotal, tax amount and grand total
- Payment terms and notes

Respond with a single JSON object using this structure:
{
  "invoice_number": string,
  "date": "YYYY-MM-DD",
  "due_date": "YYYY-MM-DD",
  "vendor": {"name": string, "address": {"street": string, "city": string, "state": string, "zip_code": string, "country": string}, "tax_id": string, "email": string, "phone": string},
  "customer": {"name": string, "address": {"street": string, "city": string, "state": string, "zip_code": string, "country": string}, "tax_id": string, "email": string, "phone": string},
  "line_items": [{"description": string, "quantity": number, "unit_price": number, "total": number, "tax_rate": number}],
  "totals": {"subtotal": number, "tax": number, "total": number, "currency": "ISO 4217 code"},
  "payment_terms": string,
  "notes": string
}

Be precise with numbers and dates: copy amounts exactly as printed, without rounding.
If information is not available, use null."#;

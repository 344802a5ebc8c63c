//! Turning backend output into invoice records.

mod parser;
pub mod prompts;
pub mod rules;

pub use parser::{InvoiceParser, ResponseParser};
pub use prompts::INVOICE_INSTRUCTION;

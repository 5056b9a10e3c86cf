//! Extraction prompts, one per record type.
//!
//! Each prompt enumerates the exact field set the model must return so the reply can be mapped
//! onto the outbound record without guessing key names.

use crate::types::RecordType;

/// Fields requested for a statement
pub const STATEMENT_FIELDS: &[&str] = &[
    "clientName",
    "bank",
    "cardType",
    "cardNumber",
    "currency",
    "statementPeriodStart",
    "statementPeriodEnd",
    "statementDate",
    "dueDate",
    "dueAmount",
    "outstandingBal",
];

/// Fields requested for a transaction receipt
pub const TRANSACTION_FIELDS: &[&str] = &[
    "date",
    "bank",
    "cardType",
    "cardNumber",
    "currency",
    "cashOutAmount",
    "installmentPlan",
    "point",
    "category",
    "transactionId",
];

const STATEMENT_PROMPT: &str = r#"You are reading a credit card statement. Extract the following information and return ONLY a valid JSON object, with no explanation and no markdown:
{
  "clientName": "cardholder name as printed on the statement",
  "bank": "issuing bank name",
  "cardType": "card network or product, e.g. Visa, Mastercard, Amex",
  "cardNumber": "last 4 digits of the card number only",
  "currency": "3-letter currency code, e.g. MYR",
  "statementPeriodStart": "YYYY-MM-DD",
  "statementPeriodEnd": "YYYY-MM-DD",
  "statementDate": "YYYY-MM-DD",
  "dueDate": "YYYY-MM-DD",
  "dueAmount": number,
  "outstandingBal": number
}
Use null for any field that is not visible on the document."#;

const TRANSACTION_PROMPT: &str = r#"You are reading a credit card transaction receipt. Extract the following information and return ONLY a valid JSON object, with no explanation and no markdown:
{
  "date": "YYYY-MM-DD",
  "bank": "issuing bank name",
  "cardType": "card network or product, e.g. Visa, Mastercard, Amex",
  "cardNumber": "last 4 digits of the card number only",
  "currency": "3-letter currency code, e.g. MYR",
  "cashOutAmount": number,
  "installmentPlan": "installment plan description, or null",
  "point": number,
  "category": "spending category, e.g. Dining, Travel, Groceries",
  "transactionId": "reference or approval code"
}
Use null for any field that is not visible on the document."#;

pub fn for_record_type(record_type: RecordType) -> &'static str {
    match record_type {
        RecordType::Statement => STATEMENT_PROMPT,
        RecordType::Transaction => TRANSACTION_PROMPT,
    }
}

pub fn fields_for(record_type: RecordType) -> &'static [&'static str] {
    match record_type {
        RecordType::Statement => STATEMENT_FIELDS,
        RecordType::Transaction => TRANSACTION_FIELDS,
    }
}

//! Normalized records sent to the destination webhooks by the extraction flow.
//!
//! The model's reply is not validated against a schema: whatever keys it returned are kept in
//! [`ExtractionResult`], and the mapping below picks the known ones. Missing keys end up as
//! `null` in the outbound JSON so the webhook always sees the full field set.
//!
//! Two defaults apply:
//! - `currency` falls back to [`DEFAULT_CURRENCY`] when absent, `null` or blank.
//! - A statement's `clientName` prefers what the model read from the document and falls back to
//!   the submitted form value.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::RecordType;

pub const DEFAULT_CURRENCY: &str = "MYR";

/// Fields extracted by the model, keyed as in its reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractionResult(Map<String, Value>);

impl ExtractionResult {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Value of a field, treating JSON `null` as absent.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    fn field(&self, key: &str) -> Value {
        self.get(key).cloned().unwrap_or(Value::Null)
    }

    fn non_blank(&self, key: &str) -> Option<Value> {
        match self.get(key)? {
            Value::String(s) if s.trim().is_empty() => None,
            other => Some(other.clone()),
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }
}

/// Submitted form values that flow into the outbound record.
#[derive(Debug, Clone, Default)]
pub struct Submission<'a> {
    pub client_name: Option<&'a str>,
    pub payment_by: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementRecord {
    pub client_name: Value,
    pub payment_by: Value,
    pub bank: Value,
    pub card_type: Value,
    pub card_number: Value,
    pub currency: Value,
    pub statement_period_start: Value,
    pub statement_period_end: Value,
    pub statement_date: Value,
    pub due_date: Value,
    pub due_amount: Value,
    pub outstanding_bal: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub client_name: Value,
    pub payment_by: Value,
    pub date: Value,
    pub bank: Value,
    pub card_type: Value,
    pub card_number: Value,
    pub currency: Value,
    pub cash_out_amount: Value,
    pub installment_plan: Value,
    pub point: Value,
    pub category: Value,
    pub transaction_id: Value,
}

/// JSON body posted to the destination, discriminated by `recordType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "recordType", rename_all = "lowercase")]
pub enum OutboundRecord {
    Statement(StatementRecord),
    Transaction(TransactionRecord),
}

impl OutboundRecord {
    pub fn record_type(&self) -> RecordType {
        match self {
            OutboundRecord::Statement(_) => RecordType::Statement,
            OutboundRecord::Transaction(_) => RecordType::Transaction,
        }
    }

    /// Map an extraction result onto the record shape for `record_type`.
    pub fn from_extraction(record_type: RecordType, extracted: &ExtractionResult, submission: &Submission<'_>) -> Self {
        let submitted = |value: Option<&str>| value.map(|v| Value::String(v.to_string())).unwrap_or(Value::Null);
        let currency = extracted
            .non_blank("currency")
            .unwrap_or_else(|| Value::String(DEFAULT_CURRENCY.to_string()));

        match record_type {
            RecordType::Statement => OutboundRecord::Statement(StatementRecord {
                client_name: extracted
                    .non_blank("clientName")
                    .unwrap_or_else(|| submitted(submission.client_name)),
                payment_by: submitted(submission.payment_by),
                bank: extracted.field("bank"),
                card_type: extracted.field("cardType"),
                card_number: extracted.field("cardNumber"),
                currency,
                statement_period_start: extracted.field("statementPeriodStart"),
                statement_period_end: extracted.field("statementPeriodEnd"),
                statement_date: extracted.field("statementDate"),
                due_date: extracted.field("dueDate"),
                due_amount: extracted.field("dueAmount"),
                outstanding_bal: extracted.field("outstandingBal"),
            }),
            RecordType::Transaction => OutboundRecord::Transaction(TransactionRecord {
                client_name: submitted(submission.client_name),
                payment_by: submitted(submission.payment_by),
                date: extracted.field("date"),
                bank: extracted.field("bank"),
                card_type: extracted.field("cardType"),
                card_number: extracted.field("cardNumber"),
                currency,
                cash_out_amount: extracted.field("cashOutAmount"),
                installment_plan: extracted.field("installmentPlan"),
                point: extracted.field("point"),
                category: extracted.field("category"),
                transaction_id: extracted.field("transactionId"),
            }),
        }
    }
}

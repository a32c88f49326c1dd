//! Core data models for the financial canvas

use crate::error::CanvasError;
use crate::Result;
use chrono::{DateTime, NaiveDateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

//
// ================= Attachments =================
//

/// A file registered with the backend asset store.
///
/// The `uri` is an opaque reference returned by the upload call and is the
/// only thing later generation calls need; the local path is kept for
/// display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttachedFile {
    pub uri: String,
    pub media_type: Option<String>,
    pub local_path: String,
}

//
// ================= Nodes =================
//

/// A single debit or credit line
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct AccountEntry {
    /// Amount as a decimal string, e.g. "1500.00"
    pub amount: String,
    /// Account the entry posts to, e.g. "Cash"
    pub account: String,
}

/// A grouped business transaction: a name plus ordered debit and credit lines
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Transaction {
    pub name: String,
    pub debits: Vec<AccountEntry>,
    pub credits: Vec<AccountEntry>,
}

/// A canvas node: one business event extracted from the conversation.
///
/// Nodes are flat records; edges between nodes are never modeled as data.
/// Extraction is purely additive: every call appends its nodes to the
/// session record list with no identity beyond `node_name` and no
/// de-duplication.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Node {
    pub node_name: String,
    pub constraints: Option<Vec<String>>,
    pub transaction: Option<Vec<Transaction>>,
    pub transaction_description: Option<String>,
    /// ISO-8601 timestamp, required
    pub absolute_start_utc: String,
    pub absolute_end_utc: Option<String>,
    pub start_offset_rule: Option<String>,
    pub end_offset_rule: Option<String>,
    pub recurrence_rule: Option<String>,
    #[serde(default)]
    pub expected_value: f64,
}

impl Node {
    /// Validate the invariants the response schema cannot express:
    /// a non-empty name and parseable timestamps.
    pub fn validate(&self) -> Result<()> {
        if self.node_name.trim().is_empty() {
            return Err(CanvasError::ExtractionError(
                "node_name must not be empty".to_string(),
            ));
        }

        parse_timestamp(&self.absolute_start_utc).map_err(|e| {
            CanvasError::ExtractionError(format!(
                "invalid absolute_start_utc for node '{}': {}",
                self.node_name, e
            ))
        })?;

        if let Some(end) = &self.absolute_end_utc {
            parse_timestamp(end).map_err(|e| {
                CanvasError::ExtractionError(format!(
                    "invalid absolute_end_utc for node '{}': {}",
                    self.node_name, e
                ))
            })?;
        }

        Ok(())
    }
}

/// Parse an ISO-8601 timestamp.
///
/// Accepts RFC 3339 (`2026-01-01T00:00:00Z`) and, since models frequently
/// omit the offset, a naive `YYYY-MM-DDTHH:MM:SS[.f]` interpreted as UTC.
pub fn parse_timestamp(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    Err(format!("'{}' is not an ISO-8601 timestamp", value))
}

//
// ================= Display =================
//

fn write_opt(f: &mut fmt::Formatter<'_>, label: &str, value: &Option<String>) -> fmt::Result {
    match value {
        Some(v) => writeln!(f, "  {}: {}", label, v),
        None => writeln!(f, "  {}: None", label),
    }
}

impl fmt::Display for AccountEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.amount, self.account)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Node: {}", self.node_name)?;

        match &self.constraints {
            Some(constraints) => writeln!(f, "  constraints: [{}]", constraints.join(", "))?,
            None => writeln!(f, "  constraints: None")?,
        }

        match &self.transaction {
            Some(transactions) => {
                writeln!(f, "  transactions:")?;
                for tx in transactions {
                    let debits: Vec<String> = tx.debits.iter().map(|e| e.to_string()).collect();
                    let credits: Vec<String> = tx.credits.iter().map(|e| e.to_string()).collect();
                    writeln!(
                        f,
                        "    {} | debits [{}] | credits [{}]",
                        tx.name,
                        debits.join(", "),
                        credits.join(", ")
                    )?;
                }
            }
            None => writeln!(f, "  transactions: None")?,
        }

        write_opt(f, "transaction_description", &self.transaction_description)?;
        writeln!(f, "  absolute_start_utc: {}", self.absolute_start_utc)?;
        write_opt(f, "absolute_end_utc", &self.absolute_end_utc)?;
        write_opt(f, "start_offset_rule", &self.start_offset_rule)?;
        write_opt(f, "end_offset_rule", &self.end_offset_rule)?;
        write_opt(f, "recurrence_rule", &self.recurrence_rule)?;
        write!(f, "  expected_value: {}", self.expected_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_node(name: &str) -> Node {
        Node {
            node_name: name.to_string(),
            constraints: None,
            transaction: None,
            transaction_description: None,
            absolute_start_utc: "2026-01-01T00:00:00Z".to_string(),
            absolute_end_utc: None,
            start_offset_rule: None,
            end_offset_rule: None,
            recurrence_rule: None,
            expected_value: 0.0,
        }
    }

    #[test]
    fn test_expected_value_defaults_to_zero() {
        let json = r#"{
            "node_name": "Initial funding",
            "absolute_start_utc": "2026-01-01T00:00:00Z"
        }"#;

        let node: Node = serde_json::from_str(json).unwrap();
        assert_eq!(node.expected_value, 0.0);
        assert!(node.constraints.is_none());
        assert!(node.transaction.is_none());
    }

    #[test]
    fn test_missing_required_field_is_a_decode_error() {
        // No absolute_start_utc
        let json = r#"{"node_name": "Broken"}"#;
        assert!(serde_json::from_str::<Node>(json).is_err());

        // No node_name
        let json = r#"{"absolute_start_utc": "2026-01-01T00:00:00Z"}"#;
        assert!(serde_json::from_str::<Node>(json).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        let mut node = minimal_node("  ");
        assert!(node.validate().is_err());

        node.node_name = "Payroll".to_string();
        assert!(node.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_timestamp() {
        let mut node = minimal_node("Payroll");
        node.absolute_start_utc = "next tuesday".to_string();
        let err = node.validate().unwrap_err().to_string();
        assert!(err.contains("absolute_start_utc"));
    }

    #[test]
    fn test_timestamp_formats() {
        assert!(parse_timestamp("2026-01-01T00:00:00Z").is_ok());
        assert!(parse_timestamp("2026-01-01T00:00:00+05:30").is_ok());
        assert!(parse_timestamp("2026-01-01T00:00:00").is_ok());
        assert!(parse_timestamp("2026-01-01T00:00:00.250").is_ok());
        assert!(parse_timestamp("2026-01-01").is_err());
    }

    #[test]
    fn test_transaction_round_trip() {
        let json = r#"{
            "node_name": "Office lease",
            "transaction": [{
                "name": "Monthly rent",
                "debits": [{"amount": "2500.00", "account": "Rent Expense"}],
                "credits": [{"amount": "2500.00", "account": "Cash"}]
            }],
            "absolute_start_utc": "2026-02-01T00:00:00Z",
            "recurrence_rule": "monthly",
            "expected_value": -2500.0
        }"#;

        let node: Node = serde_json::from_str(json).unwrap();
        let tx = &node.transaction.as_ref().unwrap()[0];
        assert_eq!(tx.debits[0].account, "Rent Expense");
        assert_eq!(tx.credits[0].amount, "2500.00");
        assert_eq!(node.expected_value, -2500.0);
        assert!(node.validate().is_ok());
    }

    #[test]
    fn test_node_display_shows_absent_fields() {
        let node = minimal_node("Seed round");
        let rendered = node.to_string();
        assert!(rendered.contains("Node: Seed round"));
        assert!(rendered.contains("constraints: None"));
        assert!(rendered.contains("transactions: None"));
        assert!(rendered.contains("recurrence_rule: None"));
        assert!(rendered.contains("expected_value: 0"));
    }
}

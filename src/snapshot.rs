//! Snapshot records shipped to the collector.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity attached to a security finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A redaction performed on one captured variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityFinding {
    /// `sensitive_variable_name` or `sensitive_data_<pattern>`
    pub category: String,
    pub severity: Severity,
    /// Name of the variable whose value was redacted
    pub variable: String,
}

/// Where in application code a capture call was made
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    pub file_path: String,
    pub line_number: u32,
    pub function_name: String,
}

/// One recorded capture event.
///
/// Built once per successful capture, handed to the transport by reference
/// and dropped afterwards. Variables are already redacted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: Uuid,
    pub breakpoint_id: String,
    pub service: String,
    pub label: String,
    pub location: SourceLocation,
    pub variables: BTreeMap<String, serde_json::Value>,
    pub findings: Vec<SecurityFinding>,
    pub stack_trace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_context: Option<BTreeMap<String, String>>,
    pub captured_at: DateTime<Utc>,
}

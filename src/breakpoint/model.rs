use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::snapshot::SourceLocation;

/// Cache key for the stable `function:label` identity
pub fn primary_key(function_name: &str, label: &str) -> String {
    format!("{function_name}:{label}")
}

/// Cache key for the `file:line` identity
pub fn location_key(file_path: &str, line_number: u32) -> String {
    format!("{file_path}:{line_number}")
}

/// Server-defined policy for a capture point.
///
/// Held read-only on the client. `capture_count` is authoritative on the
/// server and is never incremented locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointConfig {
    pub id: String,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub function_name: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub line_number: Option<u32>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub expire_at: Option<DateTime<Utc>>,
    /// Zero or negative means unlimited
    #[serde(default)]
    pub max_captures: i64,
    #[serde(default)]
    pub capture_count: i64,
    /// Opaque predicate expression; stored but not evaluated
    #[serde(default)]
    pub condition: Option<String>,
}

fn default_enabled() -> bool {
    true
}

/// Result of checking a breakpoint's policy at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakpointVerdict {
    Armed,
    Disabled,
    Expired,
    BudgetExhausted,
}

impl BreakpointConfig {
    /// Enabled, unlimited breakpoint keyed by `function:label`
    pub fn new(
        id: impl Into<String>,
        function_name: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            service: String::new(),
            function_name: Some(function_name.into()),
            label: Some(label.into()),
            file_path: None,
            line_number: None,
            enabled: true,
            expire_at: None,
            max_captures: 0,
            capture_count: 0,
            condition: None,
        }
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    pub fn with_location(mut self, file_path: impl Into<String>, line_number: u32) -> Self {
        self.file_path = Some(file_path.into());
        self.line_number = Some(line_number);
        self
    }

    pub fn with_budget(mut self, max_captures: i64, capture_count: i64) -> Self {
        self.max_captures = max_captures;
        self.capture_count = capture_count;
        self
    }

    pub fn expiring_at(mut self, expire_at: DateTime<Utc>) -> Self {
        self.expire_at = Some(expire_at);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn primary_key(&self) -> Option<String> {
        match (&self.function_name, &self.label) {
            (Some(function_name), Some(label)) => Some(primary_key(function_name, label)),
            _ => None,
        }
    }

    pub fn location_key(&self) -> Option<String> {
        match (&self.file_path, self.line_number) {
            (Some(file_path), Some(line_number)) => Some(location_key(file_path, line_number)),
            _ => None,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expire_at.is_some_and(|expire_at| now > expire_at)
    }

    pub fn budget_exhausted(&self) -> bool {
        self.max_captures > 0 && self.capture_count >= self.max_captures
    }

    /// Check enabled, expiry and budget, in that order
    pub fn verdict(&self, now: DateTime<Utc>) -> BreakpointVerdict {
        if !self.enabled {
            BreakpointVerdict::Disabled
        } else if self.is_expired_at(now) {
            BreakpointVerdict::Expired
        } else if self.budget_exhausted() {
            BreakpointVerdict::BudgetExhausted
        } else {
            BreakpointVerdict::Armed
        }
    }
}

/// Local identity of a capture point, resolvable by either key form
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CapturePointIdentity {
    pub function_name: String,
    pub label: String,
    pub file_path: String,
    pub line_number: u32,
}

impl CapturePointIdentity {
    pub fn new(location: &SourceLocation, label: impl Into<String>) -> Self {
        Self {
            function_name: location.function_name.clone(),
            label: label.into(),
            file_path: location.file_path.clone(),
            line_number: location.line_number,
        }
    }

    pub fn primary_key(&self) -> String {
        primary_key(&self.function_name, &self.label)
    }

    pub fn location_key(&self) -> String {
        location_key(&self.file_path, self.line_number)
    }
}

impl std::fmt::Display for CapturePointIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}:{})",
            self.primary_key(),
            self.file_path,
            self.line_number
        )
    }
}

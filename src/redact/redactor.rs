use std::collections::BTreeMap;

use regex::Regex;
use serde_json::Value;

use super::value::CaptureValues;
use crate::snapshot::{SecurityFinding, Severity};

/// Replacement for any redacted value
pub const REDACTED: &str = "[REDACTED]";

/// Finding category for a variable redacted because of its name
pub const SENSITIVE_VARIABLE_NAME: &str = "sensitive_variable_name";

/// Variable-name terms that trigger whole-value redaction (case-insensitive substring)
pub const SENSITIVE_NAME_TERMS: &[&str] = &["password", "secret", "token", "key", "credential"];

/// A named value pattern; a match produces `sensitive_data_<name>`
#[derive(Debug, Clone)]
pub struct ValuePattern {
    name: String,
    regex: Regex,
    /// Extra test a regex match must pass to count
    check: Option<fn(&str) -> bool>,
}

impl ValuePattern {
    pub fn new(name: impl Into<String>, regex: Regex) -> Self {
        Self {
            name: name.into(),
            regex,
            check: None,
        }
    }

    pub fn with_check(mut self, check: fn(&str) -> bool) -> Self {
        self.check = Some(check);
        self
    }

    pub fn matches(&self, text: &str) -> bool {
        match self.check {
            Some(check) => self.regex.find_iter(text).any(|m| check(m.as_str())),
            None => self.regex.is_match(text),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> String {
        format!("sensitive_data_{}", self.name)
    }
}

/// Sanitized variables plus what was redacted from them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Redaction {
    pub variables: BTreeMap<String, Value>,
    pub findings: Vec<SecurityFinding>,
}

#[derive(Debug, Clone)]
pub struct Redactor {
    name_terms: Vec<String>,
    value_patterns: Vec<ValuePattern>,
}

impl Redactor {
    pub fn new(name_terms: Vec<String>, value_patterns: Vec<ValuePattern>) -> Self {
        Self {
            name_terms: name_terms
                .into_iter()
                .map(|term| term.to_ascii_lowercase())
                .collect(),
            value_patterns,
        }
    }

    pub fn default_name_terms() -> Vec<String> {
        SENSITIVE_NAME_TERMS.iter().map(|t| t.to_string()).collect()
    }

    /// Value patterns in the order they are tried: `password`, `api_key`,
    /// `jwt`, `credit_card`. The first match wins.
    ///
    /// The patterns over-redact: any `password=`/`token:` style assignment
    /// counts, whatever the value. `credit_card` requires 13 to 16 digits
    /// (optionally space or dash separated) that pass the Luhn checksum, so
    /// plain ids and epoch timestamps mostly survive, but some of them
    /// still checksum by chance and get redacted.
    pub fn default_value_patterns() -> Vec<ValuePattern> {
        // The `regex` crate has no look-around; keep the patterns plain.
        let raw = [
            ("password", r#"(?i)password["']?\s*[:=]\s*\S+"#),
            (
                "api_key",
                r#"(?i)(api[_-]?key|token|secret)["']?\s*[:=]\s*["']?[A-Za-z0-9_\-]{16,}"#,
            ),
            (
                "jwt",
                r"eyJ[A-Za-z0-9_-]{4,}\.[A-Za-z0-9_-]{4,}\.[A-Za-z0-9_-]{4,}",
            ),
            ("credit_card", r"\b(?:\d[ -]?){12,15}\d\b"),
        ];
        raw.into_iter()
            .filter_map(|(name, p)| Regex::new(p).ok().map(|re| ValuePattern::new(name, re)))
            .map(|pattern| match pattern.name() {
                "credit_card" => pattern.with_check(luhn_valid),
                _ => pattern,
            })
            .collect()
    }

    pub fn value_patterns(&self) -> &[ValuePattern] {
        &self.value_patterns
    }

    /// Produce the sanitized variable map and its findings.
    ///
    /// Every input key is present in the output.
    pub fn redact(&self, values: &CaptureValues) -> Redaction {
        let mut redaction = Redaction::default();

        for (name, value) in values {
            let wire = value.to_wire();

            if self.is_sensitive_name(name) {
                redaction
                    .variables
                    .insert(name.clone(), Value::String(REDACTED.to_string()));
                redaction.findings.push(SecurityFinding {
                    category: SENSITIVE_VARIABLE_NAME.to_string(),
                    severity: Severity::Medium,
                    variable: name.clone(),
                });
                continue;
            }

            let text = match &wire {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };

            match self.match_value(&text) {
                Some(pattern) => {
                    redaction
                        .variables
                        .insert(name.clone(), Value::String(REDACTED.to_string()));
                    redaction.findings.push(SecurityFinding {
                        category: pattern.category(),
                        severity: Severity::High,
                        variable: name.clone(),
                    });
                }
                None => {
                    redaction.variables.insert(name.clone(), wire);
                }
            }
        }

        redaction
    }

    pub fn is_sensitive_name(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        self.name_terms.iter().any(|term| name.contains(term.as_str()))
    }

    /// First value pattern matching `text`
    pub fn match_value(&self, text: &str) -> Option<&ValuePattern> {
        self.value_patterns.iter().find(|p| p.matches(text))
    }
}

/// Luhn checksum over the digits of `candidate`, ignoring separators
pub fn luhn_valid(candidate: &str) -> bool {
    let digits: Vec<u32> = candidate.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() < 13 {
        return false;
    }

    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new(Self::default_name_terms(), Self::default_value_patterns())
    }
}

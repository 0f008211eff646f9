//! Compliance sanitizer for client-visible output
//!
//! Scans any serializable value for vendor list codes, vendor brand mentions and
//! forbidden phrasing. The scan is a safety net behind the abstraction layer:
//! production paths log what it finds, the test suite asserts on it.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use super::entities::AbstractedSignal;

/// Which disallowed-term list a violation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViolationCategory {
    ListName,
    Vendor,
    Language,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceViolation {
    pub term: String,
    pub category: ViolationCategory,
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub compliant: bool,
    pub violations: Vec<ComplianceViolation>,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Compliance violation in {context}: {}", summarize(.violations))]
pub struct ComplianceError {
    pub context: String,
    pub violations: Vec<ComplianceViolation>,
}

/// Vendor list and product short codes, matched as whole tokens
const LIST_NAME_TERMS: &[&str] = &[
    "SBL", "XBL", "PBL", "CSS", "DBL", "ZRD", "DROP", "EDROP", "BCL", "HBL", "AuthBL", "ZEN",
    "SIA", "DQS",
];

/// Vendor brand and domain mentions, matched anywhere
const VENDOR_TERMS: &[&str] = &[
    "spamhaus",
    "spamhaus.org",
    "spamhaus.com",
    "spamhaus.net",
    "spamhaus project",
];

/// Phrasing that implies list membership, matched anywhere
const LANGUAGE_TERMS: &[&str] = &[
    "blacklist",
    "blocklist",
    "block list",
    "black list",
    "listed on",
    "listed in",
    "blocked by",
];

const CONTEXT_RADIUS: usize = 20;

struct TermMatcher {
    term: &'static str,
    category: ViolationCategory,
    pattern: Regex,
}

static MATCHERS: Lazy<Vec<TermMatcher>> = Lazy::new(|| {
    let tokens = LIST_NAME_TERMS.iter().map(|term| {
        (
            *term,
            ViolationCategory::ListName,
            format!(r"(?i)\b{}\b", regex::escape(term)),
        )
    });
    let vendor = VENDOR_TERMS.iter().map(|term| {
        (
            *term,
            ViolationCategory::Vendor,
            format!("(?i){}", regex::escape(term)),
        )
    });
    let language = LANGUAGE_TERMS.iter().map(|term| {
        (
            *term,
            ViolationCategory::Language,
            format!("(?i){}", regex::escape(term)),
        )
    });

    tokens
        .chain(vendor)
        .chain(language)
        .filter_map(|(term, category, pattern)| {
            Regex::new(&pattern).ok().map(|pattern| TermMatcher {
                term,
                category,
                pattern,
            })
        })
        .collect()
});

/// Scan any serializable value; values that fail to serialize are reported compliant
pub fn check_compliance<T: Serialize + ?Sized>(value: &T) -> ComplianceReport {
    match serde_json::to_value(value) {
        Ok(json) => check_compliance_value(&json),
        Err(e) => {
            warn!("Compliance scan skipped, value not serializable: {}", e);
            ComplianceReport {
                compliant: true,
                violations: Vec::new(),
            }
        }
    }
}

pub fn check_compliance_value(value: &Value) -> ComplianceReport {
    let mut text = String::new();
    flatten_into(value, &mut text);

    let violations: Vec<ComplianceViolation> = MATCHERS
        .iter()
        .filter_map(|matcher| {
            matcher.pattern.find(&text).map(|found| ComplianceViolation {
                term: matcher.term.to_string(),
                category: matcher.category,
                context: snippet(&text, found.start(), found.end()),
            })
        })
        .collect();

    ComplianceReport {
        compliant: violations.is_empty(),
        violations,
    }
}

/// Non-panicking check for callers that want a typed error
pub fn ensure_compliant<T: Serialize + ?Sized>(
    value: &T,
    context: &str,
) -> Result<(), ComplianceError> {
    let report = check_compliance(value);
    if report.compliant {
        Ok(())
    } else {
        Err(ComplianceError {
            context: context.to_string(),
            violations: report.violations,
        })
    }
}

/// Test-suite assertion; panics listing every violation found
pub fn assert_no_disallowed_fields<T: Serialize + ?Sized>(value: &T, context: &str) {
    if let Err(e) = ensure_compliant(value, context) {
        panic!("{}", e);
    }
}

/// Runtime safety net: logs violations and reports whether the signal is clean
pub fn validate_signal_compliance(signal: &AbstractedSignal) -> bool {
    let report = check_compliance(signal);
    if !report.compliant {
        warn!(
            provider = %signal.provider,
            input_type = %signal.input_type,
            violations = report.violations.len(),
            "Signal failed compliance scan: {}",
            summarize(&report.violations)
        );
    }
    report.compliant
}

fn summarize(violations: &[ComplianceViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("\"{}\" ({:?}) near \"{}\"", v.term, v.category, v.context))
        .collect::<Vec<_>>()
        .join(", ")
}

fn flatten_into(value: &Value, out: &mut String) {
    match value {
        Value::Null => {}
        Value::Bool(b) => push_token(out, &b.to_string()),
        Value::Number(n) => push_token(out, &n.to_string()),
        Value::String(s) => push_token(out, s),
        Value::Array(items) => items.iter().for_each(|item| flatten_into(item, out)),
        Value::Object(map) => {
            for (key, item) in map {
                push_token(out, key);
                flatten_into(item, out);
            }
        }
    }
}

fn push_token(out: &mut String, token: &str) {
    if !out.is_empty() {
        out.push(' ');
    }
    out.push_str(token);
}

fn snippet(text: &str, start: usize, end: usize) -> String {
    let mut from = start.saturating_sub(CONTEXT_RADIUS);
    while !text.is_char_boundary(from) {
        from -= 1;
    }
    let mut to = (end + CONTEXT_RADIUS).min(text.len());
    while !text.is_char_boundary(to) {
        to += 1;
    }
    text[from..to].to_string()
}

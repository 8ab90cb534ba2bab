//! Pure per-field validation rules.
//!
//! # Responsibility
//! - Turn one field value into zero or more user-facing error messages.
//!
//! # Invariants
//! - Rules never perform I/O or consult external state, so they are safe to
//!   re-run on every edit.
//! - Messages are reported in rule declaration order.

use crate::wrapper::field::FieldValue;
use regex::Regex;

/// One validation rule attached to a field descriptor.
#[derive(Debug, Clone)]
pub enum Rule {
    /// Value must not be empty or whitespace-only.
    Required { message: &'static str },
    /// Text must not equal `literal`, compared case-insensitively.
    RejectLiteral {
        literal: &'static str,
        message: &'static str,
    },
    /// Non-empty text must match `pattern`.
    Pattern {
        pattern: Regex,
        message: &'static str,
    },
    /// Non-empty text must not exceed `max` characters.
    MaxLength { max: usize, message: &'static str },
}

impl Rule {
    pub fn required(message: &'static str) -> Self {
        Self::Required { message }
    }

    pub fn reject_literal(literal: &'static str, message: &'static str) -> Self {
        Self::RejectLiteral { literal, message }
    }

    pub fn pattern(pattern: &Regex, message: &'static str) -> Self {
        Self::Pattern {
            pattern: pattern.clone(),
            message,
        }
    }

    pub fn max_length(max: usize, message: &'static str) -> Self {
        Self::MaxLength { max, message }
    }

    /// Returns the rule's message when `value` violates it.
    pub fn check(&self, value: &FieldValue) -> Option<&'static str> {
        match self {
            Self::Required { message } => value.is_blank().then_some(*message),
            Self::RejectLiteral { literal, message } => value
                .as_text()
                .filter(|text| text.eq_ignore_ascii_case(literal))
                .map(|_| *message),
            Self::Pattern { pattern, message } => value
                .as_text()
                .filter(|text| !text.is_empty() && !pattern.is_match(text))
                .map(|_| *message),
            Self::MaxLength { max, message } => value
                .as_text()
                .filter(|text| text.chars().count() > *max)
                .map(|_| *message),
        }
    }
}

/// Runs every rule against `value` and collects the messages.
pub fn validate(rules: &[Rule], value: &FieldValue) -> Vec<String> {
    rules
        .iter()
        .filter_map(|rule| rule.check(value))
        .map(str::to_string)
        .collect()
}

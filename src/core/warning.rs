//! Purpose: Define the structured shape for lenient-mode diagnostics.
//! Exports: `Warning`.
//! Role: Shared contract type attached to envelope and loop nodes.
//! Invariants: Warnings never alter the structural tree they annotate.
//! Invariants: Codes are stable once published; fields are additive-only.

use serde::Serialize;

/// Field order is the serialized key order.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Warning {
    pub code: String,
    pub message: String,
    pub segment_index: Option<u64>,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

impl Warning {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            segment_index: None,
            expected: None,
            actual: None,
        }
    }

    pub fn with_segment_index(mut self, segment_index: u64) -> Self {
        self.segment_index = Some(segment_index);
        self
    }

    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    pub fn with_actual(mut self, actual: impl Into<String>) -> Self {
        self.actual = Some(actual.into());
        self
    }
}

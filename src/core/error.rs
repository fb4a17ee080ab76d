//! Purpose: Typed error modeling for every decode stage and the CLI.
//! Exports: `Error`, `ErrorKind`, `to_exit_code`.
//! Role: Shared failure contract; carries position and mismatch context.
//! Invariants: Kinds and their exit codes are stable once published.
//! Invariants: Errors never carry partial trees, only diagnostic context.
use std::error::Error as StdError;
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    MalformedHeader,
    UnterminatedSegment,
    EmptySegment,
    OutOfOrderSegment,
    UnclosedEnvelope,
    ControlNumberMismatch,
    CountMismatch,
    UnknownParentLoop,
    DuplicateLoopId,
    Canceled,
    Usage,
    Io,
    Internal,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    segment_index: Option<u64>,
    offset: Option<u64>,
    expected: Option<String>,
    actual: Option<String>,
    hint: Option<String>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            segment_index: None,
            offset: None,
            expected: None,
            actual: None,
            hint: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn segment_index(&self) -> Option<u64> {
        self.segment_index
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn expected(&self) -> Option<&str> {
        self.expected.as_deref()
    }

    pub fn actual(&self) -> Option<&str> {
        self.actual.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_segment_index(mut self, segment_index: u64) -> Self {
        self.segment_index = Some(segment_index);
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
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

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(segment_index) = self.segment_index {
            write!(f, " (segment: {segment_index})")?;
        }
        if let Some(offset) = self.offset {
            write!(f, " (offset: {offset})")?;
        }
        if let (Some(expected), Some(actual)) = (&self.expected, &self.actual) {
            write!(f, " (expected: {expected}, actual: {actual})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::Usage => 2,
        ErrorKind::MalformedHeader => 3,
        ErrorKind::UnterminatedSegment => 4,
        ErrorKind::EmptySegment => 5,
        ErrorKind::OutOfOrderSegment => 6,
        ErrorKind::UnclosedEnvelope => 7,
        ErrorKind::ControlNumberMismatch => 8,
        ErrorKind::CountMismatch => 9,
        ErrorKind::UnknownParentLoop => 10,
        ErrorKind::DuplicateLoopId => 11,
        ErrorKind::Canceled => 12,
        ErrorKind::Io => 13,
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind, to_exit_code};

    #[test]
    fn exit_code_mapping_is_stable() {
        let cases = [
            (ErrorKind::Internal, 1),
            (ErrorKind::Usage, 2),
            (ErrorKind::MalformedHeader, 3),
            (ErrorKind::UnterminatedSegment, 4),
            (ErrorKind::EmptySegment, 5),
            (ErrorKind::OutOfOrderSegment, 6),
            (ErrorKind::UnclosedEnvelope, 7),
            (ErrorKind::ControlNumberMismatch, 8),
            (ErrorKind::CountMismatch, 9),
            (ErrorKind::UnknownParentLoop, 10),
            (ErrorKind::DuplicateLoopId, 11),
            (ErrorKind::Canceled, 12),
            (ErrorKind::Io, 13),
        ];

        for (kind, code) in cases {
            assert_eq!(to_exit_code(kind), code);
        }
    }

    #[test]
    fn display_includes_context() {
        let err = Error::new(ErrorKind::CountMismatch)
            .with_message("group count mismatch")
            .with_segment_index(7)
            .with_offset(321)
            .with_expected("3")
            .with_actual("2");
        let rendered = err.to_string();
        assert!(rendered.contains("CountMismatch"));
        assert!(rendered.contains("segment: 7"));
        assert!(rendered.contains("offset: 321"));
        assert!(rendered.contains("expected: 3, actual: 2"));
    }
}

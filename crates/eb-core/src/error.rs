use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The engine could not allocate a runtime or context, or cannot honor the
    /// requested options.
    EngineInit,
    Syntax,
    /// Uncaught guest exception, including errors thrown by host functions.
    Runtime,
    Conversion,
    Timeout,
    UseAfterClose,
    Binding,
    RuntimeInUse,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            Self::EngineInit => "ENGINE_INIT",
            Self::Syntax => "SCRIPT_SYNTAX",
            Self::Runtime => "SCRIPT_RUNTIME",
            Self::Conversion => "VALUE_CONVERSION",
            Self::Timeout => "SCRIPT_TIMEOUT",
            Self::UseAfterClose => "CONTEXT_CLOSED",
            Self::Binding => "CONTEXT_BINDING",
            Self::RuntimeInUse => "RUNTIME_IN_USE",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("{kind}: {message}")]
pub struct BridgeError {
    pub kind: ErrorKind,
    pub message: String,
}

impl BridgeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn engine_init(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::EngineInit, message)
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Syntax, message)
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Runtime, message)
    }

    pub fn conversion(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conversion, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn use_after_close(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UseAfterClose, message)
    }

    pub fn binding(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Binding, message)
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn display_prefixes_message_with_code() {
        let error = BridgeError::syntax("unexpected end of input");
        assert_eq!(error.to_string(), "SCRIPT_SYNTAX: unexpected end of input");
        assert_eq!(error.code(), "SCRIPT_SYNTAX");
    }

    #[test]
    fn every_kind_has_a_distinct_code() {
        let kinds = [
            ErrorKind::EngineInit,
            ErrorKind::Syntax,
            ErrorKind::Runtime,
            ErrorKind::Conversion,
            ErrorKind::Timeout,
            ErrorKind::UseAfterClose,
            ErrorKind::Binding,
            ErrorKind::RuntimeInUse,
        ];
        let codes = kinds
            .iter()
            .map(|kind| kind.code())
            .collect::<std::collections::BTreeSet<_>>();
        assert_eq!(codes.len(), kinds.len());
    }
}

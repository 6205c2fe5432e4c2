//! The fault taxonomy shared by both wire protocols.
//!
//! Fault codes are part of the wire contract and must never change:
//!
//! | kind              | code   |
//! |-------------------|--------|
//! | parse_error       | -32700 |
//! | invalid_request   | -32600 |
//! | method_not_found  | -32601 |
//! | invalid_params    | -32602 |
//! | internal_error    | -32603 |
//! | custom error      | -32000 |

use serde::Serialize;

/// Code used for dynamically-parameterized faults surfacing handler-level
/// errors without a standard kind.
pub const CUSTOM_ERROR_CODE: i32 = -32000;

/// The fixed registry of standard fault kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
}

impl FaultKind {
    /// Stable numeric wire code for this kind.
    pub fn code(self) -> i32 {
        match self {
            FaultKind::ParseError => -32700,
            FaultKind::InvalidRequest => -32600,
            FaultKind::MethodNotFound => -32601,
            FaultKind::InvalidParams => -32602,
            FaultKind::InternalError => -32603,
        }
    }

    fn name(self) -> &'static str {
        match self {
            FaultKind::ParseError => "parse_error",
            FaultKind::InvalidRequest => "invalid_request",
            FaultKind::MethodNotFound => "method_not_found",
            FaultKind::InvalidParams => "invalid_params",
            FaultKind::InternalError => "internal_error",
        }
    }

    /// Default human-readable message, derived from the kind name
    /// ("parse_error" becomes "Parse Error").
    pub fn default_message(self) -> String {
        self.name()
            .split('_')
            .map(capitalize)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// A structured error returned in place of a successful result.
///
/// Constructing a fault never fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fault {
    pub code: i32,
    pub message: String,
}

impl Fault {
    /// A standard fault with the kind's derived default message.
    pub fn standard(kind: FaultKind) -> Self {
        Fault {
            code: kind.code(),
            message: kind.default_message(),
        }
    }

    /// A standard fault with an explicit message.
    pub fn with_message(kind: FaultKind, message: impl Into<String>) -> Self {
        Fault {
            code: kind.code(),
            message: message.into(),
        }
    }

    /// The dynamically-parameterized custom fault (`-32000`).
    pub fn custom(message: impl Into<String>) -> Self {
        Fault {
            code: CUSTOM_ERROR_CODE,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fault {}: {}", self.code, self.message)
    }
}

impl std::error::Error for Fault {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_codes() {
        assert_eq!(FaultKind::ParseError.code(), -32700);
        assert_eq!(FaultKind::InvalidRequest.code(), -32600);
        assert_eq!(FaultKind::MethodNotFound.code(), -32601);
        assert_eq!(FaultKind::InvalidParams.code(), -32602);
        assert_eq!(FaultKind::InternalError.code(), -32603);
        assert_eq!(CUSTOM_ERROR_CODE, -32000);
    }

    #[test]
    fn test_derived_messages() {
        assert_eq!(
            Fault::standard(FaultKind::MethodNotFound).message,
            "Method Not Found"
        );
        assert_eq!(Fault::standard(FaultKind::ParseError).message, "Parse Error");
    }

    #[test]
    fn test_custom_fault() {
        let fault = Fault::custom("something specific");
        assert_eq!(fault.code, -32000);
        assert_eq!(fault.message, "something specific");
    }

    #[test]
    fn test_explicit_message() {
        let fault = Fault::with_message(FaultKind::InternalError, "count mismatch");
        assert_eq!(fault.code, -32603);
        assert_eq!(fault.message, "count mismatch");
    }
}

//! Error types for the crosswire core.
//!
//! Each failure category maps to exactly one fault kind on the wire, so the
//! dispatcher can recover per invocation without losing the distinction
//! between a bad method path and bad arguments.

use crate::fault::{Fault, FaultKind};
use thiserror::Error;

/// A request body that could not be decoded into invocations.
///
/// Aborts the whole request; there is nothing to dispatch.
#[derive(Debug, Error)]
#[error("parse error: {0}")]
pub struct ParseError(pub String);

impl ParseError {
    pub fn fault(&self) -> Fault {
        Fault::standard(FaultKind::ParseError)
    }
}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        ParseError(err.to_string())
    }
}

impl From<quick_xml::Error> for ParseError {
    fn from(err: quick_xml::Error) -> Self {
        ParseError(err.to_string())
    }
}

/// A dotted method path that does not reach a visible, callable method.
///
/// Private, reserved, missing, and non-method paths are deliberately
/// indistinguishable to the caller; the reason stays in operator logs.
#[derive(Debug, Error)]
#[error("method not found: {method}")]
pub struct ResolveError {
    pub method: String,
    pub(crate) reason: ResolveFailure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResolveFailure {
    Missing,
    Private,
    Reserved,
    NotAMethod,
}

impl ResolveError {
    pub(crate) fn new(method: &str, reason: ResolveFailure) -> Self {
        ResolveError {
            method: method.to_string(),
            reason,
        }
    }

    pub fn fault(&self) -> Fault {
        Fault::standard(FaultKind::MethodNotFound)
    }
}

/// Call arguments that do not fit the target method's declared schema.
///
/// Message texts are part of the binder's contract; they name the offending
/// parameter without echoing its value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BindError {
    #[error("cannot mix positional and keyword arguments")]
    MixedArguments,
    #[error("keyword argument '{0}' not valid")]
    UnknownKeyword(String),
    #[error("keyword argument '{0}' used more than once")]
    DuplicateKeyword(String),
    #[error("too many positional arguments")]
    TooManyArguments,
    #[error("missing required argument '{0}'")]
    MissingArgument(String),
}

impl BindError {
    pub fn fault(&self) -> Fault {
        Fault::standard(FaultKind::InvalidParams)
    }
}

/// Failure signalled by user method code.
#[derive(Debug, Error)]
pub enum MethodError {
    /// A deliberate protocol fault; passes through to the caller verbatim.
    #[error("{0}")]
    Fault(#[from] Fault),
    /// Anything else. Logged with diagnostic context for operators, then
    /// surfaced as a sanitized internal error; the raw text never reaches
    /// the wire.
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Completion-accounting violation: a double-fired completion, an outcome
/// recorded after the response was assembled, or an outcome/invocation
/// count mismatch. Aborts the request with an internal error.
#[derive(Debug, Error)]
#[error("protocol invariant violated: {0}")]
pub struct InvariantViolation(pub String);

/// A return value the XML codec cannot represent on the wire.
#[derive(Debug, Error)]
#[error("value not representable in XML-RPC: {0}")]
pub struct EncodeError(pub String);

//! Canonical invocation records shared by both protocol parsers.

use crate::fault::Fault;
use serde_json::{Map, Value};

/// Protocol version marker tracked per request by the JSON parser.
///
/// Affects only the response envelope shape, never dispatch. XML-RPC
/// requests carry the default and never read it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RpcVersion {
    /// Legacy 1.0 envelope: both `result` and `error` members present,
    /// with `null` in the vacant one.
    #[default]
    V1,
    /// 2.0 envelope: `jsonrpc` marker plus exactly one of `result`/`error`.
    V2,
}

/// Call arguments in exactly one calling convention.
///
/// Mixing positional and keyword arguments is a caller error for this
/// protocol family, so the two shapes are a sum type rather than a pair of
/// sequences with a runtime invariant.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Params {
    #[default]
    None,
    ByPosition(Vec<Value>),
    ByName(Map<String, Value>),
    /// Params of a shape the protocol family does not support (e.g. a bare
    /// scalar). Dispatches to an `invalid_params` fault.
    Invalid,
}

/// One parsed remote call: method path, arguments, optional call id.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub method: String,
    pub params: Params,
    /// Opaque caller-chosen id echoed back in the response. XML-RPC has no
    /// call ids; JSON notifications have none either.
    pub call_id: Option<Value>,
    /// A notification must never produce a response entry, even in a batch.
    pub notification: bool,
    pub version: RpcVersion,
}

/// The ordered invocations parsed from one request body.
///
/// `is_batch` distinguishes one call sent as a 1-element array from one
/// call sent bare; the JSON response shape mirrors it.
#[derive(Debug, Clone)]
pub struct RequestBatch {
    pub invocations: Vec<Invocation>,
    pub is_batch: bool,
}

impl RequestBatch {
    /// A single bare invocation (the only shape XML-RPC can carry).
    pub fn single(invocation: Invocation) -> Self {
        RequestBatch {
            invocations: vec![invocation],
            is_batch: false,
        }
    }
}

/// Per-invocation result, produced in parse order.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub call_id: Option<Value>,
    pub result: Result<Value, Fault>,
}

impl Outcome {
    pub fn success(call_id: Option<Value>, value: Value) -> Self {
        Outcome {
            call_id,
            result: Ok(value),
        }
    }

    pub fn fault(call_id: Option<Value>, fault: Fault) -> Self {
        Outcome {
            call_id,
            result: Err(fault),
        }
    }
}

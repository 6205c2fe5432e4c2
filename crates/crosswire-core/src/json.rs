//! JSON-RPC protocol support: request parsing and response assembly for
//! the 1.0, 2.0, and batch variants.

use crate::error::ParseError;
use crate::fault::{Fault, FaultKind};
use crate::invocation::{Invocation, Outcome, Params, RequestBatch, RpcVersion};
use serde_json::{json, Value};
use tracing::error;

/// Content type for JSON-RPC responses.
pub const CONTENT_TYPE: &str = "application/json-rpc";

/// Parse a JSON-RPC request body into canonical invocations.
///
/// An array body is a batch; anything else is a single request. A batch
/// entry that is not an object, or an object without a `method` string,
/// fails the whole request.
pub fn parse_request(body: &[u8]) -> Result<RequestBatch, ParseError> {
    let root: Value = serde_json::from_slice(body)?;
    match root {
        Value::Array(entries) => {
            let invocations = entries
                .iter()
                .map(parse_entry)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(RequestBatch {
                invocations,
                is_batch: true,
            })
        }
        single => Ok(RequestBatch {
            invocations: vec![parse_entry(&single)?],
            is_batch: false,
        }),
    }
}

fn parse_entry(entry: &Value) -> Result<Invocation, ParseError> {
    let request = entry
        .as_object()
        .ok_or_else(|| ParseError("request entry is not an object".into()))?;
    let method = request
        .get("method")
        .and_then(Value::as_str)
        .ok_or_else(|| ParseError("request has no method name".into()))?
        .to_string();

    // A request without the version marker speaks the legacy protocol,
    // even inside a batch.
    let version = if request.contains_key("jsonrpc") {
        RpcVersion::V2
    } else {
        RpcVersion::V1
    };

    // No id, or a null id (the legacy wire form), marks a notification.
    let call_id = match request.get("id") {
        None | Some(Value::Null) => None,
        Some(id) => Some(id.clone()),
    };

    let params = match request.get("params") {
        None | Some(Value::Null) => Params::None,
        Some(Value::Array(values)) => Params::ByPosition(values.clone()),
        Some(Value::Object(map)) => Params::ByName(map.clone()),
        Some(_) => Params::Invalid,
    };

    Ok(Invocation {
        method,
        params,
        notification: call_id.is_none(),
        call_id,
        version,
    })
}

/// Assemble outcomes into a JSON-RPC response body.
///
/// Mirrors the request shape: a bare request gets a bare response (empty
/// for a notification); a batch gets an array with notification entries
/// omitted, `[]` when every entry was one. An outcome/invocation count
/// mismatch is an internal inconsistency and faults the whole batch.
pub fn assemble(batch: &RequestBatch, outcomes: &[Outcome]) -> Vec<u8> {
    if outcomes.len() != batch.invocations.len() {
        error!(
            "outcome count {} does not match invocation count {}",
            outcomes.len(),
            batch.invocations.len()
        );
        return fault_body(&Fault::standard(FaultKind::InternalError));
    }

    let mut entries = Vec::new();
    for (invocation, outcome) in batch.invocations.iter().zip(outcomes) {
        if invocation.notification {
            continue;
        }
        entries.push(envelope(invocation.version, outcome));
    }

    if batch.is_batch {
        render(&Value::Array(entries))
    } else {
        match entries.pop() {
            Some(entry) => render(&entry),
            None => Vec::new(),
        }
    }
}

/// A standalone fault response (parse errors, whole-batch failures).
pub fn fault_body(fault: &Fault) -> Vec<u8> {
    render(&json!({
        "jsonrpc": "2.0",
        "error": {"code": fault.code, "message": fault.message},
        "id": null,
    }))
}

fn envelope(version: RpcVersion, outcome: &Outcome) -> Value {
    let id = outcome.call_id.clone().unwrap_or(Value::Null);
    match (version, &outcome.result) {
        (RpcVersion::V2, Ok(value)) => json!({
            "jsonrpc": "2.0",
            "result": value,
            "id": id,
        }),
        (RpcVersion::V2, Err(fault)) => json!({
            "jsonrpc": "2.0",
            "error": {"code": fault.code, "message": fault.message},
            "id": id,
        }),
        (RpcVersion::V1, Ok(value)) => json!({
            "result": value,
            "error": null,
            "id": id,
        }),
        (RpcVersion::V1, Err(fault)) => json!({
            "result": null,
            "error": {"code": fault.code, "message": fault.message},
            "id": id,
        }),
    }
}

fn render(value: &Value) -> Vec<u8> {
    serde_json::to_vec(value).unwrap_or_else(|err| {
        // Unreachable for tree-shaped values, but the response must stay
        // well-formed even if serialization misbehaves.
        error!("response serialization failed: {}", err);
        br#"{"jsonrpc":"2.0","error":{"code":-32603,"message":"Internal Error"},"id":null}"#
            .to_vec()
    })
}

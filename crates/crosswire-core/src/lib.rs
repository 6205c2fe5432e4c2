//! Crosswire - Protocol-agnostic RPC dispatch with JSON-RPC and XML-RPC
//! front ends.
//!
//! This crate turns raw request bodies into method calls against a
//! registered method tree and turns the results back into wire responses.
//! It handles dotted method paths with visibility rules, positional and
//! keyword argument binding against declared schemas, batches and
//! notifications, and methods that complete out-of-band. The HTTP layer
//! lives elsewhere (see the `crosswire-rpc` binary); this crate only needs
//! a request body in and produces a response body out.
//!
//! # Example
//!
//! ```rust
//! use crosswire::{DispatchConfig, MethodTree, ParamSchema, RpcEngine};
//! use serde_json::{json, Value};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut tree = MethodTree::new();
//!     tree.sync_method("add", ParamSchema::new().param("x").param("y"), |args| {
//!         let x = args.get("x").and_then(Value::as_i64).unwrap_or(0);
//!         let y = args.get("y").and_then(Value::as_i64).unwrap_or(0);
//!         Ok(json!(x + y))
//!     });
//!
//!     let engine = RpcEngine::new(tree, DispatchConfig::default());
//!     let body = br#"{"jsonrpc":"2.0","method":"add","params":[5,6],"id":1}"#;
//!     let response = engine.handle_json(body).await;
//!     assert!(!response.is_empty());
//! }
//! ```

pub mod dispatch;
pub mod engine;
pub mod error;
pub mod fault;
pub mod invocation;
pub mod json;
pub mod registry;
pub mod schema;
pub mod xml;

// Re-export commonly used types
pub use dispatch::{Completion, DispatchConfig, Dispatcher};
pub use engine::RpcEngine;
pub use error::{
    BindError, EncodeError, InvariantViolation, MethodError, ParseError, ResolveError,
};
pub use fault::{Fault, FaultKind, CUSTOM_ERROR_CODE};
pub use invocation::{Invocation, Outcome, Params, RequestBatch, RpcVersion};
pub use registry::{MethodDescriptor, MethodKind, MethodResult, MethodTree};
pub use schema::{BoundArgs, ParamSchema, ParamSpec};

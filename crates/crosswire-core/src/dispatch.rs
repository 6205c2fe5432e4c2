//! The dispatch engine: resolve, bind, invoke, and completion tracking.
//!
//! Every invocation in a batch is issued before any out-of-band completion
//! is awaited, and outcomes are collected positionally, so the response
//! order always equals parse order no matter when asynchronous methods
//! finish.

use crate::error::{InvariantViolation, MethodError};
use crate::fault::{Fault, FaultKind};
use crate::invocation::{Invocation, Outcome, Params, RequestBatch};
use crate::registry::{MethodKind, MethodResult, MethodTree};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

/// Engine configuration, passed at construction.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Log handler failures with full parameter context at error level;
    /// when off they are logged at debug level only.
    pub verbose_errors: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        DispatchConfig {
            verbose_errors: true,
        }
    }
}

/// Completion handle given to asynchronous methods.
///
/// Must be fired exactly once with the method's result, from any call
/// stack, before the surrounding request deadline (if any) expires.
/// Dropping it unfired surfaces an internal error for that invocation.
#[derive(Clone)]
pub struct Completion {
    inner: Arc<CompletionInner>,
}

struct CompletionInner {
    method: String,
    slot: Mutex<Option<oneshot::Sender<MethodResult>>>,
}

impl Completion {
    fn new(method: &str) -> (Self, oneshot::Receiver<MethodResult>) {
        let (tx, rx) = oneshot::channel();
        let completion = Completion {
            inner: Arc::new(CompletionInner {
                method: method.to_string(),
                slot: Mutex::new(Some(tx)),
            }),
        };
        (completion, rx)
    }

    /// Deliver the method's result.
    ///
    /// A second call is a protocol invariant violation: it is logged at
    /// error level and reported back, and the already-delivered result is
    /// untouched. Firing after the request was abandoned (deadline hit,
    /// connection gone) is a silent no-op.
    pub fn complete(&self, result: MethodResult) -> Result<(), InvariantViolation> {
        let sender = match self.inner.slot.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match sender {
            Some(tx) => {
                if tx.send(result).is_err() {
                    debug!(
                        "late completion for {} dropped; request already abandoned",
                        self.inner.method
                    );
                }
                Ok(())
            }
            None => {
                error!("completion for {} fired more than once", self.inner.method);
                Err(InvariantViolation(format!(
                    "completion for '{}' fired more than once",
                    self.inner.method
                )))
            }
        }
    }
}

/// Per-request completion accounting with an explicit lifecycle.
///
/// `expected` is fixed before any invocation is issued, so early-finishing
/// synchronous calls can never trigger a premature response. The
/// transition to `Ready` happens exactly once; recording an outcome after
/// that, or taking the outcomes twice, is an invariant violation.
#[derive(Debug)]
pub(crate) struct PendingDispatch {
    expected: usize,
    completed: Vec<Outcome>,
    state: DispatchState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispatchState {
    Collecting,
    Ready,
    Sent,
}

impl PendingDispatch {
    pub(crate) fn new(expected: usize) -> Self {
        PendingDispatch {
            expected,
            completed: Vec::with_capacity(expected),
            state: if expected == 0 {
                DispatchState::Ready
            } else {
                DispatchState::Collecting
            },
        }
    }

    pub(crate) fn record(&mut self, outcome: Outcome) -> Result<(), InvariantViolation> {
        if self.state != DispatchState::Collecting {
            error!("outcome recorded after dispatch already completed");
            return Err(InvariantViolation(
                "outcome recorded after dispatch already completed".into(),
            ));
        }
        self.completed.push(outcome);
        if self.completed.len() == self.expected {
            self.state = DispatchState::Ready;
        }
        Ok(())
    }

    pub(crate) fn take(&mut self) -> Result<Vec<Outcome>, InvariantViolation> {
        match self.state {
            DispatchState::Ready => {
                self.state = DispatchState::Sent;
                Ok(std::mem::take(&mut self.completed))
            }
            DispatchState::Collecting => {
                error!(
                    "response assembly requested with {} of {} outcomes",
                    self.completed.len(),
                    self.expected
                );
                Err(InvariantViolation(
                    "response assembly requested before all outcomes completed".into(),
                ))
            }
            DispatchState::Sent => {
                error!("response taken twice for one dispatch");
                Err(InvariantViolation("response taken twice".into()))
            }
        }
    }
}

/// A dispatched invocation: either finished inline or waiting on its
/// completion channel.
enum Slot {
    Ready(Outcome),
    Pending {
        call_id: Option<Value>,
        rx: oneshot::Receiver<MethodResult>,
    },
}

/// Executes parsed invocations against a method tree.
pub struct Dispatcher {
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(config: DispatchConfig) -> Self {
        Dispatcher { config }
    }

    /// Dispatch every invocation in order and return one outcome per
    /// invocation, in the same order.
    ///
    /// Per-invocation failures become fault outcomes and never abort the
    /// batch; only a completion-accounting violation aborts.
    pub async fn dispatch(
        &self,
        tree: &MethodTree,
        batch: &RequestBatch,
    ) -> Result<Vec<Outcome>, InvariantViolation> {
        let mut pending = PendingDispatch::new(batch.invocations.len());

        // Issue everything first; await nothing until all methods have run
        // or registered their completion slot.
        let slots: Vec<Slot> = batch
            .invocations
            .iter()
            .map(|invocation| self.issue(tree, invocation))
            .collect();

        for (slot, invocation) in slots.into_iter().zip(&batch.invocations) {
            let outcome = match slot {
                Slot::Ready(outcome) => outcome,
                Slot::Pending { call_id, rx } => match rx.await {
                    Ok(Ok(value)) => Outcome::success(call_id, value),
                    Ok(Err(err)) => self.failure_outcome(invocation, call_id, err),
                    Err(_) => {
                        error!(
                            "{} dropped its completion without firing it",
                            invocation.method
                        );
                        Outcome::fault(call_id, Fault::standard(FaultKind::InternalError))
                    }
                },
            };
            pending.record(outcome)?;
        }

        pending.take()
    }

    /// Run one invocation up to its suspension point.
    fn issue(&self, tree: &MethodTree, invocation: &Invocation) -> Slot {
        let call_id = invocation.call_id.clone();
        debug!("dispatching {}({:?})", invocation.method, invocation.params);

        let descriptor = match tree.resolve(&invocation.method) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                warn!("method not found: {} ({:?})", err.method, err.reason);
                return Slot::Ready(Outcome::fault(
                    call_id,
                    Fault::standard(FaultKind::MethodNotFound),
                ));
            }
        };

        let empty = Map::new();
        let (positional, keyword): (&[Value], &Map<String, Value>) = match &invocation.params {
            Params::None => (&[], &empty),
            Params::ByPosition(values) => (values, &empty),
            Params::ByName(map) => (&[], map),
            Params::Invalid => {
                return Slot::Ready(Outcome::fault(
                    call_id,
                    Fault::standard(FaultKind::InvalidParams),
                ));
            }
        };

        let args = match descriptor.schema().bind(positional, keyword) {
            Ok(args) => args,
            Err(err) => {
                debug!("binding failed for {}: {}", invocation.method, err);
                return Slot::Ready(Outcome::fault(call_id, err.fault()));
            }
        };

        match descriptor.handler() {
            MethodKind::Sync(handler) => match handler(args) {
                Ok(value) => Slot::Ready(Outcome::success(call_id, value)),
                Err(err) => Slot::Ready(self.failure_outcome(invocation, call_id, err)),
            },
            MethodKind::Async(handler) => {
                let (completion, rx) = Completion::new(&invocation.method);
                match handler(args, completion) {
                    Ok(()) => Slot::Pending { call_id, rx },
                    Err(err) => Slot::Ready(self.failure_outcome(invocation, call_id, err)),
                }
            }
        }
    }

    /// Map a failure signalled by method code to its outcome.
    ///
    /// Deliberate faults pass through verbatim; anything else is logged
    /// with its full call context for operators and sanitized to a bare
    /// internal error.
    fn failure_outcome(
        &self,
        invocation: &Invocation,
        call_id: Option<Value>,
        err: MethodError,
    ) -> Outcome {
        match err {
            MethodError::Fault(fault) => Outcome::fault(call_id, fault),
            MethodError::Failed(err) => {
                if self.config.verbose_errors {
                    error!(
                        "{} failed (id {:?}, params {:?}): {:#}",
                        invocation.method, call_id, invocation.params, err
                    );
                } else {
                    debug!(
                        "{} failed (id {:?}, params {:?}): {:#}",
                        invocation.method, call_id, invocation.params, err
                    );
                }
                Outcome::fault(call_id, Fault::standard(FaultKind::InternalError))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::RpcVersion;
    use crate::schema::ParamSchema;
    use anyhow::anyhow;
    use serde_json::json;

    fn call(method: &str, params: Params, id: i64) -> Invocation {
        Invocation {
            method: method.to_string(),
            params,
            call_id: Some(json!(id)),
            notification: false,
            version: RpcVersion::V2,
        }
    }

    fn batch(invocations: Vec<Invocation>) -> RequestBatch {
        RequestBatch {
            invocations,
            is_batch: true,
        }
    }

    fn adder() -> MethodTree {
        let mut tree = MethodTree::new();
        tree.sync_method("add", ParamSchema::new().param("x").param("y"), |args| {
            let x = args.get("x").and_then(Value::as_i64).unwrap_or(0);
            let y = args.get("y").and_then(Value::as_i64).unwrap_or(0);
            Ok(json!(x + y))
        });
        tree
    }

    #[tokio::test]
    async fn test_sync_dispatch() {
        let tree = adder();
        let dispatcher = Dispatcher::new(DispatchConfig::default());
        let outcomes = dispatcher
            .dispatch(
                &tree,
                &batch(vec![call(
                    "add",
                    Params::ByPosition(vec![json!(5), json!(6)]),
                    1,
                )]),
            )
            .await
            .unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].result, Ok(json!(11)));
    }

    #[tokio::test]
    async fn test_unknown_method_does_not_abort_batch() {
        let tree = adder();
        let dispatcher = Dispatcher::new(DispatchConfig::default());
        let outcomes = dispatcher
            .dispatch(
                &tree,
                &batch(vec![
                    call("missing", Params::None, 1),
                    call("add", Params::ByPosition(vec![json!(1), json!(2)]), 2),
                ]),
            )
            .await
            .unwrap();
        assert_eq!(outcomes[0].result.as_ref().unwrap_err().code, -32601);
        assert_eq!(outcomes[1].result, Ok(json!(3)));
    }

    #[tokio::test]
    async fn test_bind_failure_maps_to_invalid_params() {
        let tree = adder();
        let dispatcher = Dispatcher::new(DispatchConfig::default());
        let mut unknown = Map::new();
        unknown.insert("z".to_string(), json!(1));
        let outcomes = dispatcher
            .dispatch(&tree, &batch(vec![call("add", Params::ByName(unknown), 1)]))
            .await
            .unwrap();
        assert_eq!(outcomes[0].result.as_ref().unwrap_err().code, -32602);
    }

    #[tokio::test]
    async fn test_invalid_params_shape() {
        let tree = adder();
        let dispatcher = Dispatcher::new(DispatchConfig::default());
        let outcomes = dispatcher
            .dispatch(&tree, &batch(vec![call("add", Params::Invalid, 1)]))
            .await
            .unwrap();
        assert_eq!(outcomes[0].result.as_ref().unwrap_err().code, -32602);
    }

    #[tokio::test]
    async fn test_unexpected_failure_is_sanitized() {
        let mut tree = MethodTree::new();
        tree.sync_method("boom", ParamSchema::new(), |_| {
            Err(MethodError::Failed(anyhow!("secret stack detail")))
        });
        let dispatcher = Dispatcher::new(DispatchConfig::default());
        let outcomes = dispatcher
            .dispatch(&tree, &batch(vec![call("boom", Params::None, 1)]))
            .await
            .unwrap();
        let fault = outcomes[0].result.as_ref().unwrap_err();
        assert_eq!(fault.code, -32603);
        assert!(!fault.message.contains("secret stack detail"));
    }

    #[tokio::test]
    async fn test_handler_fault_passes_through() {
        let mut tree = MethodTree::new();
        tree.sync_method("refuse", ParamSchema::new(), |_| {
            Err(Fault::custom("told you so").into())
        });
        let dispatcher = Dispatcher::new(DispatchConfig::default());
        let outcomes = dispatcher
            .dispatch(&tree, &batch(vec![call("refuse", Params::None, 1)]))
            .await
            .unwrap();
        let fault = outcomes[0].result.as_ref().unwrap_err();
        assert_eq!(fault.code, -32000);
        assert_eq!(fault.message, "told you so");
    }

    #[tokio::test]
    async fn test_async_outcomes_keep_parse_order() {
        // Two async methods; their completions are fired in reverse order.
        let stash: Arc<Mutex<Vec<(String, Completion)>>> = Arc::new(Mutex::new(Vec::new()));
        let mut tree = MethodTree::new();
        let sink = Arc::clone(&stash);
        tree.async_method("defer", ParamSchema::new().param("tag"), move |args, c| {
            let tag = args
                .get("tag")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            sink.lock().unwrap().push((tag, c));
            Ok(())
        });

        let dispatcher = Dispatcher::new(DispatchConfig::default());
        let requests = batch(vec![
            call("defer", Params::ByPosition(vec![json!("first")]), 1),
            call("defer", Params::ByPosition(vec![json!("second")]), 2),
        ]);

        let fire = async {
            loop {
                if stash.lock().unwrap().len() == 2 {
                    break;
                }
                tokio::task::yield_now().await;
            }
            let mut slots = stash.lock().unwrap();
            for (tag, completion) in slots.drain(..).rev() {
                completion.complete(Ok(json!(tag))).unwrap();
            }
        };

        let (outcomes, ()) = tokio::join!(dispatcher.dispatch(&tree, &requests), fire);
        let outcomes = outcomes.unwrap();
        assert_eq!(outcomes[0].result, Ok(json!("first")));
        assert_eq!(outcomes[1].result, Ok(json!("second")));
    }

    #[tokio::test]
    async fn test_double_completion_is_flagged_not_fatal() {
        let stash: Arc<Mutex<Vec<Completion>>> = Arc::new(Mutex::new(Vec::new()));
        let mut tree = MethodTree::new();
        let sink = Arc::clone(&stash);
        tree.async_method("once", ParamSchema::new(), move |_, c| {
            sink.lock().unwrap().push(c.clone());
            c.complete(Ok(json!("first result"))).unwrap();
            Ok(())
        });

        let dispatcher = Dispatcher::new(DispatchConfig::default());
        let outcomes = dispatcher
            .dispatch(&tree, &batch(vec![call("once", Params::None, 1)]))
            .await
            .unwrap();
        assert_eq!(outcomes[0].result, Ok(json!("first result")));

        // Firing again is flagged and does not alter the outcome.
        let retained = stash.lock().unwrap().pop().unwrap();
        assert!(retained.complete(Ok(json!("second result"))).is_err());
        assert_eq!(outcomes[0].result, Ok(json!("first result")));
    }

    #[tokio::test]
    async fn test_dropped_completion_becomes_internal_error() {
        let mut tree = MethodTree::new();
        tree.async_method("forgetful", ParamSchema::new(), |_, completion| {
            drop(completion);
            Ok(())
        });
        let dispatcher = Dispatcher::new(DispatchConfig::default());
        let outcomes = dispatcher
            .dispatch(&tree, &batch(vec![call("forgetful", Params::None, 1)]))
            .await
            .unwrap();
        assert_eq!(outcomes[0].result.as_ref().unwrap_err().code, -32603);
    }

    #[tokio::test]
    async fn test_late_completion_after_abandonment_is_noop() {
        let (completion, rx) = Completion::new("abandoned");
        drop(rx);
        assert!(completion.complete(Ok(json!(1))).is_ok());
    }

    #[test]
    fn test_pending_dispatch_lifecycle() {
        let mut pending = PendingDispatch::new(1);
        pending.record(Outcome::success(None, json!(1))).unwrap();
        assert!(pending.record(Outcome::success(None, json!(2))).is_err());
        let outcomes = pending.take().unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(pending.take().is_err());
    }

    #[test]
    fn test_pending_dispatch_take_before_ready() {
        let mut pending = PendingDispatch::new(2);
        pending.record(Outcome::success(None, json!(1))).unwrap();
        assert!(pending.take().is_err());
    }
}

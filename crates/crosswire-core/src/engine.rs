//! One-stop request entry points tying parser, dispatcher, and assembler
//! together per protocol.
//!
//! Every path through the engine terminates in a well-formed response
//! body; no error escapes to the transport layer.

use crate::dispatch::{DispatchConfig, Dispatcher};
use crate::fault::{Fault, FaultKind};
use crate::json;
use crate::registry::MethodTree;
use crate::schema::ParamSchema;
use crate::xml;
use serde_json::json;
use tracing::{error, warn};

/// A method tree plus a dispatcher, ready to serve request bodies.
pub struct RpcEngine {
    tree: MethodTree,
    dispatcher: Dispatcher,
}

impl RpcEngine {
    /// Build an engine over a finished method tree.
    ///
    /// Installs the XML-RPC introspection surface (`system.listMethods`)
    /// unless the tree already claims a `system` subtree. The listing is
    /// snapshotted here; trees are not extended while serving.
    pub fn new(mut tree: MethodTree, config: DispatchConfig) -> Self {
        if !tree.contains("system") {
            let mut names = tree.method_names();
            names.push("system.listMethods".to_string());
            names.sort();
            let mut system = MethodTree::new();
            system.sync_method("listMethods", ParamSchema::new(), move |_args| {
                Ok(json!(names))
            });
            tree.subtree("system", system);
        }
        RpcEngine {
            tree,
            dispatcher: Dispatcher::new(config),
        }
    }

    pub fn tree(&self) -> &MethodTree {
        &self.tree
    }

    /// Handle one JSON-RPC request body.
    ///
    /// An empty return means the request was a single notification.
    pub async fn handle_json(&self, body: &[u8]) -> Vec<u8> {
        let batch = match json::parse_request(body) {
            Ok(batch) => batch,
            Err(err) => {
                warn!("JSON-RPC body failed to parse: {}", err);
                return json::fault_body(&err.fault());
            }
        };
        match self.dispatcher.dispatch(&self.tree, &batch).await {
            Ok(outcomes) => json::assemble(&batch, &outcomes),
            Err(violation) => {
                error!("dispatch aborted: {}", violation);
                json::fault_body(&Fault::standard(FaultKind::InternalError))
            }
        }
    }

    /// Handle one XML-RPC request body.
    pub async fn handle_xml(&self, body: &[u8]) -> Vec<u8> {
        let batch = match xml::parse_request(body) {
            Ok(batch) => batch,
            Err(err) => {
                warn!("XML-RPC body failed to parse: {}", err);
                return xml::fault_body(&err.fault());
            }
        };
        match self.dispatcher.dispatch(&self.tree, &batch).await {
            Ok(outcomes) => xml::assemble(&outcomes),
            Err(violation) => {
                error!("dispatch aborted: {}", violation);
                xml::fault_body(&Fault::standard(FaultKind::InternalError))
            }
        }
    }
}

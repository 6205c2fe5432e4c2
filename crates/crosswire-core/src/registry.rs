//! Registered method trees and dotted-path resolution.
//!
//! Methods are registered into an explicit tree before serving; nothing is
//! reflected at call time. Each entry carries everything the dispatcher
//! needs: the handler, its declared parameter schema, and its visibility.

use crate::dispatch::Completion;
use crate::error::{MethodError, ResolveError, ResolveFailure};
use crate::schema::{BoundArgs, ParamSchema};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Result type for user method code.
pub type MethodResult = Result<Value, MethodError>;

type SyncFn = Arc<dyn Fn(BoundArgs) -> MethodResult + Send + Sync>;
type AsyncFn = Arc<dyn Fn(BoundArgs, Completion) -> Result<(), MethodError> + Send + Sync>;

/// How a method delivers its result.
#[derive(Clone)]
pub enum MethodKind {
    /// Computes its result inline; the return value is the outcome.
    Sync(SyncFn),
    /// Returns nothing and must fire the provided [`Completion`] exactly
    /// once, from any call stack, at any later time.
    Async(AsyncFn),
}

/// Everything the dispatcher needs to invoke one registered method.
#[derive(Clone)]
pub struct MethodDescriptor {
    handler: MethodKind,
    schema: ParamSchema,
    visible: bool,
}

impl MethodDescriptor {
    /// A visible synchronous method.
    pub fn sync(
        schema: ParamSchema,
        handler: impl Fn(BoundArgs) -> MethodResult + Send + Sync + 'static,
    ) -> Self {
        MethodDescriptor {
            handler: MethodKind::Sync(Arc::new(handler)),
            schema,
            visible: true,
        }
    }

    /// A visible asynchronous method, completing out-of-band.
    pub fn asynchronous(
        schema: ParamSchema,
        handler: impl Fn(BoundArgs, Completion) -> Result<(), MethodError> + Send + Sync + 'static,
    ) -> Self {
        MethodDescriptor {
            handler: MethodKind::Async(Arc::new(handler)),
            schema,
            visible: true,
        }
    }

    /// Mark this method unreachable via RPC while keeping it registered.
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub(crate) fn handler(&self) -> &MethodKind {
        &self.handler
    }

    pub(crate) fn schema(&self) -> &ParamSchema {
        &self.schema
    }
}

enum Node {
    Method(MethodDescriptor),
    Subtree { tree: MethodTree, visible: bool },
}

/// A tree of registered methods, resolvable by dotted path.
///
/// Read-only once serving starts; shared across concurrent requests
/// without locking.
#[derive(Default)]
pub struct MethodTree {
    nodes: BTreeMap<String, Node>,
    /// Top-level names claimed by the host transport layer; callers cannot
    /// resolve a registered method through them.
    reserved: Vec<String>,
}

impl MethodTree {
    pub fn new() -> Self {
        MethodTree::default()
    }

    /// Register a method under `name` (no dots; use [`subtree`] for
    /// nesting).
    ///
    /// [`subtree`]: MethodTree::subtree
    pub fn register(&mut self, name: &str, descriptor: MethodDescriptor) -> &mut Self {
        self.nodes.insert(name.to_string(), Node::Method(descriptor));
        self
    }

    /// Register a visible synchronous method.
    pub fn sync_method(
        &mut self,
        name: &str,
        schema: ParamSchema,
        handler: impl Fn(BoundArgs) -> MethodResult + Send + Sync + 'static,
    ) -> &mut Self {
        self.register(name, MethodDescriptor::sync(schema, handler))
    }

    /// Register a visible asynchronous method.
    pub fn async_method(
        &mut self,
        name: &str,
        schema: ParamSchema,
        handler: impl Fn(BoundArgs, Completion) -> Result<(), MethodError> + Send + Sync + 'static,
    ) -> &mut Self {
        self.register(name, MethodDescriptor::asynchronous(schema, handler))
    }

    /// Mount a subtree under `name`, reachable as `name.method`.
    pub fn subtree(&mut self, name: &str, tree: MethodTree) -> &mut Self {
        self.nodes.insert(
            name.to_string(),
            Node::Subtree {
                tree,
                visible: true,
            },
        );
        self
    }

    /// Mount a subtree whose entire contents are unreachable via RPC.
    pub fn hidden_subtree(&mut self, name: &str, tree: MethodTree) -> &mut Self {
        self.nodes.insert(
            name.to_string(),
            Node::Subtree {
                tree,
                visible: false,
            },
        );
        self
    }

    /// Claim top-level names for the host transport layer.
    pub fn reserve(&mut self, names: &[&str]) -> &mut Self {
        self.reserved.extend(names.iter().map(|n| n.to_string()));
        self
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Resolve a dotted method path to its descriptor.
    ///
    /// Fails uniformly with NotFound when any segment starts with `_`, is
    /// registered hidden, does not exist, collides with a transport-reserved
    /// name (top level only), or the walk does not end on a method.
    /// Resolution is case-sensitive.
    pub fn resolve(&self, dotted_name: &str) -> Result<&MethodDescriptor, ResolveError> {
        let fail = |reason| Err(ResolveError::new(dotted_name, reason));
        let mut tree = self;
        let mut resolved: Option<&MethodDescriptor> = None;

        for (index, segment) in dotted_name.split('.').enumerate() {
            if resolved.is_some() {
                // Tried to walk through a method.
                return fail(ResolveFailure::Missing);
            }
            if segment.starts_with('_') {
                return fail(ResolveFailure::Private);
            }
            if index == 0 && self.reserved.iter().any(|r| r == segment) {
                return fail(ResolveFailure::Reserved);
            }
            match tree.nodes.get(segment) {
                Some(Node::Method(descriptor)) => {
                    if !descriptor.visible {
                        return fail(ResolveFailure::Private);
                    }
                    resolved = Some(descriptor);
                }
                Some(Node::Subtree {
                    tree: subtree,
                    visible,
                }) => {
                    if !visible {
                        return fail(ResolveFailure::Private);
                    }
                    tree = subtree;
                }
                None => return fail(ResolveFailure::Missing),
            }
        }

        match resolved {
            Some(descriptor) => Ok(descriptor),
            // The path stopped on a subtree, not a method.
            None => fail(ResolveFailure::NotAMethod),
        }
    }

    /// Every visible, reachable dotted method name, sorted.
    ///
    /// This is the XML-RPC introspection surface; reserved and hidden
    /// entries are excluded.
    pub fn method_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_names("", &mut names);
        names.retain(|name| {
            let top = name.split('.').next().unwrap_or(name);
            !self.reserved.iter().any(|r| r == top)
        });
        names
    }

    fn collect_names(&self, prefix: &str, out: &mut Vec<String>) {
        for (name, node) in &self.nodes {
            if name.starts_with('_') {
                continue;
            }
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}.{}", prefix, name)
            };
            match node {
                Node::Method(descriptor) if descriptor.visible => out.push(path),
                Node::Subtree {
                    tree,
                    visible: true,
                } => tree.collect_names(&path, out),
                _ => {}
            }
        }
    }
}

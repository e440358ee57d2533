//! Capability registries.
//!
//! Each registry pairs a public descriptor listing with a name-keyed handler
//! table. Registration takes the write lock; listing and lookup take the
//! read lock only long enough to clone what they return, so no lock is ever
//! held while a handler runs.
//!
//! Registering the same identifier twice leaves two entries in the listing
//! while the later handler replaces the earlier one.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;

use crate::error::HandlerError;
use crate::mcp::handler::{PromptHandler, RequestContext, ResourceHandler, ToolHandler};
use crate::mcp::types::{
    Arguments, CallToolResult, GetPromptResult, Prompt, ReadResourceResult, Resource, Tool,
};

/// A capability descriptor with a registry key.
pub trait Descriptor: Clone + Send + Sync {
    /// The identifier handlers are keyed by.
    fn key(&self) -> &str;
}

impl Descriptor for Tool {
    fn key(&self) -> &str {
        &self.name
    }
}

impl Descriptor for Resource {
    fn key(&self) -> &str {
        &self.uri
    }
}

impl Descriptor for Prompt {
    fn key(&self) -> &str {
        &self.name
    }
}

/// The kind of a capability, used in log fields and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityKind {
    /// A callable tool.
    Tool,
    /// A readable resource.
    Resource,
    /// A prompt template.
    Prompt,
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tool => f.write_str("Tool"),
            Self::Resource => f.write_str("Resource"),
            Self::Prompt => f.write_str("Prompt"),
        }
    }
}

/// Failure to invoke a capability.
#[derive(Error, Debug)]
pub enum InvokeError {
    /// No handler is registered under the identifier.
    #[error("{kind} not found: {key}")]
    NotFound {
        /// Capability kind.
        kind: CapabilityKind,
        /// The missing identifier.
        key: String,
    },

    /// The handler ran and reported a failure.
    #[error("{kind} '{key}' failed: {source}")]
    Failed {
        /// Capability kind.
        kind: CapabilityKind,
        /// The identifier that was invoked.
        key: String,
        /// The handler's error.
        #[source]
        source: HandlerError,
    },
}

struct Tables<D, H: ?Sized> {
    listing: Vec<D>,
    handlers: HashMap<String, Arc<H>>,
}

/// A name-keyed table of (descriptor, handler) entries.
pub struct Registry<D, H: ?Sized> {
    kind: CapabilityKind,
    tables: RwLock<Tables<D, H>>,
}

impl<D: Descriptor, H: ?Sized> Registry<D, H> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(kind: CapabilityKind) -> Self {
        Self {
            kind,
            tables: RwLock::new(Tables {
                listing: Vec::new(),
                handlers: HashMap::new(),
            }),
        }
    }

    /// Returns the kind of capability this registry holds.
    #[must_use]
    pub const fn kind(&self) -> CapabilityKind {
        self.kind
    }

    /// Appends `descriptor` to the listing and binds `handler` to its key.
    ///
    /// Returns `true` if an earlier handler under the same key was replaced.
    pub fn register(&self, descriptor: D, handler: Arc<H>) -> bool {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let key = descriptor.key().to_string();
        tables.listing.push(descriptor);
        let replaced = tables.handlers.insert(key.clone(), handler).is_some();
        drop(tables);

        if replaced {
            tracing::warn!(
                kind = %self.kind,
                key = %key,
                "Duplicate registration; listing keeps both entries, later handler wins"
            );
        }
        replaced
    }

    /// Returns every registered descriptor in registration order.
    #[must_use]
    pub fn list(&self) -> Vec<D> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .listing
            .clone()
    }

    /// Returns the handler bound to `key`.
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<Arc<H>> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .handlers
            .get(key)
            .cloned()
    }

    /// Number of listing entries, duplicates included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .listing
            .len()
    }

    /// Returns `true` if nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn require(&self, key: &str) -> Result<Arc<H>, InvokeError> {
        self.lookup(key).ok_or_else(|| InvokeError::NotFound {
            kind: self.kind,
            key: key.to_string(),
        })
    }

    fn failed(&self, key: &str, source: HandlerError) -> InvokeError {
        InvokeError::Failed {
            kind: self.kind,
            key: key.to_string(),
            source,
        }
    }
}

/// Registry of tools keyed by name.
pub type ToolRegistry = Registry<Tool, dyn ToolHandler>;
/// Registry of resources keyed by URI.
pub type ResourceRegistry = Registry<Resource, dyn ResourceHandler>;
/// Registry of prompts keyed by name.
pub type PromptRegistry = Registry<Prompt, dyn PromptHandler>;

/// The three capability registries of one server.
pub struct Capabilities {
    /// Registered tools.
    pub tools: ToolRegistry,
    /// Registered resources.
    pub resources: ResourceRegistry,
    /// Registered prompts.
    pub prompts: PromptRegistry,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            tools: Registry::new(CapabilityKind::Tool),
            resources: Registry::new(CapabilityKind::Resource),
            prompts: Registry::new(CapabilityKind::Prompt),
        }
    }
}

impl Capabilities {
    /// Looks up and invokes a tool.
    ///
    /// # Errors
    ///
    /// Returns [`InvokeError::NotFound`] on a lookup miss (no handler runs)
    /// or [`InvokeError::Failed`] if the handler fails.
    pub async fn call_tool(
        &self,
        ctx: &RequestContext,
        name: &str,
        arguments: Arguments,
    ) -> Result<CallToolResult, InvokeError> {
        let handler = self.tools.require(name)?;
        tracing::debug!(tool = %name, "Calling tool");
        handler
            .call(ctx, arguments)
            .await
            .map_err(|e| self.tools.failed(name, e))
    }

    /// Looks up and reads a resource.
    ///
    /// # Errors
    ///
    /// See [`Capabilities::call_tool`].
    pub async fn read_resource(
        &self,
        ctx: &RequestContext,
        uri: &str,
    ) -> Result<ReadResourceResult, InvokeError> {
        let handler = self.resources.require(uri)?;
        tracing::debug!(uri = %uri, "Reading resource");
        handler
            .read(ctx, uri)
            .await
            .map_err(|e| self.resources.failed(uri, e))
    }

    /// Looks up and generates a prompt.
    ///
    /// # Errors
    ///
    /// See [`Capabilities::call_tool`].
    pub async fn get_prompt(
        &self,
        ctx: &RequestContext,
        name: &str,
        arguments: Arguments,
    ) -> Result<GetPromptResult, InvokeError> {
        let handler = self.prompts.require(name)?;
        tracing::debug!(prompt = %name, "Generating prompt");
        handler
            .get(ctx, arguments)
            .await
            .map_err(|e| self.prompts.failed(name, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::handler::FnHandler;

    fn text_tool(reply: &'static str) -> Arc<dyn ToolHandler> {
        Arc::new(FnHandler(
            move |_ctx: &RequestContext, _args: Arguments| -> Result<_, HandlerError> {
                Ok(CallToolResult::text(reply))
            },
        ))
    }

    #[test]
    fn list_keeps_registration_order() {
        let registry = ToolRegistry::new(CapabilityKind::Tool);
        registry.register(Tool::new("b", "second letter"), text_tool("b"));
        registry.register(Tool::new("a", "first letter"), text_tool("a"));

        let names: Vec<_> = registry.list().into_iter().map(|t| t.name).collect();
        assert_eq!(names, ["b", "a"]);
    }

    #[tokio::test]
    async fn duplicate_registration_lists_twice_and_later_handler_wins() {
        let caps = Capabilities::default();
        assert!(!caps.tools.register(Tool::new("x", "old"), text_tool("old")));
        assert!(caps.tools.register(Tool::new("x", "new"), text_tool("new")));

        assert_eq!(caps.tools.len(), 2);
        let ctx = RequestContext::detached(None, "tools/call");
        let result = caps.call_tool(&ctx, "x", Arguments::new()).await.unwrap();
        assert_eq!(result, CallToolResult::text("new"));
    }

    #[tokio::test]
    async fn lookup_miss_names_the_identifier() {
        let caps = Capabilities::default();
        let ctx = RequestContext::detached(None, "resources/read");
        let err = caps.read_resource(&ctx, "file:///nope").await.unwrap_err();
        assert!(matches!(err, InvokeError::NotFound { kind: CapabilityKind::Resource, .. }));
        assert!(err.to_string().contains("file:///nope"));
    }

    #[tokio::test]
    async fn handler_failure_keeps_source_message() {
        let caps = Capabilities::default();
        caps.prompts.register(
            Prompt::new("p"),
            Arc::new(FnHandler(
                |_ctx: &RequestContext, _args: Arguments| -> Result<GetPromptResult, HandlerError> {
                    Err(HandlerError::new("template missing"))
                },
            )),
        );

        let ctx = RequestContext::detached(None, "prompts/get");
        let err = caps.get_prompt(&ctx, "p", Arguments::new()).await.unwrap_err();
        match err {
            InvokeError::Failed { source, .. } => assert_eq!(source.message(), "template missing"),
            other => panic!("Expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn registry_is_shareable_across_threads() {
        let registry = Arc::new(ToolRegistry::new(CapabilityKind::Tool));
        let workers: Vec<_> = (0..4)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    registry.register(Tool::new(format!("t{i}"), "worker tool"), text_tool("ok"));
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(registry.len(), 4);
        assert!(registry.lookup("t3").is_some());
    }
}

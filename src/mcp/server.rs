//! MCP server: capability registration and the serving loop.
//!
//! This module implements the MCP server lifecycle:
//!
//! 1. **Registration**: capabilities are added through [`McpServerBuilder`];
//!    [`McpServerBuilder::build`] freezes them
//! 2. **Operation**: [`McpServer::serve`] reads one line at a time, dispatches
//!    it, and writes the reply before reading the next line
//! 3. **Shutdown**: end of input, cancellation, or a transport failure
//!
//! There is exactly one request in flight; a slow handler delays the next
//! read, and responses leave in the order their requests arrived.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncWrite};

use crate::error::{HandlerError, ServeError};
use crate::mcp::cancel::{cancellation, CancellationHandle, CancellationSignal};
use crate::mcp::dispatcher::Dispatcher;
use crate::mcp::handler::{FnHandler, PromptHandler, RequestContext, ResourceHandler, ToolHandler};
use crate::mcp::registry::Capabilities;
use crate::mcp::transport::{LineTransport, StdioTransport};
use crate::mcp::types::{
    Arguments, CallToolResult, GetPromptResult, Prompt, ReadResourceResult, Resource, ServerInfo,
    Tool,
};

/// Collects capabilities before the server exists.
#[derive(Default)]
pub struct McpServerBuilder {
    server_info: ServerInfo,
    require_initialize: bool,
    capabilities: Capabilities,
}


impl McpServerBuilder {
    /// Creates a builder with the crate's own identity and no capabilities.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the identity reported in `serverInfo`.
    #[must_use]
    pub fn server_info(mut self, server_info: ServerInfo) -> Self {
        self.server_info = server_info;
        self
    }

    /// Returns the identity that will be reported.
    #[must_use]
    pub const fn info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Whether capability methods are rejected before `initialize`.
    /// Off by default.
    #[must_use]
    pub fn require_initialize(mut self, require: bool) -> Self {
        self.require_initialize = require;
        self
    }

    /// Registers a tool.
    #[must_use]
    pub fn tool(self, tool: Tool, handler: impl ToolHandler + 'static) -> Self {
        self.capabilities.tools.register(tool, Arc::new(handler));
        self
    }

    /// Registers a tool backed by a synchronous closure.
    #[must_use]
    pub fn tool_fn<F>(self, tool: Tool, handler: F) -> Self
    where
        F: Fn(&RequestContext, Arguments) -> Result<CallToolResult, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.tool(tool, FnHandler(handler))
    }

    /// Registers a resource.
    #[must_use]
    pub fn resource(self, resource: Resource, handler: impl ResourceHandler + 'static) -> Self {
        self.capabilities
            .resources
            .register(resource, Arc::new(handler));
        self
    }

    /// Registers a resource backed by a synchronous closure.
    #[must_use]
    pub fn resource_fn<F>(self, resource: Resource, handler: F) -> Self
    where
        F: Fn(&RequestContext, &str) -> Result<ReadResourceResult, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.resource(resource, FnHandler(handler))
    }

    /// Registers a prompt.
    #[must_use]
    pub fn prompt(self, prompt: Prompt, handler: impl PromptHandler + 'static) -> Self {
        self.capabilities.prompts.register(prompt, Arc::new(handler));
        self
    }

    /// Registers a prompt backed by a synchronous closure.
    #[must_use]
    pub fn prompt_fn<F>(self, prompt: Prompt, handler: F) -> Self
    where
        F: Fn(&RequestContext, Arguments) -> Result<GetPromptResult, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.prompt(prompt, FnHandler(handler))
    }

    /// Freezes the registries into a server.
    #[must_use]
    pub fn build(self) -> McpServer {
        tracing::debug!(
            tools = self.capabilities.tools.len(),
            resources = self.capabilities.resources.len(),
            prompts = self.capabilities.prompts.len(),
            "Capabilities registered"
        );
        McpServer {
            server_info: self.server_info,
            require_initialize: self.require_initialize,
            capabilities: Arc::new(self.capabilities),
        }
    }
}

/// The MCP server.
pub struct McpServer {
    server_info: ServerInfo,
    require_initialize: bool,
    capabilities: Arc<Capabilities>,
}

impl McpServer {
    /// Starts building a server.
    #[must_use]
    pub fn builder() -> McpServerBuilder {
        McpServerBuilder::new()
    }

    /// Returns the identity reported in `serverInfo`.
    #[must_use]
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Returns the registered capabilities.
    #[must_use]
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Creates a dispatcher for a new session.
    #[must_use]
    pub fn session(&self, cancellation: CancellationSignal) -> Dispatcher {
        Dispatcher::new(
            Arc::clone(&self.capabilities),
            self.server_info.clone(),
            self.require_initialize,
            cancellation,
        )
    }

    /// Serves one session over `transport` until end of input.
    ///
    /// # Errors
    ///
    /// Returns [`ServeError::Io`] if the transport fails and
    /// [`ServeError::Cancelled`] if `cancellation` is raised.
    pub async fn serve<R, W>(
        &self,
        transport: &mut LineTransport<R, W>,
        cancellation: CancellationSignal,
    ) -> Result<(), ServeError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut dispatcher = self.session(cancellation.clone());
        let mut waiter = cancellation.clone();

        loop {
            if cancellation.is_cancelled() {
                dispatcher.close();
                tracing::info!("Session cancelled");
                return Err(ServeError::Cancelled);
            }

            let line = tokio::select! {
                biased;

                () = waiter.cancelled() => {
                    dispatcher.close();
                    tracing::info!("Session cancelled while waiting for input");
                    return Err(ServeError::Cancelled);
                }

                line = transport.read_line() => line,
            };

            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => {
                    dispatcher.close();
                    tracing::info!("Input closed, ending session");
                    return Ok(());
                }
                Err(e) => {
                    dispatcher.close();
                    tracing::error!(error = %e, "Failed to read from transport");
                    return Err(e.into());
                }
            };

            if let Some(message) = dispatcher.dispatch(&line).await {
                transport.write_message(&message).await?;
            }
        }
    }

    /// Serves one session over stdin/stdout, ending on SIGINT/SIGTERM
    /// (Ctrl+C on Windows).
    ///
    /// # Errors
    ///
    /// See [`McpServer::serve`].
    pub async fn run(&self) -> Result<(), ServeError> {
        let (handle, signal) = cancellation();
        let listener = tokio::spawn(cancel_on_shutdown_signal(handle));

        let mut transport = StdioTransport::stdio();
        let result = self.serve(&mut transport, signal).await;

        listener.abort();
        result
    }
}

/// Raises `handle` when the process is asked to shut down.
#[cfg(unix)]
async fn cancel_on_shutdown_signal(handle: CancellationHandle) {
    use tokio::signal::unix::{signal, SignalKind};

    let (Ok(mut sigint), Ok(mut sigterm)) = (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) else {
        tracing::warn!("Failed to install signal handlers; shutdown only on end of input");
        return;
    };

    tokio::select! {
        _ = sigint.recv() => tracing::info!("Received SIGINT, initiating graceful shutdown"),
        _ = sigterm.recv() => tracing::info!("Received SIGTERM, initiating graceful shutdown"),
    }
    handle.cancel();
}

/// Raises `handle` when the process is asked to shut down.
#[cfg(windows)]
async fn cancel_on_shutdown_signal(handle: CancellationHandle) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        handle.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::lifecycle::SessionState;

    #[test]
    fn builder_registers_every_kind() {
        let server = McpServer::builder()
            .tool_fn(Tool::new("t", "a tool"), |_ctx, _args| {
                Ok(CallToolResult::text("ok"))
            })
            .resource_fn(Resource::new("mem://r", "r"), |_ctx, uri| {
                Ok(ReadResourceResult {
                    contents: vec![crate::mcp::types::ResourceContents::text(uri, None, "")],
                })
            })
            .prompt_fn(Prompt::new("p"), |_ctx, _args| {
                Ok(GetPromptResult {
                    description: None,
                    messages: Vec::new(),
                })
            })
            .build();

        assert_eq!(server.capabilities().tools.len(), 1);
        assert_eq!(server.capabilities().resources.len(), 1);
        assert_eq!(server.capabilities().prompts.len(), 1);
    }

    #[test]
    fn builder_sets_identity() {
        let server = McpServer::builder()
            .server_info(ServerInfo::new("custom", "1.2.3"))
            .build();
        assert_eq!(server.server_info().name, "custom");
        assert_eq!(server.server_info().version, "1.2.3");
    }

    #[test]
    fn new_session_starts_unconnected() {
        let server = McpServer::builder().build();
        let session = server.session(CancellationSignal::never());
        assert_eq!(session.state(), SessionState::Unconnected);
    }

    #[tokio::test]
    async fn serve_ends_cleanly_at_eof() {
        let server = McpServer::builder().build();
        let mut transport = LineTransport::new(&b""[..], Vec::new());
        server
            .serve(&mut transport, CancellationSignal::never())
            .await
            .unwrap();
        let (_, out) = transport.into_inner();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn blank_lines_are_parse_errors() {
        let server = McpServer::builder().build();
        let mut transport = LineTransport::new(&b"\n   \n"[..], Vec::new());
        server
            .serve(&mut transport, CancellationSignal::never())
            .await
            .unwrap();
        let (_, out) = transport.into_inner();
        let out = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let reply: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(reply["error"]["code"], -32700);
            assert_eq!(reply["id"], serde_json::Value::Null);
        }
    }
}

//! Capability handler interfaces.
//!
//! Capability providers implement one trait per capability kind. The
//! dispatcher only ever sees these traits, so real providers, closures, and
//! test doubles are interchangeable.

use async_trait::async_trait;

use crate::error::HandlerError;
use crate::mcp::cancel::CancellationSignal;
use crate::mcp::protocol::RequestId;
use crate::mcp::types::{Arguments, CallToolResult, GetPromptResult, ReadResourceResult};

/// Per-request context passed to every handler.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// ID of the request being served; `None` for notifications.
    pub request_id: Option<RequestId>,
    /// Name of the method being served.
    pub method: &'static str,
    /// The session's cancellation signal. Handlers that run for a long
    /// time may poll it to give up early.
    pub cancellation: CancellationSignal,
}

impl RequestContext {
    /// Creates a context with a signal that is never raised.
    #[must_use]
    pub fn detached(request_id: Option<RequestId>, method: &'static str) -> Self {
        Self {
            request_id,
            method,
            cancellation: CancellationSignal::never(),
        }
    }
}

/// Executes a tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Calls the tool with the caller-supplied arguments.
    async fn call(
        &self,
        ctx: &RequestContext,
        arguments: Arguments,
    ) -> Result<CallToolResult, HandlerError>;
}

/// Reads a resource.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// Reads the resource identified by `uri`.
    async fn read(&self, ctx: &RequestContext, uri: &str)
        -> Result<ReadResourceResult, HandlerError>;
}

/// Generates a prompt.
#[async_trait]
pub trait PromptHandler: Send + Sync {
    /// Generates the prompt from the caller-supplied arguments.
    async fn get(
        &self,
        ctx: &RequestContext,
        arguments: Arguments,
    ) -> Result<GetPromptResult, HandlerError>;
}

/// Adapts a synchronous closure to a handler trait.
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F> ToolHandler for FnHandler<F>
where
    F: Fn(&RequestContext, Arguments) -> Result<CallToolResult, HandlerError> + Send + Sync,
{
    async fn call(
        &self,
        ctx: &RequestContext,
        arguments: Arguments,
    ) -> Result<CallToolResult, HandlerError> {
        (self.0)(ctx, arguments)
    }
}

#[async_trait]
impl<F> ResourceHandler for FnHandler<F>
where
    F: Fn(&RequestContext, &str) -> Result<ReadResourceResult, HandlerError> + Send + Sync,
{
    async fn read(
        &self,
        ctx: &RequestContext,
        uri: &str,
    ) -> Result<ReadResourceResult, HandlerError> {
        (self.0)(ctx, uri)
    }
}

#[async_trait]
impl<F> PromptHandler for FnHandler<F>
where
    F: Fn(&RequestContext, Arguments) -> Result<GetPromptResult, HandlerError> + Send + Sync,
{
    async fn get(
        &self,
        ctx: &RequestContext,
        arguments: Arguments,
    ) -> Result<GetPromptResult, HandlerError> {
        (self.0)(ctx, arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::types::ResourceContents;

    struct Upper;

    #[async_trait]
    impl ToolHandler for Upper {
        async fn call(
            &self,
            _ctx: &RequestContext,
            arguments: Arguments,
        ) -> Result<CallToolResult, HandlerError> {
            let text = arguments
                .get("text")
                .and_then(serde_json::Value::as_str)
                .ok_or("missing text")?;
            Ok(CallToolResult::text(text.to_uppercase()))
        }
    }

    #[tokio::test]
    async fn trait_object_tool() {
        let handler: Box<dyn ToolHandler> = Box::new(Upper);
        let ctx = RequestContext::detached(Some(RequestId::from(1)), "tools/call");

        let mut args = Arguments::new();
        args.insert("text".into(), "abc".into());
        let result = handler.call(&ctx, args).await.unwrap();
        assert_eq!(result, CallToolResult::text("ABC"));

        let err = handler.call(&ctx, Arguments::new()).await.unwrap_err();
        assert_eq!(err.message(), "missing text");
    }

    #[tokio::test]
    async fn closure_resource() {
        let handler = FnHandler(|_ctx: &RequestContext, uri: &str| -> Result<_, HandlerError> {
            Ok(ReadResourceResult {
                contents: vec![ResourceContents::text(uri, None, "body")],
            })
        });
        let ctx = RequestContext::detached(None, "resources/read");
        let result = ResourceHandler::read(&handler, &ctx, "mem://a").await.unwrap();
        assert_eq!(result.contents[0].uri, "mem://a");
    }
}

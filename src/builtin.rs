//! Built-in demonstration capabilities.
//!
//! Real deployments register their own providers. These three make the
//! binary usable on its own and give clients something to discover:
//!
//! - `echo` tool: returns its arguments as JSON text
//! - `server://info` resource: the server identity as JSON
//! - `describe_capability` prompt: asks the model to explain a capability

use serde_json::{json, Value};

use crate::error::HandlerError;
use crate::mcp::types::{
    CallToolResult, Content, GetPromptResult, Prompt, PromptArgument, PromptMessage,
    ReadResourceResult, Resource, ResourceContents, Role, Tool,
};
use crate::mcp::McpServerBuilder;

/// URI of the server identity resource.
pub const SERVER_INFO_URI: &str = "server://info";

/// Registers the built-in capabilities on `builder`.
#[must_use]
pub fn install(builder: McpServerBuilder) -> McpServerBuilder {
    let info = builder.info().clone();

    builder
        .tool_fn(echo_tool(), |_ctx, arguments| {
            let text = serde_json::to_string(&Value::Object(arguments))?;
            Ok(CallToolResult::text(text))
        })
        .resource_fn(
            Resource::new(SERVER_INFO_URI, "Server information")
                .with_description("Name and version of this server")
                .with_mime_type("application/json"),
            move |_ctx, uri| {
                let body = serde_json::to_string(&info)?;
                Ok(ReadResourceResult {
                    contents: vec![ResourceContents::text(
                        uri,
                        Some("application/json".to_string()),
                        body,
                    )],
                })
            },
        )
        .prompt_fn(describe_prompt(), |_ctx, arguments| {
            let name = arguments
                .get("name")
                .and_then(Value::as_str)
                .filter(|n| !n.is_empty())
                .ok_or_else(|| HandlerError::new("missing required argument: name"))?;

            Ok(GetPromptResult {
                description: Some(format!("Describe the capability '{name}'")),
                messages: vec![PromptMessage {
                    role: Role::User,
                    content: Content::text(format!(
                        "Explain what the capability '{name}' does, which inputs it expects, \
                         and give one example of calling it."
                    )),
                }],
            })
        })
}

fn echo_tool() -> Tool {
    Tool::new("echo", "Return the supplied arguments unchanged, as JSON text.").with_input_schema(
        json!({
            "type": "object",
            "additionalProperties": true
        }),
    )
}

fn describe_prompt() -> Prompt {
    Prompt::new("describe_capability")
        .with_description("Ask the model to explain one of this server's capabilities")
        .with_argument(PromptArgument {
            name: "name".to_string(),
            description: Some("Tool name, resource URI, or prompt name".to_string()),
            required: true,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::types::{Arguments, ServerInfo};
    use crate::mcp::{McpServer, RequestContext};

    fn server() -> McpServer {
        install(McpServer::builder().server_info(ServerInfo::new("demo", "0.1.0"))).build()
    }

    #[tokio::test]
    async fn echo_returns_arguments() {
        let server = server();
        let mut args = Arguments::new();
        args.insert("a".into(), json!(1));

        let ctx = RequestContext::detached(None, "tools/call");
        let result = server
            .capabilities()
            .call_tool(&ctx, "echo", args)
            .await
            .unwrap();
        assert_eq!(result, CallToolResult::text(r#"{"a":1}"#));
    }

    #[tokio::test]
    async fn info_resource_reports_identity() {
        let server = server();
        let ctx = RequestContext::detached(None, "resources/read");
        let result = server
            .capabilities()
            .read_resource(&ctx, SERVER_INFO_URI)
            .await
            .unwrap();

        let text = result.contents[0].text.as_deref().unwrap();
        let info: ServerInfo = serde_json::from_str(text).unwrap();
        assert_eq!(info, ServerInfo::new("demo", "0.1.0"));
    }

    #[tokio::test]
    async fn describe_prompt_requires_name() {
        let server = server();
        let ctx = RequestContext::detached(None, "prompts/get");
        let caps = server.capabilities();

        assert!(caps
            .get_prompt(&ctx, "describe_capability", Arguments::new())
            .await
            .is_err());

        let mut args = Arguments::new();
        args.insert("name".into(), json!("echo"));
        let result = caps
            .get_prompt(&ctx, "describe_capability", args)
            .await
            .unwrap();
        assert_eq!(result.messages.len(), 1);
        assert_eq!(result.messages[0].role, Role::User);
    }
}

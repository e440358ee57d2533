//! Request dispatch.
//!
//! One [`Dispatcher`] serves one session. It parses a raw line, validates
//! the envelope, routes the method through the closed [`Method`] set, and
//! builds the response envelope. Notifications are processed but never
//! answered; parse and version errors are always answered because the
//! message could not be trusted to be a notification.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::mcp::cancel::CancellationSignal;
use crate::mcp::handler::RequestContext;
use crate::mcp::lifecycle::{negotiate, SessionState};
use crate::mcp::protocol::{
    parse_request, JsonRpcError, JsonRpcRequest, JsonRpcResponse, OutgoingMessage, RequestId,
};
use crate::mcp::registry::{Capabilities, InvokeError};
use crate::mcp::types::{
    CallToolParams, GetPromptParams, InitializeParams, ListPromptsResult, ListResourcesResult,
    ListToolsResult, ReadResourceParams, ServerInfo,
};

/// The fixed method surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `initialize`
    Initialize,
    /// `initialized` (also accepted as `notifications/initialized`)
    Initialized,
    /// `tools/list`
    ToolsList,
    /// `tools/call`
    ToolsCall,
    /// `resources/list`
    ResourcesList,
    /// `resources/read`
    ResourcesRead,
    /// `prompts/list`
    PromptsList,
    /// `prompts/get`
    PromptsGet,
    /// `ping`
    Ping,
}

impl Method {
    /// Resolves a method name; `None` for anything outside the fixed set.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let method = match name {
            "initialize" => Self::Initialize,
            "initialized" | "notifications/initialized" => Self::Initialized,
            "tools/list" => Self::ToolsList,
            "tools/call" => Self::ToolsCall,
            "resources/list" => Self::ResourcesList,
            "resources/read" => Self::ResourcesRead,
            "prompts/list" => Self::PromptsList,
            "prompts/get" => Self::PromptsGet,
            "ping" => Self::Ping,
            _ => return None,
        };
        Some(method)
    }

    /// The canonical wire name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::Initialized => "initialized",
            Self::ToolsList => "tools/list",
            Self::ToolsCall => "tools/call",
            Self::ResourcesList => "resources/list",
            Self::ResourcesRead => "resources/read",
            Self::PromptsList => "prompts/list",
            Self::PromptsGet => "prompts/get",
            Self::Ping => "ping",
        }
    }

    /// Whether the method touches the capability registries.
    #[must_use]
    pub const fn is_capability_method(self) -> bool {
        match self {
            Self::ToolsList
            | Self::ToolsCall
            | Self::ResourcesList
            | Self::ResourcesRead
            | Self::PromptsList
            | Self::PromptsGet => true,
            Self::Initialize | Self::Initialized | Self::Ping => false,
        }
    }
}

/// Per-session request dispatcher.
pub struct Dispatcher {
    capabilities: Arc<Capabilities>,
    server_info: ServerInfo,
    require_initialize: bool,
    cancellation: CancellationSignal,
    state: SessionState,
}

impl Dispatcher {
    /// Creates a dispatcher for a fresh session.
    #[must_use]
    pub const fn new(
        capabilities: Arc<Capabilities>,
        server_info: ServerInfo,
        require_initialize: bool,
        cancellation: CancellationSignal,
    ) -> Self {
        Self {
            capabilities,
            server_info,
            require_initialize,
            cancellation,
            state: SessionState::Unconnected,
        }
    }

    /// Returns the current session state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Marks the session closed.
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }

    /// Handles one raw input line.
    ///
    /// Returns the envelope to send, or `None` if nothing must be sent.
    pub async fn dispatch(&mut self, line: &[u8]) -> Option<OutgoingMessage> {
        let request = match parse_request(line) {
            Ok(request) => request,
            Err(error) => {
                tracing::debug!(code = error.code(), id = ?error.id, "Rejected envelope");
                return Some(error.into());
            }
        };

        let id = request.id.clone();
        tracing::debug!(method = %request.method, id = ?id, "Dispatching");

        let outcome = match Method::from_name(&request.method) {
            // Never answered, with or without an ID.
            Some(Method::Initialized) => {
                self.mark_initialized();
                return None;
            }
            Some(method) => self.route(method, &request).await,
            None => Err(JsonRpcError::method_not_found(id.clone(), &request.method)),
        };

        Self::respond(id, &request.method, outcome)
    }

    fn mark_initialized(&mut self) {
        self.state = self.state.on_initialized();
        tracing::debug!(state = ?self.state, "Client reported initialised");
    }

    /// Turns a route outcome into the envelope to send.
    fn respond(
        id: Option<RequestId>,
        method: &str,
        outcome: Result<Value, JsonRpcError>,
    ) -> Option<OutgoingMessage> {
        match (id, outcome) {
            (Some(id), Ok(result)) => Some(JsonRpcResponse::success(id, result).into()),
            (Some(_), Err(error)) => Some(error.into()),
            (None, Ok(_)) => None,
            (None, Err(error)) => {
                tracing::warn!(
                    method = %method,
                    code = error.code(),
                    message = %error.error.message,
                    "Notification failed; no response sent"
                );
                None
            }
        }
    }

    async fn route(
        &mut self,
        method: Method,
        request: &JsonRpcRequest,
    ) -> Result<Value, JsonRpcError> {
        let id = request.id.clone();

        if method.is_capability_method() && self.require_initialize && !self.state.is_initialized()
        {
            return Err(JsonRpcError::invalid_request(id, "Server not initialised"));
        }

        let ctx = RequestContext {
            request_id: id.clone(),
            method: method.name(),
            cancellation: self.cancellation.clone(),
        };
        let caps = &self.capabilities;

        match method {
            Method::Initialize => {
                let params: InitializeParams = decode_params(request, method)?;
                let result = negotiate(&params, &self.server_info);
                self.state = self.state.on_initialize();
                to_result(id, &result)
            }
            Method::Initialized => {
                self.mark_initialized();
                Ok(Value::Null)
            }
            Method::Ping => Ok(json!({})),
            Method::ToolsList => to_result(
                id,
                &ListToolsResult {
                    tools: caps.tools.list(),
                },
            ),
            Method::ResourcesList => to_result(
                id,
                &ListResourcesResult {
                    resources: caps.resources.list(),
                },
            ),
            Method::PromptsList => to_result(
                id,
                &ListPromptsResult {
                    prompts: caps.prompts.list(),
                },
            ),
            Method::ToolsCall => {
                let params: CallToolParams = decode_params(request, method)?;
                let result = caps
                    .call_tool(&ctx, &params.name, params.arguments.unwrap_or_default())
                    .await
                    .map_err(|e| invoke_error(id.clone(), &e))?;
                to_result(id, &result)
            }
            Method::ResourcesRead => {
                let params: ReadResourceParams = decode_params(request, method)?;
                let result = caps
                    .read_resource(&ctx, &params.uri)
                    .await
                    .map_err(|e| invoke_error(id.clone(), &e))?;
                to_result(id, &result)
            }
            Method::PromptsGet => {
                let params: GetPromptParams = decode_params(request, method)?;
                let result = caps
                    .get_prompt(&ctx, &params.name, params.arguments.unwrap_or_default())
                    .await
                    .map_err(|e| invoke_error(id.clone(), &e))?;
                to_result(id, &result)
            }
        }
    }
}

/// Decodes the method's own parameter shape; a missing `params` decodes as `null`.
fn decode_params<T: DeserializeOwned>(
    request: &JsonRpcRequest,
    method: Method,
) -> Result<T, JsonRpcError> {
    let raw = request.params.clone().unwrap_or(Value::Null);
    serde_json::from_value(raw).map_err(|e| {
        JsonRpcError::invalid_params(
            request.id.clone(),
            format!("Invalid {} params", method.name()),
        )
        .with_cause(&e)
    })
}

/// Serialises a typed result, reporting failure as an internal error.
fn to_result<T: Serialize>(id: Option<RequestId>, result: &T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(result).map_err(|e| {
        tracing::error!(error = %e, "Failed to serialise result");
        JsonRpcError::internal_error(id, "Internal error: failed to serialise result").with_cause(&e)
    })
}

/// Maps an invocation failure onto the reserved error codes.
fn invoke_error(id: Option<RequestId>, error: &InvokeError) -> JsonRpcError {
    match error {
        InvokeError::NotFound { .. } => JsonRpcError::invalid_params(id, error.to_string()),
        InvokeError::Failed { kind, key, source } => {
            tracing::warn!(kind = %kind, key = %key, error = %source, "Capability handler failed");
            JsonRpcError::internal_error(id, error.to_string()).with_cause(source)
        }
    }
}

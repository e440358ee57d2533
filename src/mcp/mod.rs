//! Model Context Protocol (MCP) server implementation.
//!
//! This module implements the protocol and dispatch layer that exposes
//! registered tools, resources, and prompts to a single client. The server
//! communicates over stdio transport using JSON-RPC 2.0 messages.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         MCP Server                          │
//! │                                                             │
//! │   ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │   │  Transport  │───▶│ Dispatcher  │───▶│  Registry   │     │
//! │   │   (lines)   │    │ (lifecycle) │    │ (handlers)  │     │
//! │   └─────────────┘    └─────────────┘    └─────────────┘     │
//! │          │                  │                  │            │
//! │          ▼                  ▼                  ▼            │
//! │   ┌─────────────────────────────────────────────────┐       │
//! │   │              JSON-RPC Messages                  │       │
//! │   └─────────────────────────────────────────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Protocol Version
//!
//! This implementation advertises MCP protocol version 2024-11-05.

pub mod cancel;
pub mod dispatcher;
pub mod handler;
pub mod lifecycle;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod transport;
pub mod types;

pub use cancel::{cancellation, CancellationHandle, CancellationSignal};
pub use dispatcher::{Dispatcher, Method};
pub use handler::{FnHandler, PromptHandler, RequestContext, ResourceHandler, ToolHandler};
pub use lifecycle::SessionState;
pub use protocol::{
    ErrorCode, JsonRpcError, JsonRpcRequest, JsonRpcResponse, OutgoingMessage, RequestId,
    MCP_PROTOCOL_VERSION,
};
pub use registry::{Capabilities, CapabilityKind, InvokeError, Registry};
pub use server::{McpServer, McpServerBuilder};
pub use transport::{LineTransport, StdioTransport};

//! capability-mcp: MCP server core for externally registered capabilities
//!
//! This library implements the protocol and dispatch layer of a Model Context
//! Protocol server. Capability providers register tools, resources, and
//! prompts; the server exposes them to one client over line-delimited
//! JSON-RPC 2.0.
//!
//! # Architecture
//!
//! The core owns the protocol. Capability providers own the behaviour:
//!
//! - **Envelopes**: request/response/error shapes and the five reserved error codes
//! - **Registries**: name-keyed tables of descriptors and handlers
//! - **Dispatch**: version validation, method routing, session lifecycle
//! - **Transport**: one request per line in, one response per line out
//!
//! Providers plug in through [`mcp::ToolHandler`], [`mcp::ResourceHandler`]
//! and [`mcp::PromptHandler`].
//!
//! # Modules
//!
//! - [`builtin`] - Small demonstration capabilities
//! - [`config`] - Configuration loading and validation
//! - [`error`] - Error types
//! - [`mcp`] - MCP protocol implementation

pub mod builtin;
pub mod config;
pub mod error;
pub mod mcp;

//! Session lifecycle and capability negotiation.
//!
//! ```text
//! Unconnected --initialize--> Initialized --initialized--> Serving
//!      \                           \                          \
//!       `---------------- EOF / cancellation -----------------`--> Closed
//! ```
//!
//! The server always answers `initialize` with its own protocol version,
//! static capability flags, and identity. The client's declared version is
//! logged and otherwise ignored; there is no rejection path.

use crate::mcp::protocol::MCP_PROTOCOL_VERSION;
use crate::mcp::types::{InitializeParams, InitializeResult, ServerCapabilities, ServerInfo};

/// Session state in the MCP lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for initialize request.
    Unconnected,
    /// Initialize answered, waiting for the initialized notification.
    Initialized,
    /// Ready for normal operation.
    Serving,
    /// End of stream or cancellation.
    Closed,
}

impl SessionState {
    /// Returns `true` once `initialize` has been answered.
    #[must_use]
    pub const fn is_initialized(self) -> bool {
        matches!(self, Self::Initialized | Self::Serving)
    }

    /// State after a successful `initialize`.
    #[must_use]
    pub const fn on_initialize(self) -> Self {
        match self {
            Self::Unconnected => Self::Initialized,
            other => other,
        }
    }

    /// State after the `initialized` notification.
    #[must_use]
    pub const fn on_initialized(self) -> Self {
        match self {
            Self::Initialized => Self::Serving,
            other => other,
        }
    }
}

/// Builds the initialize response for `params`.
#[must_use]
pub fn negotiate(params: &InitializeParams, server_info: &ServerInfo) -> InitializeResult {
    let client = params.client_info.as_ref();
    tracing::info!(
        client_name = client.map_or("<unknown>", |c| c.name.as_str()),
        client_version = client.and_then(|c| c.version.as_deref()).unwrap_or("<unknown>"),
        client_protocol = %params.protocol_version,
        server_protocol = MCP_PROTOCOL_VERSION,
        "Client initialising"
    );

    if params.protocol_version != MCP_PROTOCOL_VERSION {
        tracing::debug!(
            requested = %params.protocol_version,
            "Client requested a different protocol version; answering with ours"
        );
    }

    InitializeResult {
        protocol_version: MCP_PROTOCOL_VERSION.to_string(),
        capabilities: ServerCapabilities::default(),
        server_info: server_info.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::types::{ClientCapabilities, ClientInfo};

    fn params(version: &str) -> InitializeParams {
        InitializeParams {
            protocol_version: version.to_string(),
            capabilities: ClientCapabilities::default(),
            client_info: Some(ClientInfo {
                name: "test-client".to_string(),
                version: Some("1.0.0".to_string()),
            }),
        }
    }

    #[test]
    fn answers_with_fixed_version_regardless_of_client() {
        let info = ServerInfo::new("srv", "9.9.9");
        for version in ["2024-11-05", "2025-06-18", "", "garbage"] {
            let result = negotiate(&params(version), &info);
            assert_eq!(result.protocol_version, MCP_PROTOCOL_VERSION);
            assert_eq!(result.server_info, info);
            assert_eq!(result.capabilities, ServerCapabilities::default());
        }
    }

    #[test]
    fn state_transitions() {
        let state = SessionState::Unconnected;
        assert!(!state.is_initialized());
        assert_eq!(state.on_initialized(), SessionState::Unconnected);

        let state = state.on_initialize();
        assert_eq!(state, SessionState::Initialized);
        assert!(state.is_initialized());

        let state = state.on_initialized();
        assert_eq!(state, SessionState::Serving);
        assert_eq!(state.on_initialize(), SessionState::Serving);

        assert!(!SessionState::Closed.is_initialized());
        assert_eq!(SessionState::Closed.on_initialize(), SessionState::Closed);
    }
}

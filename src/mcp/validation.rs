//! MCP Message Validation
//!
//! Structural checks applied to every incoming JSON-RPC message before it is
//! dispatched: envelope shape, protocol version and per-method parameters.

use crate::mcp::protocol::*;
use anyhow::{Result, anyhow, bail};
use serde_json::Value;
use tracing::debug;

/// Validator for incoming MCP messages
#[derive(Debug, Clone, Default)]
pub struct McpValidator;

impl McpValidator {
    #[inline]
    pub fn new() -> Self {
        Self
    }

    /// Classify and validate a raw JSON value as a JSON-RPC message
    #[inline]
    pub fn validate_raw_message(&self, value: &Value) -> Result<JsonRpcMessage> {
        let object = value
            .as_object()
            .ok_or_else(|| anyhow!("JSON-RPC message must be an object"))?;

        match object.get("jsonrpc").and_then(Value::as_str) {
            Some(JSONRPC_VERSION) => {}
            Some(other) => bail!("Unsupported JSON-RPC version: {}", other),
            None => bail!("Missing jsonrpc version"),
        }

        let has_id = object.contains_key("id");
        let message = if object.contains_key("method") {
            if has_id {
                let request: JsonRpcRequest = serde_json::from_value(value.clone())?;
                self.validate_request(&request)?;
                JsonRpcMessage::Request(request)
            } else {
                JsonRpcMessage::Notification(serde_json::from_value(value.clone())?)
            }
        } else if object.contains_key("result") {
            JsonRpcMessage::Response(serde_json::from_value(value.clone())?)
        } else if object.contains_key("error") {
            JsonRpcMessage::ErrorResponse(serde_json::from_value(value.clone())?)
        } else {
            bail!("Value does not match any known JSON-RPC message type");
        };

        Ok(message)
    }

    /// Validate a JSON-RPC request and its method parameters
    #[inline]
    pub fn validate_request(&self, request: &JsonRpcRequest) -> Result<()> {
        if request.method.trim().is_empty() {
            bail!("Request method cannot be empty");
        }

        match (request.method.as_str(), request.params.as_ref()) {
            ("initialize", Some(params)) => {
                serde_json::from_value::<InitializeParams>(params.clone())
                    .map_err(|e| anyhow!("Invalid initialize params: {}", e))?;
            }
            ("tools/call", Some(params)) => {
                serde_json::from_value::<CallToolParams>(params.clone())
                    .map_err(|e| anyhow!("Invalid tools/call params: {}", e))?;
            }
            (method, _) => debug!("No parameter validation for method: {}", method),
        }

        Ok(())
    }

    /// Check if a protocol version is supported
    #[inline]
    pub fn is_protocol_version_supported(&self, version: &str) -> bool {
        SUPPORTED_PROTOCOL_VERSIONS.contains(&version)
    }

    /// The version to answer an initialize request with, if any
    #[inline]
    pub fn negotiate_protocol_version(&self, requested: &str) -> Option<&'static str> {
        SUPPORTED_PROTOCOL_VERSIONS
            .iter()
            .copied()
            .find(|version| *version == requested)
    }
}

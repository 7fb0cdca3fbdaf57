//! MCP Server Implementation
//!
//! Line-delimited JSON-RPC over any async reader/writer pair, with message
//! routing for initialization, tool discovery and tool calls.

use crate::mcp::protocol::*;
use crate::mcp::validation::McpValidator;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

const SERVER_INSTRUCTIONS: &str = "Research assistant over a document knowledge base. \
Use research_query for multi-step answers, chat_query for quick answers, \
ingest_document to add text and knowledge_base_stats to inspect the store.";

/// MCP Server state and configuration
pub struct McpServer {
    /// Server implementation information
    pub server_info: Implementation,
    /// Server capabilities
    pub capabilities: ServerCapabilities,
    /// Registered tools, keyed by name so listing is stable
    tools: RwLock<BTreeMap<String, Tool>>,
    tool_handlers: RwLock<BTreeMap<String, Arc<dyn ToolHandler>>>,
    connection_state: RwLock<ConnectionState>,
    validator: McpValidator,
}

/// Connection state tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    Initializing,
    Ready,
    Closed,
}

/// Tool handler trait for implementing tool execution
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult>;
}

impl McpServer {
    /// Create a new MCP server
    #[inline]
    pub fn new(name: String, version: String) -> Self {
        let server_info = Implementation { name, version };

        let capabilities = ServerCapabilities {
            logging: Some(LoggingCapability {}),
            tools: Some(ToolsCapability {
                list_changed: Some(false),
            }),
        };

        Self {
            server_info,
            capabilities,
            tools: RwLock::new(BTreeMap::new()),
            tool_handlers: RwLock::new(BTreeMap::new()),
            connection_state: RwLock::new(ConnectionState::Uninitialized),
            validator: McpValidator::new(),
        }
    }

    /// Register a tool with the server
    #[inline]
    pub async fn register_tool<H>(&self, tool: Tool, handler: H)
    where
        H: ToolHandler + 'static,
    {
        let tool_name = tool.name.clone();

        self.tools.write().await.insert(tool_name.clone(), tool);
        self.tool_handlers
            .write()
            .await
            .insert(tool_name.clone(), Arc::new(handler));

        debug!("Registered tool: {}", tool_name);
    }

    /// Start the server using stdio transport
    #[inline]
    pub async fn serve_stdio(self: Arc<Self>) -> Result<()> {
        info!("Starting MCP server with stdio transport");
        let reader = BufReader::new(tokio::io::stdin());
        self.serve(reader, tokio::io::stdout()).await
    }

    /// Serve line-delimited JSON-RPC until the reader is exhausted
    #[inline]
    pub async fn serve<R, W>(self: Arc<Self>, mut reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    info!("EOF reached, closing connection");
                    break;
                }
                Ok(_) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    self.process_line(line, &mut writer).await?;
                }
                Err(e) => {
                    error!("Error reading from transport: {}", e);
                    break;
                }
            }
        }

        *self.connection_state.write().await = ConnectionState::Closed;

        info!("MCP server stopped");
        Ok(())
    }

    async fn process_line<W>(&self, line: &str, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let raw_value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                error!("Failed to parse JSON: {}", e);
                return self
                    .send_error_response(writer, JsonRpcError::parse_error(), None)
                    .await;
            }
        };

        match self.validator.validate_raw_message(&raw_value) {
            Ok(message) => {
                if let Err(e) = self.process_message(message, writer).await {
                    error!("Error processing message: {}", e);
                }
                Ok(())
            }
            Err(e) => {
                error!("Message validation failed: {}", e);
                let id = raw_value
                    .get("id")
                    .and_then(|id| serde_json::from_value::<RequestId>(id.clone()).ok());
                self.send_error_response(writer, JsonRpcError::invalid_request(), id)
                    .await
            }
        }
    }

    /// Get current connection state
    #[inline]
    pub async fn connection_state(&self) -> ConnectionState {
        *self.connection_state.read().await
    }

    /// Process an incoming message
    #[inline]
    pub async fn process_message<W>(&self, message: JsonRpcMessage, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        match message {
            JsonRpcMessage::Request(request) => self.handle_request(request, writer).await,
            JsonRpcMessage::Notification(notification) => {
                self.handle_notification(&notification).await;
                Ok(())
            }
            JsonRpcMessage::Response(_) | JsonRpcMessage::ErrorResponse(_) => {
                warn!("Received unexpected response message from client");
                Ok(())
            }
        }
    }

    /// Handle a JSON-RPC request
    async fn handle_request<W>(&self, request: JsonRpcRequest, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params).await,
            "tools/list" => self.handle_list_tools().await,
            "tools/call" => self.handle_call_tool(request.params).await,
            "ping" => Ok(serde_json::json!({})),
            _ => {
                debug!("Unknown method: {}", request.method);
                return self
                    .send_error_response(
                        writer,
                        JsonRpcError::method_not_found(),
                        Some(request.id),
                    )
                    .await;
            }
        };

        match response {
            Ok(result) => {
                let response = JsonRpcResponse::new(result, request.id);
                self.send_message(writer, &JsonRpcMessage::Response(response))
                    .await
            }
            Err(error) => {
                error!("Error handling request {}: {}", request.method, error.message);
                self.send_error_response(writer, error, Some(request.id))
                    .await
            }
        }
    }

    /// Handle a JSON-RPC notification
    async fn handle_notification(&self, notification: &JsonRpcNotification) {
        match notification.method.as_str() {
            "initialized" | "notifications/initialized" => {
                *self.connection_state.write().await = ConnectionState::Ready;
                info!("Server ready to handle requests");
            }
            "notifications/cancelled" => debug!("Received cancellation notification"),
            _ => warn!("Unknown notification method: {}", notification.method),
        }
    }

    /// Handle initialize request
    async fn handle_initialize(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: InitializeParams = params
            .ok_or_else(|| anyhow!("Initialize request missing parameters"))
            .and_then(|p| serde_json::from_value(p).map_err(anyhow::Error::from))
            .map_err(|e| JsonRpcError::invalid_params(Some(e.to_string())))?;

        let protocol_version = self
            .validator
            .negotiate_protocol_version(&params.protocol_version)
            .ok_or_else(|| JsonRpcError::unsupported_protocol_version(&params.protocol_version))?;

        *self.connection_state.write().await = ConnectionState::Initializing;

        let result = InitializeResult {
            protocol_version: protocol_version.to_string(),
            capabilities: self.capabilities.clone(),
            server_info: self.server_info.clone(),
            instructions: Some(SERVER_INSTRUCTIONS.to_string()),
        };

        info!(
            "Client initialized: {} {} (protocol {})",
            params.client_info.name, params.client_info.version, protocol_version
        );
        to_result_value(&result)
    }

    /// Handle list tools request
    async fn handle_list_tools(&self) -> Result<Value, JsonRpcError> {
        let tools: Vec<Tool> = self.tools.read().await.values().cloned().collect();
        to_result_value(&ListToolsResult { tools })
    }

    /// Handle call tool request
    async fn handle_call_tool(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: CallToolParams = params
            .ok_or_else(|| anyhow!("Tool call request missing parameters"))
            .and_then(|p| serde_json::from_value(p).map_err(anyhow::Error::from))
            .map_err(|e| JsonRpcError::invalid_params(Some(e.to_string())))?;

        // Clone the handler out so the lock is not held across the call
        let handler = self.tool_handlers.read().await.get(&params.name).cloned();
        let handler = handler.ok_or_else(|| JsonRpcError::tool_not_found(&params.name))?;

        debug!("Calling tool: {}", params.name);
        let result = handler
            .handle(params)
            .await
            .map_err(|e| JsonRpcError::invalid_params(Some(e.to_string())))?;
        to_result_value(&result)
    }

    /// Send a message to the client
    async fn send_message<W>(&self, writer: &mut W, message: &JsonRpcMessage) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let json = serde_json::to_string(message)?;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    /// Send an error response
    async fn send_error_response<W>(
        &self,
        writer: &mut W,
        error: JsonRpcError,
        id: Option<RequestId>,
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let error_response = JsonRpcErrorResponse::new(error, id);
        let message = JsonRpcMessage::ErrorResponse(error_response);
        self.send_message(writer, &message).await
    }
}

fn to_result_value<T: serde::Serialize>(value: &T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| JsonRpcError::internal_error(Some(e.to_string())))
}

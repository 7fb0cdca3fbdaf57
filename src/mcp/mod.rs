//! MCP (Model Context Protocol) Server Implementation
//!
//! This module exposes the research engine as MCP tools over line-delimited
//! JSON-RPC 2.0, following MCP protocol version 2025-06-18.


pub mod protocol;
pub mod server;
pub mod tools;
pub mod validation;

use std::sync::Arc;

pub use server::{ConnectionState, McpServer, ToolHandler};
pub use tools::register_research_tools;

use crate::engine::ResearchEngine;

/// Server with every research tool registered against `engine`
#[inline]
pub async fn research_server(engine: &Arc<ResearchEngine>) -> Arc<McpServer> {
    let server = McpServer::new(
        env!("CARGO_PKG_NAME").to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
    );
    register_research_tools(&server, engine).await;
    Arc::new(server)
}

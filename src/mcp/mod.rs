//! Model Context Protocol (MCP) server handling and JSON-RPC implementations
//!
//! Protocol-level request validation, version negotiation, response formatting
//! and routing, shared by every transport.

pub mod rpc;
pub mod server;

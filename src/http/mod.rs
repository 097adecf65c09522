//! Optional HTTP transport for the Model Context Protocol
//!
//! A bearer-protected `/mcp` endpoint plus public health and discovery routes.

pub mod handlers;

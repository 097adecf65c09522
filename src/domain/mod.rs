//! Business operations exposed over the MCP protocol
//!
//! Validation, normalization and the response envelope are shared by every
//! tool and resource; `tools` and `resources` bind them to the external clients.

pub mod envelope;
pub mod normalize;
pub mod resources;
pub mod tools;
pub mod utils;
pub mod validation;

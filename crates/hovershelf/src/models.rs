//! These models represent the objects passed around by the agent
//!
//! There are a few related formats we need to interact with:
//! - openai messages/tools, sent from the agent to the LLM
//! - mcp tool definitions and tool results, exchanged with the tool servers
//! - the text blobs returned by the memory and browsing services
//!
//! We always immediately convert those data models into the internal structs using to/from
//! helpers, so the internal models are not an exact match to any of these formats.
pub mod content;
pub mod message;
pub mod role;
pub mod tool;

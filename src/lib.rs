//! # Travel Assistant
//!
//! A conversational travel assistant that answers questions from a local
//! collection of travel documents, falling back to web search.
//!
//! This library provides:
//! - A tool-based agent loop that lets the model choose between document
//!   retrieval and web search
//! - A persistent vector index built once from PDF/text documents
//! - An in-memory session manager with expiry and per-session serialization
//!
//! ## Architecture
//!
//! Each turn follows the "tools in a loop" pattern:
//! 1. Resolve the session and append the user message
//! 2. Call the model with the conversation and the two tools
//! 3. Execute any tool calls and feed the results back
//! 4. Repeat until the model answers, then record the turn
//!
//! ## Example
//!
//! ```rust,ignore
//! use travel_assistant::chat::{ChatRequest, ChatService};
//!
//! let response = service.handle(ChatRequest::new("What places to visit in Manali?", None)).await?;
//! println!("{} (sources: {:?})", response.response, response.sources_used);
//! ```

pub mod agent;
pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
pub mod retrieval;
pub mod session;
pub mod tools;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::{Error, Result};

//! Financial Canvas Agent
//!
//! A conversational agent that populates a financial modeling canvas:
//! - Maintains one ongoing dialogue with the Gemini API (streamed)
//! - Registers uploaded files as session-scoped context
//! - Extracts transaction nodes via schema-constrained generation,
//!   explicitly (`create:`) or when the model calls the extraction tool
//! - Keeps an additive, session-owned record of every node created
//!
//! A separate tool-orchestration experiment wires a chat model with
//! canned tools and a middleware chain (dynamic prompt, model tier by
//! conversation length, tool-call guard).

pub mod config;
pub mod error;
pub mod experiment;
pub mod extraction;
pub mod gemini;
pub mod models;
pub mod repl;
pub mod schema;
pub mod session;
pub mod upload;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use session::CanvasSession;

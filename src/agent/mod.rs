//! Agent module - the conversational routing logic.
//!
//! The agent follows a "tools in a loop" pattern:
//! 1. Call the LLM with the conversation and the available tools
//! 2. If the LLM requests tool calls, execute them and append the results
//! 3. Repeat until the LLM produces a final answer or the iteration cap is hit

mod agent_loop;
mod prompt;

pub use agent_loop::{Agent, AgentRun, RunOutcome, APOLOGY, ITERATION_LIMIT_MESSAGE};
pub use prompt::build_system_prompt;

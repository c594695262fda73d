//! Core agent loop implementation.

use std::sync::Arc;

use futures::future::join_all;

use crate::llm::{ConversationState, LlmClient, Message, ToolCall};
use crate::tools::ToolRegistry;

use super::prompt::build_system_prompt;

/// Answer given when the model cannot be reached or returns nothing usable.
pub const APOLOGY: &str = "Sorry, I encountered an error. Please try again.";

/// Answer given when the model keeps requesting tools past the iteration cap.
pub const ITERATION_LIMIT_MESSAGE: &str = "I wasn't able to finish researching that within the allowed number of steps. Please try rephrasing your question.";

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The model produced a final answer
    Answered,
    /// The model call failed or returned neither text nor tool calls
    ModelFailed,
    /// The iteration cap was reached while tools were still requested
    IterationLimit,
}

/// Result of driving one user turn to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRun {
    pub answer: String,
    pub iterations: usize,
    pub outcome: RunOutcome,
}

enum LoopState {
    AwaitingModel,
    ExecutingTools(Vec<ToolCall>),
    Done(AgentRun),
}

/// The conversational agent.
pub struct Agent {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    system_prompt: String,
    max_iterations: usize,
}

impl Agent {
    pub fn new(llm: Arc<dyn LlmClient>, tools: Arc<ToolRegistry>, max_iterations: usize) -> Self {
        let system_prompt = build_system_prompt(&tools);
        Self {
            llm,
            tools,
            system_prompt,
            max_iterations: max_iterations.max(1),
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Drive the conversation until the model answers.
    ///
    /// Assistant and tool result messages are appended to `conversation` as
    /// they are produced. Model failures end the run with [`APOLOGY`]; tool
    /// failures are handed back to the model as tool results.
    pub async fn run(&self, conversation: &mut ConversationState) -> AgentRun {
        let tool_schemas = self.tools.get_tool_schemas();
        let mut iterations = 0;
        let mut state = LoopState::AwaitingModel;

        loop {
            state = match state {
                LoopState::Done(run) => return run,

                LoopState::AwaitingModel if iterations >= self.max_iterations => {
                    tracing::warn!(
                        "Max iterations ({}) reached without a final answer",
                        self.max_iterations
                    );
                    finish(
                        conversation,
                        ITERATION_LIMIT_MESSAGE,
                        iterations,
                        RunOutcome::IterationLimit,
                    )
                }

                LoopState::AwaitingModel => {
                    iterations += 1;
                    tracing::debug!("Agent iteration {}", iterations);

                    match self
                        .llm
                        .complete(&self.system_prompt, conversation.messages(), &tool_schemas)
                        .await
                    {
                        Err(e) => {
                            tracing::warn!("Model call failed: {}", e);
                            finish(conversation, APOLOGY, iterations, RunOutcome::ModelFailed)
                        }
                        Ok(response) if !response.tool_calls.is_empty() => {
                            let calls = response.tool_calls.clone();
                            append(
                                conversation,
                                Message::Assistant {
                                    content: response.content.unwrap_or_default(),
                                    tool_calls: response.tool_calls,
                                },
                            );
                            LoopState::ExecutingTools(calls)
                        }
                        Ok(response) => match response.content {
                            Some(text) if !text.trim().is_empty() => {
                                finish(conversation, &text, iterations, RunOutcome::Answered)
                            }
                            _ => {
                                tracing::warn!("Model returned neither text nor tool calls");
                                finish(conversation, APOLOGY, iterations, RunOutcome::ModelFailed)
                            }
                        },
                    }
                }

                LoopState::ExecutingTools(calls) => {
                    tracing::debug!("Executing {} tool calls", calls.len());
                    let results = join_all(calls.iter().map(|call| self.tools.dispatch(call))).await;
                    for result in results {
                        append(conversation, result);
                    }
                    LoopState::AwaitingModel
                }
            };
        }
    }
}

fn finish(
    conversation: &mut ConversationState,
    answer: &str,
    iterations: usize,
    outcome: RunOutcome,
) -> LoopState {
    append(conversation, Message::assistant(answer));
    LoopState::Done(AgentRun {
        answer: answer.to_string(),
        iterations,
        outcome,
    })
}

fn append(conversation: &mut ConversationState, message: Message) {
    if let Err(e) = conversation.push(message) {
        tracing::error!("Dropped message that would break the conversation: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::llm::ModelResponse;
    use crate::testing::{ScriptedLlm, StaticTool};
    use crate::tools::{PDF_SEARCH, WEB_SEARCH};

    fn registry() -> Arc<ToolRegistry> {
        Arc::new(ToolRegistry::from_tools(vec![
            Arc::new(StaticTool::ok(PDF_SEARCH, "PDF Documents", "Hadimba temple, Solang valley")),
            Arc::new(StaticTool::failing(WEB_SEARCH, "Web Search", "timed out")),
        ]))
    }

    fn conversation(question: &str) -> ConversationState {
        let mut convo = ConversationState::new();
        convo.push(Message::user(question)).unwrap();
        convo
    }

    #[tokio::test]
    async fn tool_free_response_finishes_in_one_iteration() {
        let llm = Arc::new(ScriptedLlm::new(vec![Ok(ModelResponse::text("  Hello traveller!  "))]));
        let agent = Agent::new(llm.clone(), registry(), 10);
        let mut convo = conversation("hi");

        let run = agent.run(&mut convo).await;

        assert_eq!(run.iterations, 1);
        assert_eq!(run.outcome, RunOutcome::Answered);
        assert_eq!(run.answer, "  Hello traveller!  ");
        assert_eq!(convo.last(), Some(&Message::assistant("  Hello traveller!  ")));
        assert_eq!(llm.seen().len(), 1);
    }

    #[tokio::test]
    async fn every_tool_call_gets_a_result_in_call_order() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok(ModelResponse::calls(vec![
                ToolCall::with_query("call_a", WEB_SEARCH, "Manali weather"),
                ToolCall::with_query("call_b", PDF_SEARCH, "Manali places to visit"),
                ToolCall::with_query("call_c", "hotel_search", "Manali hotels"),
            ])),
            Ok(ModelResponse::text("Visit Hadimba temple.")),
        ]));
        let agent = Agent::new(llm.clone(), registry(), 10);
        let mut convo = conversation("What places to visit in Manali?");

        let run = agent.run(&mut convo).await;
        assert_eq!(run.iterations, 2);

        // The second model call sees the three results right after the request.
        let second_view = &llm.seen()[1];
        assert_eq!(second_view.len(), 5);
        assert_eq!(
            &second_view[2..],
            &[
                Message::tool_result("call_a", "Tool web_search failed: timed out"),
                Message::tool_result("call_b", "Hadimba temple, Solang valley"),
                Message::tool_result("call_c", "Tool hotel_search failed: unknown tool"),
            ]
        );
        assert_eq!(convo.len(), 6);
    }

    #[tokio::test]
    async fn model_failure_degrades_to_apology() {
        let llm = Arc::new(ScriptedLlm::new(vec![Err(ProviderError::Http {
            provider: "llm",
            status: 503,
            body: "overloaded".to_string(),
        })]));
        let agent = Agent::new(llm, registry(), 10);
        let mut convo = conversation("Best time to visit Goa?");

        let run = agent.run(&mut convo).await;

        assert_eq!(run.outcome, RunOutcome::ModelFailed);
        assert_eq!(run.answer, APOLOGY);
        assert_eq!(convo.last(), Some(&Message::assistant(APOLOGY)));
    }

    #[tokio::test]
    async fn empty_response_is_treated_as_failure() {
        let llm = Arc::new(ScriptedLlm::new(vec![Ok(ModelResponse::text("   "))]));
        let agent = Agent::new(llm, registry(), 10);

        let run = agent.run(&mut conversation("hi")).await;
        assert_eq!(run.outcome, RunOutcome::ModelFailed);
    }

    #[tokio::test]
    async fn iteration_cap_synthesizes_final_answer() {
        let script = (0..5)
            .map(|i| {
                Ok(ModelResponse::calls(vec![ToolCall::with_query(
                    format!("call_{i}"),
                    PDF_SEARCH,
                    "Manali",
                )]))
            })
            .collect();
        let llm = Arc::new(ScriptedLlm::new(script));
        let agent = Agent::new(llm.clone(), registry(), 3);
        let mut convo = conversation("Plan my whole year");

        let run = agent.run(&mut convo).await;

        assert_eq!(run.outcome, RunOutcome::IterationLimit);
        assert_eq!(run.iterations, 3);
        assert_eq!(run.answer, ITERATION_LIMIT_MESSAGE);
        assert_eq!(llm.seen().len(), 3);
        // user + 3 x (request + result) + final
        assert_eq!(convo.len(), 8);
    }

    #[tokio::test]
    async fn no_documents_sentinel_is_an_ordinary_tool_result() {
        let tools = Arc::new(ToolRegistry::from_tools(vec![Arc::new(StaticTool::ok(
            PDF_SEARCH,
            "PDF Documents",
            crate::tools::NO_DOCUMENTS_FOUND,
        ))]));
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok(ModelResponse::calls(vec![ToolCall::with_query(
                "c1",
                PDF_SEARCH,
                "Antarctica cruises",
            )])),
            Ok(ModelResponse::text("I couldn't find that in the documents.")),
        ]));
        let agent = Agent::new(llm.clone(), tools, 10);

        let run = agent.run(&mut conversation("Antarctica cruises?")).await;

        assert_eq!(run.outcome, RunOutcome::Answered);
        assert_eq!(
            llm.seen()[1].last(),
            Some(&Message::tool_result("c1", crate::tools::NO_DOCUMENTS_FOUND))
        );
    }

    #[tokio::test]
    async fn tools_receive_positional_and_fallback_arguments() {
        let pdf = Arc::new(StaticTool::ok(PDF_SEARCH, "PDF Documents", "Visa on arrival"));
        let tools = Arc::new(ToolRegistry::from_tools(vec![pdf.clone() as Arc<dyn crate::tools::Tool>]));

        let positional = ToolCall {
            id: "c1".to_string(),
            name: PDF_SEARCH.to_string(),
            arguments: [("__arg1".to_string(), "Dubai visa".to_string())].into(),
        };
        let unnamed = ToolCall {
            id: "c2".to_string(),
            name: PDF_SEARCH.to_string(),
            arguments: [("destination".to_string(), "Goa".to_string())].into(),
        };
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok(ModelResponse::calls(vec![positional, unnamed])),
            Ok(ModelResponse::text("Visa on arrival.")),
        ]));
        let agent = Agent::new(llm, tools, 10);

        let run = agent.run(&mut conversation("Dubai visa?")).await;

        assert_eq!(run.outcome, RunOutcome::Answered);
        assert_eq!(
            pdf.queries(),
            vec!["Dubai visa".to_string(), r#"{"destination":"Goa"}"#.to_string()]
        );
    }
}

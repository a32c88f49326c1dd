//! Tool-orchestration experiment
//!
//! An independent agent wired around a chat model with two canned lookup
//! tools and three middleware hooks: role-based prompt selection,
//! conversation-length model selection, and a tool-call guard. It shares
//! no state with the canvas session.
//!
//! Two drivers exist: [`ExperimentAgent::invoke`] blocks and returns the
//! final state; [`ExperimentAgent::stream`] yields a full state snapshot
//! after every internal step.

pub mod middleware;
pub mod tools;

use crate::config::Config;
use crate::error::CanvasError;
use crate::gemini::{
    Content, FunctionCall, FunctionDeclaration, GeminiClient, GenerateRequest, Part,
    SystemInstruction, ToolDeclarations,
};
use crate::Result;
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

const MAX_STEPS: usize = 10;

//
// ================= State =================
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserRole {
    Expert,
    Beginner,
    General,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    Tool,
}

/// A tool invocation requested by the model, with a locally minted id so
/// results can be correlated back.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub args: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Option<String>,
    pub tool_calls: Vec<ToolInvocation>,
    pub tool_call_id: Option<String>,
    pub tool_name: Option<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn assistant_with_calls(content: Option<String>, calls: Vec<ToolInvocation>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            tool_calls: calls,
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn tool_result(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
            tool_name: Some(tool_name.into()),
        }
    }
}

/// Full agent state: the message list plus the custom fields carried
/// alongside it.
#[derive(Debug, Clone)]
pub struct AgentState {
    pub messages: Vec<ChatMessage>,
    pub user_role: UserRole,
    pub user_preferences: HashMap<String, String>,
}

impl AgentState {
    pub fn new(user_role: UserRole) -> Self {
        Self {
            messages: Vec::new(),
            user_role,
            user_preferences: HashMap::new(),
        }
    }

    pub fn with_preference(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.user_preferences.insert(key.into(), value.into());
        self
    }

    pub fn with_user_message(mut self, content: impl Into<String>) -> Self {
        self.messages.push(ChatMessage::user(content));
        self
    }

    pub fn last_message(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }
}

//
// ================= Backend seam =================
//

/// What one model call produced: optional text plus requested tool calls.
#[derive(Debug, Clone, Default)]
pub struct AssistantReply {
    pub content: Option<String>,
    pub calls: Vec<ToolInvocation>,
}

/// Seam for the chat model, so the run loop is testable without a
/// network.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(
        &self,
        model: &str,
        system_prompt: &str,
        messages: &[ChatMessage],
        tools: &[FunctionDeclaration],
    ) -> Result<AssistantReply>;
}

/// Gemini-backed implementation
pub struct GeminiBackend {
    client: GeminiClient,
}

impl GeminiBackend {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }

    fn to_contents(messages: &[ChatMessage]) -> Vec<Content> {
        messages
            .iter()
            .map(|message| match message.role {
                Role::User => {
                    Content::user(vec![Part::text(message.content.clone().unwrap_or_default())])
                }
                Role::Assistant => {
                    let mut parts = Vec::new();
                    if let Some(content) = &message.content {
                        if !content.is_empty() {
                            parts.push(Part::text(content.clone()));
                        }
                    }
                    for call in &message.tool_calls {
                        parts.push(Part::function_call(FunctionCall {
                            name: call.name.clone(),
                            args: call.args.clone(),
                        }));
                    }
                    if parts.is_empty() {
                        parts.push(Part::text(String::new()));
                    }
                    Content::model(parts)
                }
                Role::Tool => Content::user(vec![Part::function_response(
                    message.tool_name.clone().unwrap_or_default(),
                    json!({ "result": message.content.clone().unwrap_or_default() }),
                )]),
            })
            .collect()
    }
}

#[async_trait]
impl ChatBackend for GeminiBackend {
    async fn complete(
        &self,
        model: &str,
        system_prompt: &str,
        messages: &[ChatMessage],
        tools: &[FunctionDeclaration],
    ) -> Result<AssistantReply> {
        let request = GenerateRequest {
            contents: Self::to_contents(messages),
            system_instruction: Some(SystemInstruction::from_text(system_prompt)),
            generation_config: None,
            tools: if tools.is_empty() {
                None
            } else {
                Some(vec![ToolDeclarations {
                    function_declarations: tools.to_vec(),
                }])
            },
        };

        let response = self.client.generate(model, &request).await?;

        let text = response.text();
        let calls = response
            .function_calls()
            .into_iter()
            .map(|call| ToolInvocation {
                id: Uuid::new_v4().to_string(),
                name: call.name,
                args: call.args,
            })
            .collect();

        Ok(AssistantReply {
            content: if text.is_empty() { None } else { Some(text) },
            calls,
        })
    }
}

//
// ================= Agent =================
//

/// The experiment agent: backend + tools + the middleware chain applied
/// on every step.
pub struct ExperimentAgent<B: ChatBackend> {
    backend: B,
    tools: tools::ToolRegistry,
    basic_model: String,
    advanced_model: String,
}

impl<B: ChatBackend> ExperimentAgent<B> {
    pub fn new(backend: B, tools: tools::ToolRegistry, config: &Config) -> Self {
        Self {
            backend,
            tools,
            basic_model: config.basic_model.clone(),
            advanced_model: config.advanced_model.clone(),
        }
    }

    /// Single blocking invocation returning the final state.
    pub async fn invoke(&self, mut state: AgentState) -> Result<AgentState> {
        self.run(&mut state, None).await?;
        Ok(state)
    }

    /// Streamed invocation: a full state snapshot is emitted after every
    /// internal step (model reply or tool execution round).
    pub fn stream(self: Arc<Self>, state: AgentState) -> mpsc::Receiver<AgentState>
    where
        B: 'static,
    {
        let (tx, rx) = mpsc::channel(16);

        tokio::spawn(async move {
            let mut state = state;
            if let Err(e) = self.run(&mut state, Some(tx)).await {
                warn!("Streamed agent run failed: {}", e);
            }
        });

        rx
    }

    async fn snapshot(tx: &Option<mpsc::Sender<AgentState>>, state: &AgentState) {
        if let Some(tx) = tx {
            let _ = tx.send(state.clone()).await;
        }
    }

    async fn run(
        &self,
        state: &mut AgentState,
        snapshots: Option<mpsc::Sender<AgentState>>,
    ) -> Result<()> {
        let declarations = self.tools.declarations();

        for step in 0..MAX_STEPS {
            let system_prompt = middleware::select_system_prompt(state);
            let tier = middleware::select_model_tier(state);
            let model = match tier {
                middleware::ModelTier::Basic => self.basic_model.as_str(),
                middleware::ModelTier::Advanced => self.advanced_model.as_str(),
            };

            debug!(step, model = %model, ?tier, "Agent step");

            let reply = self
                .backend
                .complete(model, &system_prompt, &state.messages, &declarations)
                .await?;

            if reply.calls.is_empty() {
                state
                    .messages
                    .push(ChatMessage::assistant(reply.content.unwrap_or_default()));
                Self::snapshot(&snapshots, state).await;
                return Ok(());
            }

            let calls = reply.calls.clone();
            state
                .messages
                .push(ChatMessage::assistant_with_calls(reply.content, reply.calls));
            Self::snapshot(&snapshots, state).await;

            for call in &calls {
                let result = middleware::guard_tool_call(&self.tools, call).await;
                state.messages.push(result);
            }
            Self::snapshot(&snapshots, state).await;
        }

        Err(CanvasError::ToolError(format!(
            "Agent reached max steps ({})",
            MAX_STEPS
        )))
    }
}

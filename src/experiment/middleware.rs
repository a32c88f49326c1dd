//! Middleware hooks applied on every agent step
//!
//! Three hooks: a prompt generator keyed by the user role carried in
//! custom state, a model-tier selector keyed by cumulative message
//! count, and a tool-call guard that converts tool failures into normal
//! tool-result messages.

use crate::experiment::tools::ToolRegistry;
use crate::experiment::{AgentState, ChatMessage, ToolInvocation, UserRole};
use tracing::warn;

/// Message count at which the advanced tier takes over (inclusive)
pub const MODEL_SWITCH_THRESHOLD: usize = 20;

const BASE_PROMPT: &str = "You are a helpful assistant. You have access to the following tools:\n\
                           - get_weather: Get weather for a given city.\n\
                           - get_forecast: Get forecast for a given city.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    Basic,
    Advanced,
}

/// Generate the system prompt for the current state.
pub fn select_system_prompt(state: &AgentState) -> String {
    match state.user_role {
        UserRole::Expert => format!("{} Provide detailed technical responses.", BASE_PROMPT),
        UserRole::Beginner => format!(
            "{} Explain concepts simply and avoid jargon.",
            BASE_PROMPT
        ),
        UserRole::General => BASE_PROMPT.to_string(),
    }
}

/// Select the model tier from the cumulative message count.
pub fn select_model_tier(state: &AgentState) -> ModelTier {
    if state.messages.len() >= MODEL_SWITCH_THRESHOLD {
        ModelTier::Advanced
    } else {
        ModelTier::Basic
    }
}

/// Execute a tool call, converting any failure into a normal tool-result
/// message so a failing tool never aborts the run.
pub async fn guard_tool_call(tools: &ToolRegistry, call: &ToolInvocation) -> ChatMessage {
    match tools.execute(&call.name, &call.args).await {
        Ok(output) => ChatMessage::tool_result(&call.id, &call.name, output),
        Err(e) => {
            warn!(tool = %call.name, error = %e, "Tool call failed, continuing");
            ChatMessage::tool_result(
                &call.id,
                &call.name,
                format!(
                    "Tool error: Please check your input and try again. ({})",
                    e
                ),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CanvasError;
    use crate::experiment::tools::{default_registry, ExperimentTool, ToolRegistry};
    use crate::Result;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    fn state_with_messages(count: usize, role: UserRole) -> AgentState {
        let mut state = AgentState::new(role);
        for i in 0..count {
            state.messages.push(ChatMessage::user(format!("m{}", i)));
        }
        state
    }

    #[test]
    fn test_prompt_variants_by_role() {
        let expert = select_system_prompt(&state_with_messages(0, UserRole::Expert));
        assert!(expert.ends_with("Provide detailed technical responses."));

        let beginner = select_system_prompt(&state_with_messages(0, UserRole::Beginner));
        assert!(beginner.contains("avoid jargon"));

        let general = select_system_prompt(&state_with_messages(0, UserRole::General));
        assert_eq!(general, BASE_PROMPT);
    }

    #[test]
    fn test_model_switch_boundary_is_inclusive_at_twenty() {
        let below = state_with_messages(19, UserRole::General);
        assert_eq!(select_model_tier(&below), ModelTier::Basic);

        let at = state_with_messages(20, UserRole::General);
        assert_eq!(select_model_tier(&at), ModelTier::Advanced);

        let above = state_with_messages(35, UserRole::General);
        assert_eq!(select_model_tier(&above), ModelTier::Advanced);
    }

    struct ExplodingTool;

    #[async_trait]
    impl ExperimentTool for ExplodingTool {
        fn name(&self) -> &'static str {
            "explode"
        }

        fn description(&self) -> &'static str {
            "Always fails"
        }

        fn parameters_schema(&self) -> serde_json::Value {
            json!({"type": "object", "properties": {}})
        }

        async fn call(&self, _args: &serde_json::Value) -> Result<String> {
            Err(CanvasError::ToolError("boom".to_string()))
        }
    }

    #[tokio::test]
    async fn test_guard_converts_failure_into_tool_result() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(ExplodingTool));

        let call = ToolInvocation {
            id: "call-9".to_string(),
            name: "explode".to_string(),
            args: json!({}),
        };

        let message = guard_tool_call(&registry, &call).await;
        assert_eq!(message.tool_call_id.as_deref(), Some("call-9"));
        let content = message.content.as_deref().unwrap();
        assert!(content.starts_with("Tool error"));
        assert!(content.contains("boom"));
    }

    #[tokio::test]
    async fn test_guard_handles_unknown_tool() {
        let registry = default_registry();
        let call = ToolInvocation {
            id: "call-0".to_string(),
            name: "get_stock_price".to_string(),
            args: json!({"symbol": "ACME"}),
        };

        let message = guard_tool_call(&registry, &call).await;
        assert!(message.content.as_deref().unwrap().contains("Tool error"));
    }

    #[tokio::test]
    async fn test_guard_passes_success_through() {
        let registry = default_registry();
        let call = ToolInvocation {
            id: "call-1".to_string(),
            name: "get_forecast".to_string(),
            args: json!({"city": "Lisbon"}),
        };

        let message = guard_tool_call(&registry, &call).await;
        assert_eq!(
            message.content.as_deref(),
            Some("The forecast for Lisbon is sunny all week!")
        );
    }
}

use financial_canvas_agent::config::Config;
use financial_canvas_agent::experiment::{
    tools::default_registry, AgentState, ExperimentAgent, GeminiBackend, UserRole,
};
use financial_canvas_agent::gemini::GeminiClient;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let config = Config::from_env()?;
    info!("Tool-orchestration experiment starting");

    let backend = GeminiBackend::new(GeminiClient::new(config.api_key.clone()));
    let agent = Arc::new(ExperimentAgent::new(
        backend,
        default_registry(),
        &config,
    ));

    // Blocking invocation returning final state
    let state = AgentState::new(UserRole::Expert)
        .with_preference("style", "technical")
        .with_preference("verbosity", "detailed")
        .with_user_message("I prefer technical explanations. What is the weather in sf?");

    let final_state = agent.invoke(state).await?;
    if let Some(message) = final_state.last_message() {
        println!("{}", message.content.as_deref().unwrap_or_default());
    }

    println!("\n{}", "=".repeat(80));
    println!("Streaming Example:");
    println!("{}\n", "=".repeat(80));

    // Streamed invocation: one full-state snapshot per internal step
    let state = AgentState::new(UserRole::Beginner)
        .with_preference("style", "simple")
        .with_preference("verbosity", "brief")
        .with_user_message("What is the weather and forecast in Tokyo?");

    let mut snapshots = agent.stream(state);
    while let Some(snapshot) = snapshots.recv().await {
        let Some(latest) = snapshot.last_message() else {
            continue;
        };

        if let Some(content) = latest.content.as_deref().filter(|c| !c.is_empty()) {
            println!("Agent: {}", content);
        } else if !latest.tool_calls.is_empty() {
            let names: Vec<&str> = latest
                .tool_calls
                .iter()
                .map(|call| call.name.as_str())
                .collect();
            println!("Calling tools: {:?}", names);
        }
    }

    Ok(())
}

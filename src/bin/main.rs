use financial_canvas_agent::{config::Config, gemini::GeminiClient, repl::Repl};
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
    info!(model = %config.canvas_model, "Financial Canvas Agent starting");

    let client = GeminiClient::new(config.api_key.clone());
    let mut repl = Repl::new(client, config);

    repl.run().await?;
    Ok(())
}

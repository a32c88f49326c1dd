//! Interactive canvas command loop
//!
//! Line-oriented grammar:
//! - `quit` terminates the loop
//! - `upload:<path>[,<path>...]` registers local files as attachments
//! - `plan:<text>` plans node names
//! - `create:<text>` triggers explicit node extraction
//! - anything else is a conversational turn, streamed to the console
//!
//! Conversational turns run an explicit state machine: the stream yields
//! text, reasoning signatures, and pending tool requests; the loop
//! executes `create_nodes` requests and resumes the dialogue with the
//! result as an explicit turn.

use crate::config::Config;
use crate::error::CanvasError;
use crate::extraction::{self, CREATE_NODES_TOOL};
use crate::gemini::{
    GeminiClient, GenerateRequest, GenerationConfig, StreamFragment, SystemInstruction,
    ToolDeclarations,
};
use crate::session::{CanvasSession, TurnCollector, CANVAS_SYSTEM_PROMPT};
use crate::upload;
use crate::Result;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use colored::Colorize;
use futures::StreamExt;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde_json::json;
use std::io::Write;
use tracing::info;

/// Commands accepted by the loop
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Quit,
    Upload(String),
    Plan(String),
    Create(String),
    Chat(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();

        if trimmed.eq_ignore_ascii_case("quit") {
            return Command::Quit;
        }
        if let Some(paths) = trimmed.strip_prefix("upload:") {
            return Command::Upload(paths.trim().to_string());
        }
        if let Some(text) = trimmed.strip_prefix("plan:") {
            return Command::Plan(text.trim().to_string());
        }
        if let Some(text) = trimmed.strip_prefix("create:") {
            return Command::Create(text.trim().to_string());
        }

        Command::Chat(trimmed.to_string())
    }
}

/// The interactive canvas loop
pub struct Repl {
    client: GeminiClient,
    config: Config,
    session: CanvasSession,
}

impl Repl {
    pub fn new(client: GeminiClient, config: Config) -> Self {
        Self {
            client,
            config,
            session: CanvasSession::new(),
        }
    }

    /// Run until `quit`, end-of-input, or an unrecoverable backend error.
    pub async fn run(&mut self) -> Result<()> {
        let mut rl = DefaultEditor::new()?;

        println!("Chat started. Commands:");
        println!("  - 'upload:/path/to/file[,another]' to upload local files");
        println!("  - 'plan:<text>' to plan node names");
        println!("  - 'create:<text>' to extract nodes onto the canvas");
        println!("  - 'quit' to exit\n");

        loop {
            match rl.readline("You: ") {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(trimmed);

                    match Command::parse(trimmed) {
                        Command::Quit => break,
                        Command::Upload(paths) => self.handle_upload(&paths).await,
                        Command::Plan(text) => self.handle_plan(&text).await?,
                        Command::Create(text) => self.handle_create(&text).await?,
                        Command::Chat(text) => self.handle_turn(&text).await?,
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(e) => return Err(e.into()),
            }
        }

        info!("Canvas session ended");
        Ok(())
    }

    /// Upload failures are non-fatal: log, skip, keep the loop alive.
    async fn handle_upload(&mut self, paths: &str) {
        let report = upload::register_paths(&self.client, &mut self.session, paths).await;

        for path in &report.uploaded {
            println!("Uploaded: {}", path);
        }
        if !report.any_succeeded() {
            println!("No files were uploaded successfully.");
        }
    }

    async fn handle_plan(&mut self, text: &str) -> Result<()> {
        match extraction::plan_node_names(&self.client, &self.config, &self.session, text).await {
            Ok(names) => {
                println!("Planned nodes:");
                for (i, name) in names.iter().enumerate() {
                    println!("  {}. {}", i + 1, name);
                }
                Ok(())
            }
            Err(CanvasError::ExtractionError(message)) => {
                println!("{} {}", "Planning failed:".red(), message);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn handle_create(&mut self, text: &str) -> Result<()> {
        match extraction::extract_nodes(&self.client, &self.config, &mut self.session, text).await
        {
            Ok(report) => {
                for summary in &report.summaries {
                    println!("{}\n", summary);
                }
                println!("Created {} node(s).", report.nodes_created);
                Ok(())
            }
            Err(CanvasError::ExtractionError(message)) => {
                println!("{} {}", "Extraction failed:".red(), message);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn turn_request(&self) -> GenerateRequest {
        GenerateRequest {
            contents: self.session.contents(),
            system_instruction: Some(SystemInstruction::from_text(CANVAS_SYSTEM_PROMPT)),
            generation_config: Some(GenerationConfig {
                temperature: Some(self.config.temperature),
                ..Default::default()
            }),
            tools: Some(vec![ToolDeclarations {
                function_declarations: vec![extraction::create_nodes_declaration()],
            }]),
        }
    }

    /// One conversational exchange, including any tool-triggered
    /// extraction rounds.
    async fn handle_turn(&mut self, text: &str) -> Result<()> {
        self.session.push_user_turn(text);

        loop {
            let request = self.turn_request();
            let mut stream = self
                .client
                .generate_stream(&self.config.canvas_model, &request)
                .await?;

            print!("{} ", "Agent:".cyan());
            std::io::stdout().flush()?;

            let mut collector = TurnCollector::new();
            while let Some(fragment) = stream.next().await {
                let fragment = fragment?;
                match &fragment {
                    StreamFragment::Text(delta) => {
                        print!("{}", delta);
                        std::io::stdout().flush()?;
                    }
                    StreamFragment::ReasoningSignature(bytes) => {
                        print!(
                            " {} {} ",
                            "[THINKING]:".yellow(),
                            BASE64.encode(bytes)
                        );
                        std::io::stdout().flush()?;
                    }
                    StreamFragment::ToolCallRequest(_) => {}
                }
                collector.absorb(&fragment);
            }
            println!();

            let calls = collector.calls().to_vec();
            self.session.push_model_turn(collector.into_model_content());

            if calls.is_empty() {
                return Ok(());
            }

            // Execute each pending request, then resume the dialogue.
            for call in calls {
                let response = self.execute_tool_request(&call.name, &call.args).await?;
                self.session.push_tool_response(&call.name, response);
            }
        }
    }

    async fn execute_tool_request(
        &mut self,
        name: &str,
        args: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        if name != CREATE_NODES_TOOL {
            return Ok(json!({
                "status": "error",
                "error": format!("unknown tool: {}", name),
            }));
        }

        let instruction = args
            .get("instruction")
            .and_then(|v| v.as_str())
            .unwrap_or("Extract the transaction nodes discussed so far.");

        info!(instruction = %instruction, "Model requested node extraction");

        match extraction::extract_nodes(&self.client, &self.config, &mut self.session, instruction)
            .await
        {
            Ok(report) => {
                for summary in &report.summaries {
                    println!("{}\n", summary);
                }
                println!("Created {} node(s).", report.nodes_created);
                Ok(report.status_record())
            }
            Err(CanvasError::ExtractionError(message)) => {
                println!("{} {}", "Extraction failed:".red(), message);
                Ok(json!({"status": "error", "error": message}))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quit_is_case_insensitive() {
        assert_eq!(Command::parse("quit"), Command::Quit);
        assert_eq!(Command::parse("QUIT"), Command::Quit);
        assert_eq!(Command::parse("  Quit  "), Command::Quit);
    }

    #[test]
    fn test_upload_command() {
        assert_eq!(
            Command::parse("upload:/tmp/a.pdf,/tmp/b.png"),
            Command::Upload("/tmp/a.pdf,/tmp/b.png".to_string())
        );
    }

    #[test]
    fn test_plan_and_create_commands() {
        assert_eq!(
            Command::parse("plan: a coffee shop"),
            Command::Plan("a coffee shop".to_string())
        );
        assert_eq!(
            Command::parse("create:expansion to two stores"),
            Command::Create("expansion to two stores".to_string())
        );
    }

    #[test]
    fn test_everything_else_is_chat() {
        assert_eq!(
            Command::parse("how do accruals work?"),
            Command::Chat("how do accruals work?".to_string())
        );
        // Prefix must match exactly; a bare word is conversation.
        assert_eq!(
            Command::parse("upload the file please"),
            Command::Chat("upload the file please".to_string())
        );
    }
}

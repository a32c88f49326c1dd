//! Node extraction and planning
//!
//! Both operations issue one blocking schema-constrained generation call
//! over the accumulated session context. The backend guarantees
//! syntactically valid JSON in the declared shape; decode or validation
//! failures are still treated as hard, recoverable extraction errors and
//! nothing is committed.

use crate::config::Config;
use crate::error::CanvasError;
use crate::gemini::{
    FunctionDeclaration, GeminiClient, GenerateRequest, GenerationConfig, SystemInstruction,
};
use crate::models::Node;
use crate::schema::ResponseSchema;
use crate::session::{CanvasSession, CANVAS_SYSTEM_PROMPT};
use crate::Result;
use serde_json::json;
use tracing::{info, warn};

/// Name of the extraction tool the model may invoke mid-conversation
pub const CREATE_NODES_TOOL: &str = "create_nodes";

/// Result of one extraction call
#[derive(Debug, Clone)]
pub struct ExtractionReport {
    pub nodes_created: usize,
    pub summaries: Vec<String>,
}

impl ExtractionReport {
    /// Status record returned into the conversation when the extraction
    /// was model-invoked.
    pub fn status_record(&self) -> serde_json::Value {
        json!({
            "nodes_created": self.nodes_created,
            "status": "success",
        })
    }
}

/// Declaration of the `create_nodes` tool advertised on conversational
/// turns.
pub fn create_nodes_declaration() -> FunctionDeclaration {
    FunctionDeclaration {
        name: CREATE_NODES_TOOL.to_string(),
        description: "Extract financial transaction nodes from the conversation so far and \
                      add them to the canvas. Call this whenever modeling is warranted."
            .to_string(),
        parameters_json_schema: json!({
            "type": "object",
            "properties": {
                "instruction": {
                    "type": "string",
                    "description": "What to model, e.g. the business events to extract"
                }
            },
            "required": ["instruction"]
        }),
    }
}

fn structured_request(
    session: &CanvasSession,
    config: &Config,
    request_text: &str,
    schema: serde_json::Value,
) -> GenerateRequest {
    GenerateRequest {
        contents: session.contents_with_transient(request_text),
        system_instruction: Some(SystemInstruction::from_text(CANVAS_SYSTEM_PROMPT)),
        generation_config: Some(GenerationConfig {
            temperature: Some(config.temperature),
            response_mime_type: Some("application/json".to_string()),
            response_json_schema: Some(schema),
            ..Default::default()
        }),
        tools: None,
    }
}

/// Decode and validate an extraction payload. Nothing is kept unless
/// every node passes.
pub fn decode_nodes(raw: &str) -> Result<Vec<Node>> {
    let nodes: Vec<Node> = serde_json::from_str(raw).map_err(|e| {
        CanvasError::ExtractionError(format!("extraction response did not decode: {}", e))
    })?;

    for node in &nodes {
        node.validate()?;
    }

    Ok(nodes)
}

/// Extract nodes from the accumulated context and append them to the
/// session record list. Returns a report with the created count and one
/// rendered summary block per node, in the order returned.
pub async fn extract_nodes(
    client: &GeminiClient,
    config: &Config,
    session: &mut CanvasSession,
    request_text: &str,
) -> Result<ExtractionReport> {
    let request = structured_request(
        session,
        config,
        request_text,
        <Vec<Node>>::response_schema(),
    );

    let raw = client
        .generate_structured(&config.canvas_model, &request)
        .await?;

    let nodes = match decode_nodes(&raw) {
        Ok(nodes) => nodes,
        Err(e) => {
            warn!("Extraction aborted, nothing committed: {}", e);
            return Err(e);
        }
    };

    let summaries: Vec<String> = nodes.iter().map(|n| n.to_string()).collect();
    let nodes_created = session.append_nodes(nodes);

    info!(nodes_created, "Extraction complete");

    Ok(ExtractionReport {
        nodes_created,
        summaries,
    })
}

/// Plan the node names to create, without touching the record list.
pub async fn plan_node_names(
    client: &GeminiClient,
    config: &Config,
    session: &CanvasSession,
    request_text: &str,
) -> Result<Vec<String>> {
    let prompt = format!(
        "Plan the nodes to create based on the following input. \
         Return only the node names.\n\n{}",
        request_text
    );

    let request = structured_request(session, config, &prompt, <Vec<String>>::response_schema());

    let raw = client
        .generate_structured(&config.canvas_model, &request)
        .await?;

    let names: Vec<String> = serde_json::from_str(&raw).map_err(|e| {
        CanvasError::ExtractionError(format!("planning response did not decode: {}", e))
    })?;

    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_valid_payload() {
        let raw = r#"[
            {"node_name": "Seed round", "absolute_start_utc": "2026-01-15T00:00:00Z", "expected_value": 500000.0},
            {"node_name": "Office lease", "absolute_start_utc": "2026-02-01T00:00:00Z", "recurrence_rule": "monthly"}
        ]"#;

        let nodes = decode_nodes(raw).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].node_name, "Seed round");
        assert_eq!(nodes[1].expected_value, 0.0);
    }

    #[test]
    fn test_decode_preserves_order() {
        let raw = r#"[
            {"node_name": "z", "absolute_start_utc": "2026-01-01T00:00:00Z"},
            {"node_name": "a", "absolute_start_utc": "2026-01-02T00:00:00Z"},
            {"node_name": "m", "absolute_start_utc": "2026-01-03T00:00:00Z"}
        ]"#;

        let names: Vec<String> = decode_nodes(raw)
            .unwrap()
            .into_iter()
            .map(|n| n.node_name)
            .collect();
        assert_eq!(names, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_decode_rejects_missing_required_field() {
        let raw = r#"[{"node_name": "No start"}]"#;
        let err = decode_nodes(raw).unwrap_err();
        assert!(matches!(err, CanvasError::ExtractionError(_)));
    }

    #[test]
    fn test_decode_rejects_type_mismatch() {
        let raw = r#"[{"node_name": 42, "absolute_start_utc": "2026-01-01T00:00:00Z"}]"#;
        assert!(decode_nodes(raw).is_err());
    }

    #[test]
    fn test_decode_rejects_invalid_timestamp() {
        let raw = r#"[{"node_name": "Bad", "absolute_start_utc": "soon"}]"#;
        let err = decode_nodes(raw).unwrap_err().to_string();
        assert!(err.contains("absolute_start_utc"));
    }

    #[test]
    fn test_one_bad_node_commits_nothing() {
        let raw = r#"[
            {"node_name": "Good", "absolute_start_utc": "2026-01-01T00:00:00Z"},
            {"node_name": "", "absolute_start_utc": "2026-01-02T00:00:00Z"}
        ]"#;
        assert!(decode_nodes(raw).is_err());
    }

    #[test]
    fn test_status_record_shape() {
        let report = ExtractionReport {
            nodes_created: 4,
            summaries: vec![],
        };

        let record = report.status_record();
        assert_eq!(record["nodes_created"], 4);
        assert_eq!(record["status"], "success");
    }

    #[test]
    fn test_create_nodes_declaration() {
        let decl = create_nodes_declaration();
        assert_eq!(decl.name, CREATE_NODES_TOOL);
        assert_eq!(
            decl.parameters_json_schema["properties"]["instruction"]["type"],
            "string"
        );
    }
}

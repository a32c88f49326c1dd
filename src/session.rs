//! Canvas session state
//!
//! One `CanvasSession` is created at process start and owned by the
//! caller. It holds the dialogue transcript replayed to the backend on
//! every call, the append-only attachment list, and the node record list.
//! There is no persistence: the session dies with the process.

use crate::gemini::{Content, FunctionCall, Part, StreamFragment};
use crate::models::{AttachedFile, Node};
use tracing::debug;

/// System prompt for the canvas dialogue
pub const CANVAS_SYSTEM_PROMPT: &str = "\
You are a financial modeling assistant for a financial modeling, management, and analysis tool.

You currently only have access to the canvas interface. The canvas is where users create nodes, \
which are grouped (or single) financial transactions. Nodes connect to form paths; the user \
selects a start and an end node and the engine computes the aggregate effect of the path on the \
financial statements.

Proactively create nodes to model business scenarios. Do not just explain - actually model it. \
Model all details of the user's input, even when that means creating a large number of nodes. \
When the user asks for a model, create the nodes first, then the edges. When the user uploads a \
long business strategy plan, create the nodes, then the edges, then the variables used in those \
nodes. The model should match the complexity of the input.

Whenever modeling is warranted, automatically call create_nodes with an instruction describing \
the transactions to extract.";

/// Session state for one canvas dialogue
#[derive(Debug, Default)]
pub struct CanvasSession {
    history: Vec<Content>,
    attachments: Vec<AttachedFile>,
    unsent_attachments: Vec<AttachedFile>,
    records: Vec<Node>,
}

impl CanvasSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a successfully uploaded file. It is embedded in the next
    /// user turn and, through the replayed transcript, stays in context
    /// for every later conversational or extraction call.
    pub fn register_attachment(&mut self, file: AttachedFile) {
        self.unsent_attachments.push(file.clone());
        self.attachments.push(file);
    }

    pub fn attachments(&self) -> &[AttachedFile] {
        &self.attachments
    }

    /// Append a user turn: any newly attached files first, then the text.
    pub fn push_user_turn(&mut self, text: &str) {
        let mut parts: Vec<Part> = self
            .unsent_attachments
            .drain(..)
            .map(|file| Part::file_data(file.uri, file.media_type))
            .collect();
        parts.push(Part::text(text));

        self.history.push(Content::user(parts));
    }

    /// Append the model turn assembled from streamed fragments.
    pub fn push_model_turn(&mut self, content: Content) {
        self.history.push(content);
    }

    /// Append the result of an executed tool call as an explicit turn, so
    /// the dialogue can resume.
    pub fn push_tool_response(&mut self, name: &str, response: serde_json::Value) {
        self.history
            .push(Content::user(vec![Part::function_response(name, response)]));
    }

    /// The transcript replayed to the backend.
    pub fn contents(&self) -> Vec<Content> {
        self.history.clone()
    }

    /// Transcript plus one transient user turn that is not committed to
    /// history. Extraction calls use this: the request rides on the
    /// accumulated context without polluting the conversation.
    pub fn contents_with_transient(&self, text: &str) -> Vec<Content> {
        let mut contents = self.history.clone();
        let mut parts: Vec<Part> = self
            .unsent_attachments
            .iter()
            .map(|file| Part::file_data(file.uri.clone(), file.media_type.clone()))
            .collect();
        parts.push(Part::text(text));
        contents.push(Content::user(parts));
        contents
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Append extracted nodes, in the order returned. Purely additive:
    /// no de-duplication, no conflict detection.
    pub fn append_nodes(&mut self, nodes: Vec<Node>) -> usize {
        let count = nodes.len();
        self.records.extend(nodes);
        debug!(appended = count, total = self.records.len(), "Nodes recorded");
        count
    }

    pub fn records(&self) -> &[Node] {
        &self.records
    }
}

/// Accumulates streamed fragments into the model turn appended to the
/// session transcript.
#[derive(Debug, Default)]
pub struct TurnCollector {
    text: String,
    signatures: Vec<Vec<u8>>,
    calls: Vec<FunctionCall>,
}

impl TurnCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn absorb(&mut self, fragment: &StreamFragment) {
        match fragment {
            StreamFragment::Text(delta) => self.text.push_str(delta),
            StreamFragment::ReasoningSignature(bytes) => self.signatures.push(bytes.clone()),
            StreamFragment::ToolCallRequest(call) => self.calls.push(call.clone()),
        }
    }

    pub fn calls(&self) -> &[FunctionCall] {
        &self.calls
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Reassemble the model turn. Signatures are re-encoded onto the
    /// parts they arrived with: one per function call in order, any
    /// remainder on the text part, so the replayed transcript matches
    /// what the backend produced.
    pub fn into_model_content(self) -> Content {
        use base64::engine::general_purpose::STANDARD as BASE64;
        use base64::Engine as _;

        let mut signatures = self.signatures.into_iter();
        let mut parts = Vec::new();

        if !self.text.is_empty() {
            parts.push(Part::text(self.text));
        }

        for call in self.calls {
            let mut part = Part::function_call(call);
            if let Some(signature) = signatures.next() {
                part.thought_signature = Some(BASE64.encode(signature));
            }
            parts.push(part);
        }

        if let Some(signature) = signatures.next() {
            if let Some(first) = parts.first_mut() {
                first.thought_signature = Some(BASE64.encode(signature));
            }
        }

        if parts.is_empty() {
            parts.push(Part::text(String::new()));
        }

        Content::model(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal_node(name: &str) -> Node {
        Node {
            node_name: name.to_string(),
            constraints: None,
            transaction: None,
            transaction_description: None,
            absolute_start_utc: "2026-01-01T00:00:00Z".to_string(),
            absolute_end_utc: None,
            start_offset_rule: None,
            end_offset_rule: None,
            recurrence_rule: None,
            expected_value: 0.0,
        }
    }

    fn attachment(path: &str) -> AttachedFile {
        AttachedFile {
            uri: format!("files/{}", path),
            media_type: crate::gemini::infer_media_type(path),
            local_path: path.to_string(),
        }
    }

    #[test]
    fn test_attachments_ride_on_next_user_turn_only() {
        let mut session = CanvasSession::new();
        session.register_attachment(attachment("plan.pdf"));
        session.register_attachment(attachment("chart.png"));

        session.push_user_turn("summarize these");
        let contents = session.contents();
        assert_eq!(contents.len(), 1);
        // Two file parts, then the text part.
        assert_eq!(contents[0].parts.len(), 3);
        assert!(contents[0].parts[0].file_data.is_some());
        assert!(contents[0].parts[1].file_data.is_some());
        assert_eq!(contents[0].parts[2].text.as_deref(), Some("summarize these"));

        // The next turn no longer re-embeds them; they stay in context
        // through the replayed transcript.
        session.push_user_turn("and now?");
        let contents = session.contents();
        assert_eq!(contents[1].parts.len(), 1);
    }

    #[test]
    fn test_record_list_is_purely_additive() {
        let mut session = CanvasSession::new();

        let first = session.append_nodes(vec![minimal_node("a"), minimal_node("b")]);
        assert_eq!(first, 2);

        // A duplicate name is appended, never deduplicated.
        let second = session.append_nodes(vec![minimal_node("a")]);
        assert_eq!(second, 1);

        assert_eq!(session.records().len(), 3);
        assert_eq!(session.records()[0].node_name, "a");
        assert_eq!(session.records()[2].node_name, "a");
    }

    #[test]
    fn test_transient_contents_do_not_commit() {
        let mut session = CanvasSession::new();
        session.push_user_turn("hello");

        let contents = session.contents_with_transient("extract nodes");
        assert_eq!(contents.len(), 2);
        assert_eq!(session.history_len(), 1);
    }

    #[test]
    fn test_completed_exchange_grows_history_by_two() {
        let mut session = CanvasSession::new();
        session.push_user_turn("model a bakery");

        let mut collector = TurnCollector::new();
        collector.absorb(&StreamFragment::Text("On it.".to_string()));
        session.push_model_turn(collector.into_model_content());

        assert_eq!(session.history_len(), 2);
        assert_eq!(session.contents()[1].role, "model");
    }

    #[test]
    fn test_collector_pairs_signatures_with_calls() {
        let mut collector = TurnCollector::new();
        collector.absorb(&StreamFragment::Text("creating".to_string()));
        collector.absorb(&StreamFragment::ReasoningSignature(b"sig-1".to_vec()));
        collector.absorb(&StreamFragment::ToolCallRequest(FunctionCall {
            name: "create_nodes".to_string(),
            args: json!({"instruction": "model it"}),
        }));

        let content = collector.into_model_content();
        assert_eq!(content.role, "model");
        assert_eq!(content.parts.len(), 2);

        let call_part = &content.parts[1];
        assert!(call_part.function_call.is_some());
        assert_eq!(call_part.thought_signature.as_deref(), Some("c2lnLTE="));
    }

    #[test]
    fn test_tool_response_is_an_explicit_user_turn() {
        let mut session = CanvasSession::new();
        session.push_tool_response("create_nodes", json!({"nodes_created": 3, "status": "success"}));

        let contents = session.contents();
        assert_eq!(contents[0].role, "user");
        let response = contents[0].parts[0].function_response.as_ref().unwrap();
        assert_eq!(response.name, "create_nodes");
        assert_eq!(response.response["nodes_created"], 3);
    }
}

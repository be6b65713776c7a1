//! stream-json event model
//!
//! With `--output-format stream-json` the tool emits one JSON object per
//! line: `system` → (`assistant` | `user`)* → `result`. Only assistant
//! content and the terminal result matter here:
//! - text blocks render as themselves
//! - tool-use blocks render as a compact intent (`Grep(p in path)`, ...)
//! - result events render as `result:<payload>`
//!
//! Lines that are not JSON, or JSON of an unknown shape, render as nothing.

use serde::Deserialize;
use serde_json::Value;

/// Top-level stream event
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Session initialization
    System {
        #[serde(default)]
        subtype: Option<String>,
    },
    /// Model turn
    Assistant {
        #[serde(default)]
        message: Option<AssistantMessage>,
    },
    /// Tool results fed back to the model
    User {
        #[serde(default)]
        message: Option<Value>,
    },
    /// Terminal event
    Result {
        #[serde(default)]
        subtype: Option<String>,
        #[serde(default)]
        result: Option<String>,
        #[serde(default)]
        is_error: bool,
    },
    #[serde(other)]
    Unknown,
}

/// Assistant message body
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct AssistantMessage {
    #[serde(default, deserialize_with = "blocks_or_empty")]
    pub content: Vec<ContentBlock>,
}

/// One block of assistant content
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Free text
    Text { text: String },
    /// Tool invocation intent
    ToolUse {
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Other,
}

// Content is occasionally a bare string; treat that as no blocks.
fn blocks_or_empty<'de, D>(deserializer: D) -> Result<Vec<ContentBlock>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(_) => serde_json::from_value(value).unwrap_or_default(),
        _ => Vec::new(),
    })
}

impl StreamEvent {
    /// Parse one line; `None` for blank, non-JSON or malformed lines
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        serde_json::from_str(line).ok()
    }

    /// Compact rendering, one string per displayed line
    #[must_use]
    pub fn render(&self) -> Vec<String> {
        match self {
            Self::Assistant {
                message: Some(message),
            } => message.content.iter().filter_map(ContentBlock::render).collect(),
            Self::Result { result, .. } => {
                vec![format!("result:{}", result.as_deref().unwrap_or("null"))]
            }
            _ => Vec::new(),
        }
    }
}

impl ContentBlock {
    /// Compact rendering; `None` for blocks that are not displayed
    #[must_use]
    pub fn render(&self) -> Option<String> {
        match self {
            Self::Text { text } => Some(text.clone()),
            Self::ToolUse { name, input } => Some(render_tool_use(name, input)),
            Self::Other => None,
        }
    }
}

fn render_tool_use(name: &str, input: &Value) -> String {
    match name {
        "Grep" => format!(
            "Grep({} in {})",
            field(input, "pattern"),
            path_field(input)
        ),
        "Read" => format!("Read({})", path_field(input)),
        "web_search" | "WebSearch" => format!("Search({})", field(input, "query")),
        "Bash" => format!("Bash({})", field(input, "command")),
        "TodoWrite" => {
            let steps: Vec<String> = input
                .get("todos")
                .and_then(Value::as_array)
                .map(|todos| todos.iter().map(|t| field(t, "content")).collect())
                .unwrap_or_default();
            format!("TodoWrite: {}", steps.join(" -> "))
        }
        other => format!("{other}({input})"),
    }
}

fn path_field(input: &Value) -> String {
    match input.get("path").filter(|v| !v.is_null()) {
        Some(_) => field(input, "path"),
        None => field(input, "file_path"),
    }
}

// String values interpolate bare, everything else as JSON.
fn field(input: &Value, key: &str) -> String {
    match input.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "null".to_string(),
    }
}

/// Accumulated view of one event stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamTranscript {
    lines: Vec<String>,
    result: Option<String>,
}

impl StreamTranscript {
    /// Empty transcript
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a complete stdout capture
    #[must_use]
    pub fn from_output(stdout: &str) -> Self {
        let mut transcript = Self::new();
        for line in stdout.lines() {
            transcript.push_line(line);
        }
        transcript
    }

    /// Feed one raw line, returning what it rendered to
    pub fn push_line(&mut self, line: &str) -> Vec<String> {
        let Some(event) = StreamEvent::parse(line) else {
            return Vec::new();
        };
        if let StreamEvent::Result { result, .. } = &event {
            self.result = Some(result.clone().unwrap_or_default());
        }
        let rendered = event.render();
        self.lines.extend(rendered.iter().cloned());
        rendered
    }

    /// Rendered lines so far
    #[inline]
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Payload of the last result event, trimmed; empty when none arrived
    #[must_use]
    pub fn candidate(&self) -> String {
        self.result
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string()
    }

    /// Split into rendered lines and candidate
    #[must_use]
    pub fn into_parts(self) -> (Vec<String>, String) {
        let candidate = self.candidate();
        (self.lines, candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn assistant(blocks: Value) -> String {
        json!({"type": "assistant", "message": {"content": blocks}}).to_string()
    }

    fn rendered(line: &str) -> Vec<String> {
        StreamEvent::parse(line).map(|e| e.render()).unwrap_or_default()
    }

    #[test]
    fn renders_known_tool_intents() {
        let line = assistant(json!([
            {"type": "tool_use", "name": "Grep", "input": {"pattern": "OrderService", "path": "src"}},
            {"type": "tool_use", "name": "Read", "input": {"file_path": "src/Order.java"}},
            {"type": "tool_use", "name": "web_search", "input": {"query": "NPE spring"}},
            {"type": "tool_use", "name": "Bash", "input": {"command": "git log -1"}},
            {"type": "tool_use", "name": "TodoWrite", "input": {"todos": [
                {"content": "find caller"}, {"content": "blame line"}
            ]}},
        ]));

        assert_eq!(
            rendered(&line),
            vec![
                "Grep(OrderService in src)",
                "Read(src/Order.java)",
                "Search(NPE spring)",
                "Bash(git log -1)",
                "TodoWrite: find caller -> blame line",
            ]
        );
    }

    #[test]
    fn renders_other_tools_with_json_input() {
        let line = assistant(json!([
            {"type": "tool_use", "name": "Glob", "input": {"pattern": "**/*.java"}}
        ]));
        assert_eq!(rendered(&line), vec![r#"Glob({"pattern":"**/*.java"})"#]);
    }

    #[test]
    fn grep_prefers_path_then_file_path() {
        let line = assistant(json!([
            {"type": "tool_use", "name": "Grep", "input": {"pattern": "x", "file_path": "a.rs"}}
        ]));
        assert_eq!(rendered(&line), vec!["Grep(x in a.rs)"]);
    }

    #[test]
    fn text_blocks_render_verbatim_and_thinking_is_dropped() {
        let line = assistant(json!([
            {"type": "thinking", "thinking": "hmm"},
            {"type": "text", "text": "Looking at the stack trace"},
        ]));
        assert_eq!(rendered(&line), vec!["Looking at the stack trace"]);
    }

    #[test]
    fn non_json_and_unknown_events_render_nothing() {
        assert!(rendered("not json at all").is_empty());
        assert!(rendered(r#"{"type":"system","subtype":"init"}"#).is_empty());
        assert!(rendered(r#"{"type":"user","message":{}}"#).is_empty());
        assert!(rendered(r#"{"type":"rate_limit"}"#).is_empty());
        assert!(rendered(&assistant(json!("plain string content"))).is_empty());
    }

    #[test]
    fn candidate_is_last_result_payload() {
        let stdout = [
            r#"{"type":"system","subtype":"init"}"#.to_string(),
            assistant(json!([{"type": "text", "text": "result: not this"}])),
            r#"{"type":"result","subtype":"success","result":"first"}"#.to_string(),
            r#"{"type":"result","subtype":"success","result":"  {\"suggestion\": 1}\n"}"#
                .to_string(),
        ]
        .join("\n");

        let transcript = StreamTranscript::from_output(&stdout);
        assert_eq!(transcript.candidate(), r#"{"suggestion": 1}"#);
        assert_eq!(transcript.lines().len(), 3);
        assert_eq!(transcript.lines()[1], "result:first");
    }

    #[test]
    fn missing_result_gives_empty_candidate() {
        let transcript = StreamTranscript::from_output(&assistant(json!([
            {"type": "text", "text": "partial"}
        ])));
        assert_eq!(transcript.candidate(), "");
    }
}

// SPDX-License-Identifier: MIT

//! `StreamParser`: turn newline-delimited JSON lines from an agent child
//! into typed events (§4.C).
//!
//! Modeled on the teacher's Claude-transcript parsing (tool_use/assistant
//! JSON shape), generalized to the tagged-event contract the spec names.
//! The parser is fault-tolerant by construction: anything that doesn't
//! parse, or doesn't match a known shape, becomes `Unknown` rather than a
//! fatal error.

use serde_json::Value;

/// A single tool invocation's event log line, reduced to what the
/// dispatcher needs for status display and transcript logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    ToolUse { name: String, summary: Option<String> },
    TextDelta { text: String },
    MessageStop,
    Error { message: Option<String> },
    Unknown { raw: String },
}

/// Parses one line of agent output into a [`StreamEvent`].
///
/// Never fails: malformed or unrecognized input becomes `Unknown`.
pub fn parse_line(line: &str) -> StreamEvent {
    let value: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(_) => return StreamEvent::Unknown { raw: line.to_string() },
    };

    if let Some(event) = parse_tool_use(&value) {
        return event;
    }
    if let Some(event) = parse_text_delta(&value) {
        return event;
    }
    if let Some(event) = parse_message_stop(&value) {
        return event;
    }
    if let Some(event) = parse_error(&value) {
        return event;
    }
    StreamEvent::Unknown { raw: line.to_string() }
}

fn parse_tool_use(value: &Value) -> Option<StreamEvent> {
    let content = value.get("message")?.get("content")?.as_array()?;
    for item in content {
        if item.get("type")?.as_str()? == "tool_use" {
            let name = item.get("name")?.as_str()?.to_string();
            let summary = tool_summary(item);
            return Some(StreamEvent::ToolUse { name, summary });
        }
    }
    None
}

fn tool_summary(item: &Value) -> Option<String> {
    let input = item.get("input")?;
    if let Some(path) = input.get("file_path").and_then(Value::as_str) {
        return Some(path.to_string());
    }
    if let Some(command) = input.get("command").and_then(Value::as_str) {
        return Some(command.to_string());
    }
    if let Some(path) = input.get("notebook_path").and_then(Value::as_str) {
        return Some(path.to_string());
    }
    None
}

fn parse_text_delta(value: &Value) -> Option<StreamEvent> {
    let delta = value.get("delta")?;
    if delta.get("type")?.as_str()? == "text_delta" {
        let text = delta.get("text")?.as_str()?.to_string();
        return Some(StreamEvent::TextDelta { text });
    }
    None
}

fn parse_message_stop(value: &Value) -> Option<StreamEvent> {
    if value.get("type")?.as_str()? == "message_stop" {
        return Some(StreamEvent::MessageStop);
    }
    None
}

fn parse_error(value: &Value) -> Option<StreamEvent> {
    if value.get("type")?.as_str()? == "error" {
        let message = value.get("message").and_then(Value::as_str).map(str::to_string);
        return Some(StreamEvent::Error { message });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tool_use_read() {
        let line = r#"{"type":"assistant","message":{"content":[{"type":"tool_use","name":"Read","input":{"file_path":"/src/main.rs"}}]}}"#;
        assert_eq!(
            parse_line(line),
            StreamEvent::ToolUse { name: "Read".to_string(), summary: Some("/src/main.rs".to_string()) }
        );
    }

    #[test]
    fn parses_tool_use_bash_command() {
        let line = r#"{"type":"assistant","message":{"content":[{"type":"tool_use","name":"Bash","input":{"command":"cargo build"}}]}}"#;
        assert_eq!(
            parse_line(line),
            StreamEvent::ToolUse { name: "Bash".to_string(), summary: Some("cargo build".to_string()) }
        );
    }

    #[test]
    fn parses_message_stop() {
        assert_eq!(parse_line(r#"{"type":"message_stop"}"#), StreamEvent::MessageStop);
    }

    #[test]
    fn parses_error_with_message() {
        assert_eq!(
            parse_line(r#"{"type":"error","message":"boom"}"#),
            StreamEvent::Error { message: Some("boom".to_string()) }
        );
    }

    #[test]
    fn malformed_json_becomes_unknown() {
        assert_eq!(parse_line("not json at all"), StreamEvent::Unknown { raw: "not json at all".to_string() });
    }

    #[test]
    fn unrecognized_shape_becomes_unknown() {
        let line = r#"{"type":"something_else"}"#;
        assert_eq!(parse_line(line), StreamEvent::Unknown { raw: line.to_string() });
    }
}

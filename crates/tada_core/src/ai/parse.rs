//! Parsing of model output into app structures.

use crate::grouping::start_of_local_day_ms;
use crate::service::task_service::NewTask;
use chrono::NaiveDate;
use serde::Deserialize;

/// Removes a surrounding markdown code fence (with or without a language
/// tag) and trims the result.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`, `JSON`, ...) up to the first newline.
    let body = match rest.find('\n') {
        Some(index) => &rest[index + 1..],
        None => rest,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// One task proposed by the model.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSuggestion {
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub priority: Option<u8>,
    /// `YYYY-MM-DD`
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl TaskSuggestion {
    /// Converts into a creation request. Unparseable dates and out-of-range
    /// priorities are dropped rather than rejected.
    pub fn into_new_task(self, list_name: Option<String>) -> NewTask {
        let due_date = self
            .due_date
            .as_deref()
            .and_then(|value| NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok())
            .map(start_of_local_day_ms);
        NewTask {
            title: self.title,
            content: self.content,
            due_date,
            priority: self.priority.filter(|value| (1..=3).contains(value)),
            tags: self.tags,
            list_name,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SuggestionPayload {
    List(Vec<TaskSuggestion>),
    Wrapped { tasks: Vec<TaskSuggestion> },
}

/// Extracts suggested tasks from model output. Accepts a bare JSON array,
/// an object with a `tasks` array, fenced code, or JSON embedded in prose.
pub fn parse_task_suggestions(text: &str) -> Result<Vec<TaskSuggestion>, String> {
    let body = strip_code_fences(text);
    let payload = serde_json::from_str::<SuggestionPayload>(body).or_else(|first_err| {
        let start = body.find('[');
        let end = body.rfind(']');
        match (start, end) {
            (Some(start), Some(end)) if start < end => {
                serde_json::from_str::<SuggestionPayload>(&body[start..=end])
                    .map_err(|err| err.to_string())
            }
            _ => Err(first_err.to_string()),
        }
    })?;

    let tasks = match payload {
        SuggestionPayload::List(tasks) => tasks,
        SuggestionPayload::Wrapped { tasks } => tasks,
    };
    Ok(tasks
        .into_iter()
        .filter(|task| !task.title.trim().is_empty())
        .collect())
}

/// One decoded server-sent event payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Delta(String),
    Done,
}

/// Incremental decoder for `text/event-stream` bodies carrying chat deltas.
///
/// Understands OpenAI-style `choices[0].delta.content` chunks, Anthropic
/// `content_block_delta` events and the `[DONE]` sentinel. Bytes may be split
/// anywhere, including inside a UTF-8 sequence.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every event completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = parse_sse_line(line.trim_end_matches(['\r', '\n'])) {
                events.push(event);
            }
        }
        events
    }

    /// Flushes a trailing line without a newline terminator.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        let line = String::from_utf8_lossy(&rest);
        parse_sse_line(line.trim())
    }
}

/// Parses one SSE line. Comments, event names and empty deltas yield `None`.
pub fn parse_sse_line(line: &str) -> Option<SseEvent> {
    let data = line.strip_prefix("data:")?.trim();
    if data == "[DONE]" {
        return Some(SseEvent::Done);
    }
    let value: serde_json::Value = serde_json::from_str(data).ok()?;

    if let Some(text) = value["choices"][0]["delta"]["content"].as_str() {
        return (!text.is_empty()).then(|| SseEvent::Delta(text.to_string()));
    }
    match value["type"].as_str() {
        Some("content_block_delta") => value["delta"]["text"]
            .as_str()
            .filter(|text| !text.is_empty())
            .map(|text| SseEvent::Delta(text.to_string())),
        Some("message_stop") => Some(SseEvent::Done),
        _ => None,
    }
}

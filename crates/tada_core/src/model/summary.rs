//! Stored AI summary and echo report records.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// AI-generated digest for one period/list combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSummary {
    pub id: String,
    pub created_at: i64,
    pub updated_at: i64,
    /// e.g. `thisWeek` or `custom_<start>_<end>`.
    pub period_key: String,
    /// `all` or a list name.
    pub list_key: String,
    pub task_ids: Vec<String>,
    pub summary_text: String,
}

impl StoredSummary {
    pub fn new(
        period_key: impl Into<String>,
        list_key: impl Into<String>,
        task_ids: Vec<String>,
        summary_text: impl Into<String>,
        now_ms: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now_ms,
            updated_at: now_ms,
            period_key: period_key.into(),
            list_key: list_key.into(),
            task_ids,
            summary_text: summary_text.into(),
        }
    }
}

/// Tone requested for an echo report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EchoStyle {
    Balanced,
    Exploration,
    Reflection,
}

impl EchoStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Balanced => "balanced",
            Self::Exploration => "exploration",
            Self::Reflection => "reflection",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "balanced" => Some(Self::Balanced),
            "exploration" => Some(Self::Exploration),
            "reflection" => Some(Self::Reflection),
            _ => None,
        }
    }
}

/// Natural-language digest of recent work, generated on demand or on schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EchoReport {
    pub id: String,
    pub created_at: i64,
    pub content: String,
    pub job_types: Vec<String>,
    pub style: EchoStyle,
    #[serde(default)]
    pub user_input: Option<String>,
}

impl EchoReport {
    pub fn new(
        content: impl Into<String>,
        job_types: Vec<String>,
        style: EchoStyle,
        user_input: Option<String>,
        now_ms: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now_ms,
            content: content.into(),
            job_types,
            style,
            user_input,
        }
    }
}

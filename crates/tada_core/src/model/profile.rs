//! Onboarding profile used to tailor AI prompts.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    Student,
    Developer,
    Designer,
    Manager,
    Creator,
    Researcher,
    Freelancer,
    Other,
}

impl Persona {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Developer => "developer",
            Self::Designer => "designer",
            Self::Manager => "manager",
            Self::Creator => "creator",
            Self::Researcher => "researcher",
            Self::Freelancer => "freelancer",
            Self::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "student" => Some(Self::Student),
            "developer" => Some(Self::Developer),
            "designer" => Some(Self::Designer),
            "manager" => Some(Self::Manager),
            "creator" => Some(Self::Creator),
            "researcher" => Some(Self::Researcher),
            "freelancer" => Some(Self::Freelancer),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Whether the user thinks of work as steps taken or results delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskView {
    Process,
    Outcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UncertaintyTolerance {
    Low,
    High,
}

/// How unfinished work should be described in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncompletionStyle {
    Narrative,
    Explicit,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub persona: Vec<Persona>,
    #[serde(default)]
    pub task_view: Option<TaskView>,
    #[serde(default)]
    pub uncertainty_tolerance: Option<UncertaintyTolerance>,
    #[serde(default)]
    pub incompletion_style: Option<IncompletionStyle>,
    #[serde(default)]
    pub user_note: Option<String>,
    #[serde(default)]
    pub onboarding_completed: bool,
    /// Per-answer confidence (`taskView`, `uncertaintyTolerance`,
    /// `incompletionStyle`), stored as raw JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrm_confidence: Option<serde_json::Value>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

//! Typed application settings persisted as JSON values in `settings`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppearanceSettings {
    pub theme_id: String,
    /// `light | dark | system`
    pub dark_mode: String,
    /// `compact | default | comfortable`
    pub interface_density: String,
}

impl Default for AppearanceSettings {
    fn default() -> Self {
        Self {
            theme_id: "default-coral".to_string(),
            dark_mode: "system".to_string(),
            interface_density: "default".to_string(),
        }
    }
}

/// Default due date applied to newly created tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultDueDate {
    Today,
    Tomorrow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceSettings {
    pub language: String,
    #[serde(default)]
    pub default_new_task_due_date: Option<DefaultDueDate>,
    #[serde(default)]
    pub default_new_task_priority: Option<u8>,
    pub default_new_task_list: String,
    pub confirm_deletions: bool,
}

impl Default for PreferenceSettings {
    fn default() -> Self {
        Self {
            language: "zh-CN".to_string(),
            default_new_task_due_date: None,
            default_new_task_priority: None,
            default_new_task_list: crate::model::task::INBOX_LIST_NAME.to_string(),
            confirm_deletions: true,
        }
    }
}

/// Chat-completion vendor. Anything but `Anthropic` speaks the
/// OpenAI-compatible protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProviderKind {
    OpenAi,
    Anthropic,
    DeepSeek,
    OpenRouter,
    Ollama,
    #[serde(other)]
    Custom,
}

impl AiProviderKind {
    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Anthropic => "https://api.anthropic.com/v1",
            Self::DeepSeek => "https://api.deepseek.com/v1",
            Self::OpenRouter => "https://openrouter.ai/api/v1",
            Self::Ollama => "http://localhost:11434/v1",
            Self::Custom => "",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::Anthropic => "claude-3-5-haiku-latest",
            Self::DeepSeek => "deepseek-chat",
            Self::OpenRouter => "openai/gpt-4o-mini",
            Self::Ollama => "llama3.1",
            Self::Custom => "",
        }
    }

    pub fn requires_api_key(self) -> bool {
        !matches!(self, Self::Ollama | Self::Custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiSettings {
    pub provider: AiProviderKind,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub available_models: Vec<String>,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            provider: AiProviderKind::OpenAi,
            api_key: String::new(),
            model: String::new(),
            base_url: String::new(),
            available_models: Vec::new(),
        }
    }
}

impl AiSettings {
    /// Configured base URL, or the provider default when blank.
    pub fn effective_base_url(&self) -> &str {
        let trimmed = self.base_url.trim();
        if trimmed.is_empty() {
            self.provider.default_base_url()
        } else {
            trimmed.trim_end_matches('/')
        }
    }

    pub fn effective_model(&self) -> &str {
        let trimmed = self.model.trim();
        if trimmed.is_empty() {
            self.provider.default_model()
        } else {
            trimmed
        }
    }

    pub fn is_configured(&self) -> bool {
        let key_ok = !self.provider.requires_api_key() || !self.api_key.trim().is_empty();
        key_ok && !self.effective_base_url().is_empty() && !self.effective_model().is_empty()
    }
}

/// Automatic echo report schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSettings {
    pub enabled: bool,
    /// `HH:mm`, local time.
    pub time: String,
    /// 0 = Sunday .. 6 = Saturday.
    pub days: Vec<u8>,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            time: "18:00".to_string(),
            days: vec![1, 2, 3, 4, 5],
        }
    }
}

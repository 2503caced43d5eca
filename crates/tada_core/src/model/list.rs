//! Task list model and list-name rules.

use crate::model::task::{INBOX_LIST_NAME, TRASH_LIST_NAME};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Names that collide with built-in lists or smart views and therefore
/// cannot be used for user lists. Compared case-insensitively.
pub const RESERVED_LIST_NAMES: &[&str] = &[
    INBOX_LIST_NAME,
    TRASH_LIST_NAME,
    "Today",
    "Next 7 Days",
    "Completed",
    "All Tasks",
    "Archive",
];

/// Named grouping of tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskList {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub order: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TaskList {
    pub fn new(name: impl Into<String>, now_ms: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            icon: None,
            color: None,
            order: None,
            created_at: now_ms,
            updated_at: now_ms,
        }
    }

    pub fn is_inbox(&self) -> bool {
        same_list_name(&self.name, INBOX_LIST_NAME)
    }
}

/// Comparison key for list names: trimmed and Unicode-lowercased, so
/// `Über` and `über` are the same list.
pub fn list_name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

pub fn same_list_name(left: &str, right: &str) -> bool {
    list_name_key(left) == list_name_key(right)
}

/// Returns whether `name` is reserved for a built-in list or view.
pub fn is_reserved_list_name(name: &str) -> bool {
    RESERVED_LIST_NAMES
        .iter()
        .any(|reserved| same_list_name(reserved, name))
}

#[cfg(test)]
mod tests {
    use super::{is_reserved_list_name, list_name_key, same_list_name};

    #[test]
    fn reserved_names_match_case_insensitively() {
        assert!(is_reserved_list_name("inbox"));
        assert!(is_reserved_list_name("  TRASH "));
        assert!(is_reserved_list_name("next 7 days"));
        assert!(!is_reserved_list_name("Groceries"));
    }

    #[test]
    fn name_comparison_folds_non_ascii_letters() {
        assert!(same_list_name("Über", " über "));
        assert!(same_list_name("ДОМ", "дом"));
        assert!(!same_list_name("工作", "学习"));
        assert_eq!(list_name_key("  ÉTÉ "), "été");
    }
}

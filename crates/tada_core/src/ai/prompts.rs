//! Prompt construction for summaries, echo reports and task suggestions.

use crate::ai::{ChatMessage, ChatRequest};
use crate::grouping::local_date_of;
use crate::model::list::TaskList;
use crate::model::profile::{IncompletionStyle, TaskView, UncertaintyTolerance, UserProfile};
use crate::model::summary::EchoStyle;
use crate::model::task::Task;
use chrono::NaiveDate;
use std::fmt::Write;

/// Upper bound on tasks listed in one prompt.
pub const MAX_PROMPT_TASKS: usize = 200;
/// Task notes are cut to this many characters.
const CONTENT_EXCERPT_CHARS: usize = 300;

fn output_language(language: &str) -> &'static str {
    if language.to_ascii_lowercase().starts_with("zh") {
        "Simplified Chinese"
    } else {
        "English"
    }
}

fn priority_label(priority: Option<u8>) -> Option<&'static str> {
    match priority? {
        1 => Some("high"),
        2 => Some("medium"),
        3 => Some("low"),
        _ => None,
    }
}

/// One markdown bullet describing a task.
pub fn describe_task(task: &Task) -> String {
    let mut line = format!(
        "- [{}] {}",
        if task.completed { "x" } else { " " },
        task.title.trim()
    );
    let mut details = vec![format!("list: {}", task.list_name)];
    if let Some(due) = task.due_date.and_then(local_date_of) {
        details.push(format!("due: {}", due.format("%Y-%m-%d")));
    }
    if let Some(done) = task.completed_at.and_then(local_date_of) {
        details.push(format!("done: {}", done.format("%Y-%m-%d")));
    }
    if let Some(priority) = priority_label(task.priority) {
        details.push(format!("priority: {priority}"));
    }
    if let Some(percentage) = task.complete_percentage.filter(|_| !task.completed) {
        details.push(format!("progress: {percentage}%"));
    }
    if !task.tags.is_empty() {
        details.push(format!("tags: {}", task.tags.join(", ")));
    }
    let _ = write!(line, " ({})", details.join("; "));

    if let Some(content) = task.content.as_deref().map(str::trim) {
        if !content.is_empty() {
            let excerpt: String = content
                .chars()
                .take(CONTENT_EXCERPT_CHARS)
                .collect::<String>()
                .replace('\n', " ");
            let _ = write!(line, "\n  notes: {excerpt}");
        }
    }
    line
}

fn task_block(tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return "(no tasks)".to_string();
    }
    tasks
        .iter()
        .take(MAX_PROMPT_TASKS)
        .map(describe_task)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Short description of the user for prompt personalization.
pub fn describe_profile(profile: &UserProfile) -> Option<String> {
    let mut parts = Vec::new();
    if !profile.persona.is_empty() {
        let personas: Vec<&str> = profile.persona.iter().map(|p| p.as_str()).collect();
        parts.push(format!("Roles: {}.", personas.join(", ")));
    }
    match profile.task_view {
        Some(TaskView::Process) => parts.push("Values the steps taken as much as the results.".to_string()),
        Some(TaskView::Outcome) => parts.push("Cares mostly about concrete outcomes.".to_string()),
        None => {}
    }
    match profile.uncertainty_tolerance {
        Some(UncertaintyTolerance::Low) => parts.push("Prefers clear, definite statements.".to_string()),
        Some(UncertaintyTolerance::High) => parts.push("Comfortable with open questions.".to_string()),
        None => {}
    }
    match profile.incompletion_style {
        Some(IncompletionStyle::Narrative) => {
            parts.push("Describe unfinished work gently, as part of a story.".to_string())
        }
        Some(IncompletionStyle::Explicit) => {
            parts.push("List unfinished work plainly.".to_string())
        }
        None => {}
    }
    if let Some(note) = profile.user_note.as_deref().map(str::trim) {
        if !note.is_empty() {
            parts.push(format!("Note from the user: {note}"));
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

/// Request for a period summary of the given tasks.
pub fn summary_request(
    period_label: &str,
    list_label: &str,
    tasks: &[Task],
    profile: Option<&UserProfile>,
    language: &str,
) -> ChatRequest {
    let mut system = format!(
        "You write concise work summaries from to-do lists. \
         Group accomplishments by theme, then mention what is still open and anything overdue. \
         Use short markdown sections. Do not invent tasks. Answer in {}.",
        output_language(language)
    );
    if let Some(profile) = profile.and_then(describe_profile) {
        let _ = write!(system, "\n\nAbout the user: {profile}");
    }
    let user = format!(
        "Period: {period_label}\nList: {list_label}\n\nTasks:\n{}",
        task_block(tasks)
    );
    ChatRequest::new(vec![ChatMessage::system(system), ChatMessage::user(user)])
        .with_temperature(0.3)
}

/// Request for an echo report reflecting recent activity.
pub fn echo_request(
    profile: &UserProfile,
    completed: &[Task],
    pending: &[Task],
    style: EchoStyle,
    job_types: &[String],
    user_input: Option<&str>,
    language: &str,
) -> ChatRequest {
    let tone = match style {
        EchoStyle::Balanced => "Balance recognition of progress with a look at what comes next.",
        EchoStyle::Exploration => "Point out patterns and suggest one or two things worth exploring.",
        EchoStyle::Reflection => "Be reflective; help the user notice how the work felt and what it meant.",
    };
    let mut system = format!(
        "You write a short personal echo report (under 250 words) about the user's recent work. \
         {tone} Speak directly to the user. Answer in {}.",
        output_language(language)
    );
    if let Some(about) = describe_profile(profile) {
        let _ = write!(system, "\n\nAbout the user: {about}");
    }

    let mut user = String::new();
    if !job_types.is_empty() {
        let _ = writeln!(user, "Kinds of work: {}", job_types.join(", "));
    }
    if let Some(input) = user_input.map(str::trim).filter(|input| !input.is_empty()) {
        let _ = writeln!(user, "What the user wants to add: {input}");
    }
    let _ = write!(
        user,
        "\nCompleted recently:\n{}\n\nStill open:\n{}",
        task_block(completed),
        task_block(pending)
    );
    ChatRequest::new(vec![ChatMessage::system(system), ChatMessage::user(user)])
        .with_temperature(0.7)
}

/// Request asking the model to break free text into tasks (JSON array).
pub fn task_suggestion_request(input: &str, lists: &[TaskList], today: NaiveDate) -> ChatRequest {
    let list_names: Vec<&str> = lists.iter().map(|list| list.name.as_str()).collect();
    let system = format!(
        "You turn notes into actionable to-do items. Return ONLY a JSON array, no explanation.\n\
         Each item: {{\"title\": string, \"content\": string|null, \"priority\": 1|2|3|null, \
         \"dueDate\": \"YYYY-MM-DD\"|null, \"tags\": string[]}}.\n\
         Priority 1 is high. Titles are short imperative phrases.\n\
         Today's date: {}\nExisting lists: {}",
        today.format("%Y-%m-%d"),
        if list_names.is_empty() {
            "(none)".to_string()
        } else {
            list_names.join(", ")
        }
    );
    ChatRequest::new(vec![ChatMessage::system(system), ChatMessage::user(input.trim())])
        .with_temperature(0.2)
}

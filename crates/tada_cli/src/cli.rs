//! Command line definition.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Tada - lists, tags and AI summaries for your tasks
#[derive(Parser, Debug)]
#[command(name = "tada")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// SQLite database file (default: <data dir>/tada/tada.db)
    #[arg(long, global = true, env = "TADA_DB")]
    pub db: Option<PathBuf>,

    /// Directory for rolling log files (default: <data dir>/tada/logs)
    #[arg(long, global = true, env = "TADA_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// trace | debug | info | warn | error
    #[arg(long, global = true, env = "TADA_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a task
    Add(AddArgs),
    /// List tasks
    Ls(LsArgs),
    /// Show one task with its subtasks
    Show { id: String },
    /// Edit task fields
    Edit(EditArgs),
    /// Mark a task completed
    Done { id: String },
    /// Mark a task not completed
    Undo { id: String },
    /// Set completion percentage (100 completes the task)
    Progress { id: String, percent: u8 },
    /// Move a task to Trash
    Trash { id: String },
    /// Move a task from Trash back to the Inbox
    Restore { id: String },
    /// Delete a task permanently
    Purge { id: String },
    /// Delete every task in Trash
    EmptyTrash,
    /// Subtask operations
    #[command(subcommand)]
    Subtask(SubtaskCommand),
    /// List management
    #[command(subcommand)]
    List(ListCommand),
    /// Tag management
    #[command(subcommand)]
    Tag(TagCommand),
    /// Full-text search over titles and notes
    Search(SearchArgs),
    /// Write the whole dataset to a JSON file
    Export { file: PathBuf },
    /// Load a JSON export
    Import {
        file: PathBuf,
        #[arg(long, value_enum, default_value_t = ImportModeArg::Merge)]
        mode: ImportModeArg,
    },
    /// Render due tasks as an iCalendar file
    Ics(IcsArgs),
    /// AI summaries
    #[command(subcommand)]
    Summary(SummaryCommand),
    /// AI echo reports
    #[command(subcommand)]
    Echo(EchoCommand),
    /// Ask the AI to turn free text into tasks
    Suggest(SuggestArgs),
    /// Scheduled echo reports
    #[command(subcommand)]
    Schedule(ScheduleCommand),
    /// Onboarding profile
    #[command(subcommand)]
    Profile(ProfileCommand),
    /// Application settings
    #[command(subcommand)]
    Settings(SettingsCommand),
}

#[derive(Args, Debug)]
pub struct AddArgs {
    pub title: String,
    /// Target list (default from preferences)
    #[arg(long, short)]
    pub list: Option<String>,
    /// YYYY-MM-DD, `today` or `tomorrow`
    #[arg(long, short)]
    pub due: Option<String>,
    /// 1 (high) to 3 (low)
    #[arg(long, short, value_parser = clap::value_parser!(u8).range(1..=3))]
    pub priority: Option<u8>,
    #[arg(long = "tag", short)]
    pub tags: Vec<String>,
    /// Markdown notes
    #[arg(long)]
    pub note: Option<String>,
}

#[derive(Args, Debug)]
pub struct LsArgs {
    #[arg(long, short)]
    pub list: Option<String>,
    #[arg(long, short)]
    pub tag: Option<String>,
    /// Include completed tasks
    #[arg(long, short)]
    pub all: bool,
    /// Show the Trash instead
    #[arg(long)]
    pub trash: bool,
    /// Flat list instead of date buckets
    #[arg(long)]
    pub flat: bool,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long, conflicts_with = "clear_note")]
    pub note: Option<String>,
    #[arg(long)]
    pub clear_note: bool,
    #[arg(long, conflicts_with = "clear_due")]
    pub due: Option<String>,
    #[arg(long)]
    pub clear_due: bool,
    #[arg(long, conflicts_with = "clear_priority", value_parser = clap::value_parser!(u8).range(1..=3))]
    pub priority: Option<u8>,
    #[arg(long)]
    pub clear_priority: bool,
    /// Replace all tags (comma separated; empty clears)
    #[arg(long, value_delimiter = ',', num_args = 0..)]
    pub tags: Option<Vec<String>>,
    #[arg(long)]
    pub list: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum SubtaskCommand {
    Add { task: String, title: String },
    Toggle { task: String, subtask: String },
    Rm { task: String, subtask: String },
}

#[derive(Subcommand, Debug)]
pub enum ListCommand {
    Ls,
    Add {
        name: String,
        #[arg(long)]
        icon: Option<String>,
        #[arg(long)]
        color: Option<String>,
    },
    /// Rename by id or current name
    Rename { list: String, new_name: String },
    /// Change icon and color
    Style {
        list: String,
        #[arg(long)]
        icon: Option<String>,
        #[arg(long)]
        color: Option<String>,
    },
    /// Delete by id or name; its tasks move to Trash
    Rm { list: String },
}

#[derive(Subcommand, Debug)]
pub enum TagCommand {
    Ls,
    Rename { old: String, new: String },
    Rm { tag: String },
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    pub text: String,
    /// Skip completed tasks
    #[arg(long)]
    pub open_only: bool,
    #[arg(long, default_value_t = 20)]
    pub limit: u32,
    /// Pass the text through as a raw FTS5 expression
    #[arg(long)]
    pub raw: bool,
}

#[derive(Args, Debug)]
pub struct IcsArgs {
    /// Output file (stdout when omitted)
    #[arg(long, short)]
    pub out: Option<PathBuf>,
    /// Alarm offset from the start of the due day
    #[arg(long, default_value_t = 540, allow_negative_numbers = true)]
    pub reminder_minutes: i64,
    #[arg(long, default_value = "Tada")]
    pub name: String,
}

#[derive(Args, Debug, Clone)]
pub struct PeriodArgs {
    /// today | yesterday | thisWeek | lastWeek | thisMonth | lastMonth
    #[arg(long, default_value = "thisWeek")]
    pub period: String,
    /// Custom range start (YYYY-MM-DD); requires --to
    #[arg(long, requires = "to")]
    pub from: Option<String>,
    #[arg(long, requires = "from")]
    pub to: Option<String>,
    /// `all` or a list name
    #[arg(long, default_value = "all")]
    pub list: String,
}

#[derive(Subcommand, Debug)]
pub enum SummaryCommand {
    /// Show the tasks a summary would cover
    Preview(PeriodArgs),
    Generate {
        #[command(flatten)]
        period: PeriodArgs,
        /// Print the text as it arrives
        #[arg(long)]
        stream: bool,
    },
    /// Stored summaries for a period and list, newest first
    Ls(PeriodArgs),
    /// Replace the text of a stored summary
    Edit { id: String, text: String },
    Rm { id: String },
}

#[derive(Subcommand, Debug)]
pub enum EchoCommand {
    Generate {
        #[arg(long, value_enum, default_value_t = EchoStyleArg::Balanced)]
        style: EchoStyleArg,
        #[arg(long = "job-type")]
        job_types: Vec<String>,
        /// Extra context for this report
        #[arg(long)]
        note: Option<String>,
        /// Print the text as it arrives
        #[arg(long)]
        stream: bool,
    },
    Ls {
        #[arg(long)]
        limit: Option<u32>,
    },
    Show { id: String },
    Rm { id: String },
}

#[derive(Args, Debug)]
pub struct SuggestArgs {
    pub text: String,
    /// Create the suggested tasks in this list
    #[arg(long)]
    pub list: Option<String>,
    /// Create tasks instead of only printing them
    #[arg(long)]
    pub apply: bool,
}

#[derive(Subcommand, Debug)]
pub enum ScheduleCommand {
    Show,
    Set {
        #[arg(long, conflicts_with = "disable")]
        enable: bool,
        #[arg(long)]
        disable: bool,
        /// HH:mm, local time
        #[arg(long)]
        time: Option<String>,
        /// Weekdays, 0 = Sunday (comma separated)
        #[arg(long, value_delimiter = ',')]
        days: Option<Vec<u8>>,
    },
    /// Run in the foreground and generate reports when the schedule fires
    Run,
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    Show,
    Set {
        /// Comma separated personas
        #[arg(long, value_delimiter = ',')]
        persona: Option<Vec<String>>,
        #[arg(long, value_enum)]
        task_view: Option<TaskViewArg>,
        #[arg(long, value_enum)]
        uncertainty: Option<ToleranceArg>,
        #[arg(long, value_enum)]
        incompletion: Option<IncompletionArg>,
        #[arg(long)]
        note: Option<String>,
        /// Mark onboarding as completed
        #[arg(long)]
        complete: bool,
    },
    /// Clear answers so onboarding starts over
    Reset,
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
    Show,
    Ai {
        #[arg(long)]
        provider: Option<String>,
        #[arg(long, env = "TADA_AI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        base_url: Option<String>,
    },
    Prefs {
        #[arg(long)]
        language: Option<String>,
        /// none | today | tomorrow
        #[arg(long)]
        default_due: Option<String>,
        /// 0 clears
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=3))]
        default_priority: Option<u8>,
        #[arg(long)]
        default_list: Option<String>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum ImportModeArg {
    Replace,
    Merge,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum EchoStyleArg {
    Balanced,
    Exploration,
    Reflection,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum TaskViewArg {
    Process,
    Outcome,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum ToleranceArg {
    Low,
    High,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum IncompletionArg {
    Narrative,
    Explicit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_edit_with_cleared_tags() {
        let cli = Cli::parse_from(["tada", "edit", "t1", "--tags", "--clear-due"]);
        let Command::Edit(args) = cli.command else {
            panic!("expected edit");
        };
        assert_eq!(args.tags, Some(vec![]));
        assert!(args.clear_due);
    }

    #[test]
    fn parses_streamed_summary_generate() {
        let cli = Cli::parse_from([
            "tada", "summary", "generate", "--period", "today", "--list", "Work", "--stream",
        ]);
        let Command::Summary(SummaryCommand::Generate { period, stream }) = cli.command else {
            panic!("expected summary generate");
        };
        assert!(stream);
        assert_eq!(period.period, "today");
        assert_eq!(period.list, "Work");
    }
}

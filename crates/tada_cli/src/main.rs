mod cli;
mod commands;
mod context;
mod output;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use context::App;
use log::{error, info};

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        error!("event=cli_command module=cli status=error error={err:#}");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let app = App::open(&cli)?;
    info!(
        "event=cli_start module=cli status=ok core_version={}",
        tada_core::core_version()
    );

    match cli.command {
        Command::Add(args) => commands::tasks::add(&app, args),
        Command::Ls(args) => commands::tasks::list(&app, args),
        Command::Show { id } => commands::tasks::show(&app, &id),
        Command::Edit(args) => commands::tasks::edit(&app, args),
        Command::Done { id } => commands::tasks::complete(&app, &id, true),
        Command::Undo { id } => commands::tasks::complete(&app, &id, false),
        Command::Progress { id, percent } => commands::tasks::progress(&app, &id, percent),
        Command::Trash { id } => commands::tasks::trash(&app, &id),
        Command::Restore { id } => commands::tasks::restore(&app, &id),
        Command::Purge { id } => commands::tasks::purge(&app, &id),
        Command::EmptyTrash => commands::tasks::empty_trash(&app),
        Command::Subtask(command) => commands::tasks::subtask(&app, command),
        Command::List(command) => commands::lists::run(&app, command),
        Command::Tag(command) => commands::lists::tags(&app, command),
        Command::Search(args) => commands::data::search(&app, args),
        Command::Export { file } => commands::data::export(&app, &file),
        Command::Import { file, mode } => commands::data::import(&app, &file, mode),
        Command::Ics(args) => commands::data::ics(&app, args),
        Command::Summary(command) => commands::reports::summary(&app, command),
        Command::Echo(command) => commands::reports::echo(&app, command),
        Command::Suggest(args) => commands::reports::suggest(&app, args),
        Command::Schedule(command) => commands::reports::schedule(&app, command),
        Command::Profile(command) => commands::settings::profile(&app, command),
        Command::Settings(command) => commands::settings::settings(&app, command),
    }
}

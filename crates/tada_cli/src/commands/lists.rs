use crate::cli::{ListCommand, TagCommand};
use crate::context::App;
use crate::output::{print_json, print_lists};
use anyhow::{anyhow, Result};
use tada_core::TaskList;

pub fn run(app: &App, command: ListCommand) -> Result<()> {
    let service = app.lists();
    match command {
        ListCommand::Ls => {
            let lists = service.list_lists()?;
            if app.json {
                return print_json(&lists);
            }
            print_lists(&lists);
        }
        ListCommand::Add { name, icon, color } => {
            let list = service.create_list(&name, icon, color)?;
            if app.json {
                return print_json(&list);
            }
            println!("created list {} ({})", list.name, list.id);
        }
        ListCommand::Rename { list, new_name } => {
            let target = find_list(app, &list)?;
            let outcome = service.rename_list(&target.id, &new_name)?;
            println!(
                "renamed {} -> {} ({} task(s) updated)",
                target.name, outcome.list.name, outcome.tasks_updated
            );
        }
        ListCommand::Style { list, icon, color } => {
            let target = find_list(app, &list)?;
            let updated = service.update_appearance(
                &target.id,
                icon.or(target.icon.clone()),
                color.or(target.color.clone()),
            )?;
            if app.json {
                return print_json(&updated);
            }
            print_lists(std::slice::from_ref(&updated));
        }
        ListCommand::Rm { list } => {
            let target = find_list(app, &list)?;
            let moved = service.delete_list(&target.id)?;
            println!("deleted list {} ({moved} task(s) moved to Trash)", target.name);
        }
    }
    Ok(())
}

pub fn tags(app: &App, command: TagCommand) -> Result<()> {
    let service = app.tasks();
    match command {
        TagCommand::Ls => {
            let tags = service.list_tags()?;
            if app.json {
                return print_json(&tags);
            }
            for tag in tags {
                println!("#{tag}");
            }
        }
        TagCommand::Rename { old, new } => {
            let changed = service.rename_tag(&old, &new)?;
            println!("renamed #{old} -> #{new} on {changed} task(s)");
        }
        TagCommand::Rm { tag } => {
            let changed = service.delete_tag(&tag)?;
            println!("removed #{tag} from {changed} task(s)");
        }
    }
    Ok(())
}

/// Looks a list up by id first, then by case-insensitive name.
fn find_list(app: &App, key: &str) -> Result<TaskList> {
    let lists = app.lists().list_lists()?;
    lists
        .iter()
        .find(|list| list.id == key)
        .or_else(|| {
            lists
                .iter()
                .find(|list| list.name.eq_ignore_ascii_case(key.trim()))
        })
        .cloned()
        .ok_or_else(|| anyhow!("no list named `{key}`"))
}

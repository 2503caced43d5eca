use crate::cli::{IncompletionArg, ProfileCommand, SettingsCommand, TaskViewArg, ToleranceArg};
use crate::context::App;
use crate::output::print_json;
use anyhow::{bail, Result};
use serde_json::json;
use tada_core::model::profile::{
    IncompletionStyle, Persona, TaskView, UncertaintyTolerance, UserProfile,
};
use tada_core::model::settings::{AiProviderKind, DefaultDueDate};

pub fn profile(app: &App, command: ProfileCommand) -> Result<()> {
    let service = app.profile();
    let profile = match command {
        ProfileCommand::Show => service.get()?,
        ProfileCommand::Set {
            persona,
            task_view,
            uncertainty,
            incompletion,
            note,
            complete,
        } => {
            let mut profile = service.get()?;
            if let Some(values) = persona {
                profile.persona = parse_personas(&values)?;
            }
            if let Some(view) = task_view {
                profile.task_view = Some(match view {
                    TaskViewArg::Process => TaskView::Process,
                    TaskViewArg::Outcome => TaskView::Outcome,
                });
            }
            if let Some(tolerance) = uncertainty {
                profile.uncertainty_tolerance = Some(match tolerance {
                    ToleranceArg::Low => UncertaintyTolerance::Low,
                    ToleranceArg::High => UncertaintyTolerance::High,
                });
            }
            if let Some(style) = incompletion {
                profile.incompletion_style = Some(match style {
                    IncompletionArg::Narrative => IncompletionStyle::Narrative,
                    IncompletionArg::Explicit => IncompletionStyle::Explicit,
                });
            }
            if note.is_some() {
                profile.user_note = note;
            }
            if complete {
                service.complete_onboarding(&profile)?
            } else {
                service.save(&profile)?
            }
        }
        ProfileCommand::Reset => service.reset_onboarding()?,
    };
    if app.json {
        return print_json(&profile);
    }
    print_profile(&profile);
    Ok(())
}

pub fn settings(app: &App, command: SettingsCommand) -> Result<()> {
    let service = app.settings();
    match command {
        SettingsCommand::Show => {}
        SettingsCommand::Ai {
            provider,
            api_key,
            model,
            base_url,
        } => {
            let mut ai = service.ai()?;
            if let Some(provider) = provider {
                ai.provider = parse_provider(&provider);
            }
            if let Some(key) = api_key {
                ai.api_key = key;
            }
            if let Some(model) = model {
                ai.model = model;
            }
            if let Some(url) = base_url {
                ai.base_url = url;
            }
            service.update_ai(&ai)?;
        }
        SettingsCommand::Prefs {
            language,
            default_due,
            default_priority,
            default_list,
        } => {
            let mut prefs = service.preferences()?;
            if let Some(language) = language {
                prefs.language = language;
            }
            if let Some(due) = default_due {
                prefs.default_new_task_due_date = match due.trim().to_ascii_lowercase().as_str() {
                    "none" => None,
                    "today" => Some(DefaultDueDate::Today),
                    "tomorrow" => Some(DefaultDueDate::Tomorrow),
                    other => bail!("default due must be none|today|tomorrow, got `{other}`"),
                };
            }
            if let Some(priority) = default_priority {
                prefs.default_new_task_priority = (priority > 0).then_some(priority);
            }
            if let Some(list) = default_list {
                if app.lists().find_by_name(&list)?.is_none() {
                    bail!("no list named `{list}`");
                }
                prefs.default_new_task_list = list;
            }
            service.update_preferences(&prefs)?;
        }
    }

    let mut ai = service.ai()?;
    ai.api_key = mask_key(&ai.api_key);
    let all = json!({
        "appearance": service.appearance()?,
        "preferences": service.preferences()?,
        "ai": ai,
        "schedule": service.schedule()?,
    });
    print_json(&all)
}

fn parse_personas(values: &[String]) -> Result<Vec<Persona>> {
    let mut personas = Vec::with_capacity(values.len());
    for value in values.iter().filter(|value| !value.trim().is_empty()) {
        let Some(persona) = Persona::parse(value) else {
            bail!("unknown persona `{value}`");
        };
        if !personas.contains(&persona) {
            personas.push(persona);
        }
    }
    Ok(personas)
}

fn parse_provider(value: &str) -> AiProviderKind {
    serde_json::from_value(json!(value.trim().to_ascii_lowercase()))
        .unwrap_or(AiProviderKind::Custom)
}

fn mask_key(key: &str) -> String {
    let visible: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    if key.chars().count() <= 4 {
        "*".repeat(key.chars().count())
    } else {
        format!("****{visible}")
    }
}

fn print_profile(profile: &UserProfile) {
    let personas: Vec<&str> = profile.persona.iter().map(|p| p.as_str()).collect();
    println!("onboarding completed: {}", profile.onboarding_completed);
    println!("persona: {}", personas.join(", "));
    if let Some(view) = profile.task_view {
        println!("task view: {view:?}");
    }
    if let Some(tolerance) = profile.uncertainty_tolerance {
        println!("uncertainty tolerance: {tolerance:?}");
    }
    if let Some(style) = profile.incompletion_style {
        println!("incompletion style: {style:?}");
    }
    if let Some(note) = profile.user_note.as_deref() {
        println!("note: {note}");
    }
}

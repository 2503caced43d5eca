use rusqlite::Connection;
use tada_core::model::settings::PreferenceSettings;
use tada_core::model::list::TaskList;
use tada_core::model::task::{Task, INBOX_LIST_ID};
use tada_core::repo::list_repo::SqliteListRepository;
use tada_core::repo::task_repo::SqliteTaskRepository;
use tada_core::service::data_service::{
    DataService, ExportBundle, ImportMode, TransferError,
};
use tada_core::{open_db_in_memory, ListService, NewTask, TaskService};

fn tasks(conn: &Connection) -> TaskService<SqliteTaskRepository<'_>, SqliteListRepository<'_>> {
    TaskService::new(SqliteTaskRepository::new(conn), SqliteListRepository::new(conn))
}

/// Source database with one extra list and two tasks.
fn seeded_source() -> Connection {
    let conn = open_db_in_memory().unwrap();
    ListService::new(SqliteListRepository::new(&conn))
        .create_list("Work", None, None)
        .unwrap();
    let service = tasks(&conn);
    let prefs = PreferenceSettings::default();
    service
        .create_task(
            NewTask {
                list_name: Some("Work".to_string()),
                tags: vec!["q3".to_string()],
                ..NewTask::titled("Quarterly report")
            },
            &prefs,
        )
        .unwrap();
    service.create_task(NewTask::titled("Water plants"), &prefs).unwrap();
    conn
}

#[test]
fn export_then_replace_import_restores_dataset() {
    let source = seeded_source();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("backup").join("tada.json");

    let exported = DataService::load(&source)
        .unwrap()
        .export_to_file(&path)
        .unwrap();
    assert_eq!(exported.tasks.len(), 2);
    assert!(path.exists());

    let target = open_db_in_memory().unwrap();
    tasks(&target)
        .create_task(NewTask::titled("Local only"), &PreferenceSettings::default())
        .unwrap();
    let mut data = DataService::load(&target).unwrap();

    let report = data.import_from_file(&path, ImportMode::Replace).unwrap();

    assert_eq!(report.tasks, 2);
    assert_eq!(report.lists, 2);
    assert!(report.settings >= 1);
    assert!(data.fetch_tasks().iter().all(|task| task.title != "Local only"));
    let work_task = data
        .fetch_tasks()
        .iter()
        .find(|task| task.title == "Quarterly report")
        .unwrap();
    let work_list = data
        .fetch_lists()
        .iter()
        .find(|list| list.name == "Work")
        .unwrap();
    assert_eq!(work_task.list_id.as_deref(), Some(work_list.id.as_str()));
    assert_eq!(work_task.tags, vec!["q3".to_string()]);
}

#[test]
fn merge_import_keeps_newer_record_per_id() {
    let source = seeded_source();
    let bundle = DataService::load(&source).unwrap().export_bundle().unwrap();
    let target = open_db_in_memory().unwrap();
    let mut data = DataService::load(&target).unwrap();
    data.import_bundle(bundle.clone(), ImportMode::Replace).unwrap();

    let original = bundle.tasks[0].clone();
    let mut stale = bundle.clone();
    stale.tasks = vec![{
        let mut task = original.clone();
        task.title = "Stale title".to_string();
        task.updated_at -= 60_000;
        task
    }];
    let mut extra = original.clone();
    extra.id = "imported-extra".to_string();
    extra.title = "Brand new".to_string();
    stale.tasks.push(extra);

    let report = data.import_bundle(stale, ImportMode::Merge).unwrap();
    assert_eq!(report.tasks, 3);
    let kept = data
        .fetch_tasks()
        .iter()
        .find(|task| task.id == original.id)
        .unwrap();
    assert_eq!(kept.title, original.title);

    let mut newer = bundle;
    newer.tasks = vec![{
        let mut task = original.clone();
        task.title = "Newer title".to_string();
        task.updated_at += 60_000;
        task
    }];
    data.import_bundle(newer, ImportMode::Merge).unwrap();
    let replaced = data
        .fetch_tasks()
        .iter()
        .find(|task| task.id == original.id)
        .unwrap();
    assert_eq!(replaced.title, "Newer title");
    assert_eq!(data.fetch_tasks().len(), 3);
}

#[test]
fn import_reresolves_dangling_list_ids_and_restores_inbox() {
    let source = seeded_source();
    let mut bundle = DataService::load(&source).unwrap().export_bundle().unwrap();
    let work_id = bundle
        .lists
        .iter()
        .find(|list| list.name == "Work")
        .unwrap()
        .id
        .clone();
    bundle.lists.retain(|list| list.id != INBOX_LIST_ID);
    for task in &mut bundle.tasks {
        if task.list_name == "Work" {
            task.list_id = Some("deleted-elsewhere".to_string());
        }
    }

    let target = open_db_in_memory().unwrap();
    let mut data = DataService::load(&target).unwrap();
    data.import_bundle(bundle, ImportMode::Replace).unwrap();

    assert!(data.fetch_lists().iter().any(|list| list.id == INBOX_LIST_ID));
    let work_task = data
        .fetch_tasks()
        .iter()
        .find(|task| task.list_name == "Work")
        .unwrap();
    assert_eq!(work_task.list_id.as_deref(), Some(work_id.as_str()));
}

#[test]
fn newer_bundle_version_is_rejected_without_touching_data() {
    let err = ExportBundle::from_json(r#"{"version": 2, "tasks": []}"#).unwrap_err();
    assert!(matches!(err, TransferError::UnsupportedVersion(2)));

    let target = open_db_in_memory().unwrap();
    tasks(&target)
        .create_task(NewTask::titled("Survivor"), &PreferenceSettings::default())
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.json");
    std::fs::write(&path, r#"{"version": 7}"#).unwrap();

    let mut data = DataService::load(&target).unwrap();
    let err = data.import_from_file(&path, ImportMode::Replace).unwrap_err();

    assert!(matches!(err, TransferError::UnsupportedVersion(7)));
    assert_eq!(data.fetch_tasks().len(), 1);
}

#[test]
fn malformed_bundle_is_a_json_error() {
    assert!(matches!(
        ExportBundle::from_json("{ not json"),
        Err(TransferError::Json(_))
    ));
}

#[test]
fn import_mode_parses_case_insensitively() {
    assert_eq!(ImportMode::parse(" Merge "), Some(ImportMode::Merge));
    assert_eq!(ImportMode::parse("replace"), Some(ImportMode::Replace));
    assert_eq!(ImportMode::parse("append"), None);
}

#[test]
fn failed_replace_import_rolls_back_every_table() {
    let target = seeded_source();
    let mut data = DataService::load(&target).unwrap();
    let mut bundle = data.export_bundle().unwrap();
    bundle.lists = vec![TaskList::new("Home", 1)];
    let twin = Task::new("Same id twice", 1);
    bundle.tasks = vec![twin.clone(), twin];

    assert!(data.import_bundle(bundle, ImportMode::Replace).is_err());

    let reloaded = DataService::load(&target).unwrap();
    let names: Vec<&str> = reloaded
        .fetch_lists()
        .iter()
        .map(|list| list.name.as_str())
        .collect();
    assert_eq!(names, vec!["Inbox", "Work"]);
    let work_id = &reloaded
        .fetch_lists()
        .iter()
        .find(|list| list.name == "Work")
        .unwrap()
        .id;
    let report = reloaded
        .fetch_tasks()
        .iter()
        .find(|task| task.title == "Quarterly report")
        .unwrap();
    assert_eq!(report.list_id.as_ref(), Some(work_id));
    assert_eq!(reloaded.fetch_tasks().len(), 2);
}

#[test]
fn imported_inbox_with_foreign_id_moves_onto_fixed_id() {
    let target = open_db_in_memory().unwrap();
    let mut data = DataService::load(&target).unwrap();
    let mut bundle = data.export_bundle().unwrap();
    let mut inbox = TaskList::new("inbox", 1);
    inbox.id = "inbox-from-web".to_string();
    let mut carried = Task::new("Carried over", 1);
    carried.list_id = Some("inbox-from-web".to_string());
    carried.list_name = "inbox".to_string();
    bundle.lists = vec![inbox];
    bundle.tasks = vec![carried];

    data.import_bundle(bundle, ImportMode::Replace).unwrap();

    assert_eq!(data.fetch_lists().len(), 1);
    assert_eq!(data.fetch_lists()[0].id, INBOX_LIST_ID);
    assert_eq!(data.fetch_lists()[0].name, "Inbox");
    assert_eq!(data.fetch_tasks()[0].list_id.as_deref(), Some(INBOX_LIST_ID));

    let created = tasks(&target)
        .create_task(NewTask::titled("After import"), &PreferenceSettings::default())
        .unwrap();
    assert_eq!(created.list_id.as_deref(), Some(INBOX_LIST_ID));
}

#[test]
fn import_repairs_inconsistent_completion_fields() {
    let target = open_db_in_memory().unwrap();
    let mut data = DataService::load(&target).unwrap();
    let mut bundle = data.export_bundle().unwrap();
    let mut done = Task::new("Marked done elsewhere", 1_000);
    done.completed = true;
    done.complete_percentage = Some(40);
    let mut reopened = Task::new("Reopened elsewhere", 1_000);
    reopened.completed_at = Some(500);
    reopened.complete_percentage = Some(100);
    bundle.tasks = vec![done.clone(), reopened.clone()];

    data.import_bundle(bundle, ImportMode::Replace).unwrap();

    let stored = |id: &str| {
        data.fetch_tasks()
            .iter()
            .find(|task| task.id == id)
            .cloned()
            .unwrap()
    };
    let done = stored(&done.id);
    assert_eq!(done.complete_percentage, Some(100));
    assert_eq!(done.completed_at, Some(1_000));
    let reopened = stored(&reopened.id);
    assert_eq!(reopened.completed_at, None);
    assert_eq!(reopened.complete_percentage, None);
}

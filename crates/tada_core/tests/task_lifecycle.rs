use chrono::{Days, NaiveDate};
use rusqlite::Connection;
use tada_core::grouping::{local_today, start_of_local_day_ms};
use tada_core::model::settings::{DefaultDueDate, PreferenceSettings};
use tada_core::model::task::{INBOX_LIST_ID, INBOX_LIST_NAME, TRASH_LIST_NAME};
use tada_core::repo::list_repo::SqliteListRepository;
use tada_core::repo::task_repo::{SqliteTaskRepository, TaskListQuery};
use tada_core::{
    open_db_in_memory, ListService, NewTask, TaskGroupCategory, TaskPatch, TaskService,
    TaskServiceError,
};

type Service<'a> = TaskService<SqliteTaskRepository<'a>, SqliteListRepository<'a>>;

fn service(conn: &Connection) -> Service<'_> {
    TaskService::new(SqliteTaskRepository::new(conn), SqliteListRepository::new(conn))
}

fn day_offset(days: i64) -> NaiveDate {
    let today = local_today();
    if days >= 0 {
        today.checked_add_days(Days::new(days as u64)).unwrap()
    } else {
        today.checked_sub_days(Days::new(days.unsigned_abs())).unwrap()
    }
}

#[test]
fn create_task_defaults_to_inbox_and_normalizes_tags() {
    let conn = open_db_in_memory().unwrap();
    let tasks = service(&conn);

    let task = tasks
        .create_task(
            NewTask {
                tags: vec!["#Work".to_string(), "work".to_string(), " Home ".to_string()],
                ..NewTask::titled("  Write weekly plan  ")
            },
            &PreferenceSettings::default(),
        )
        .unwrap();

    assert_eq!(task.title, "Write weekly plan");
    assert_eq!(task.list_name, INBOX_LIST_NAME);
    assert_eq!(task.list_id.as_deref(), Some(INBOX_LIST_ID));
    assert_eq!(task.tags, vec!["home".to_string(), "work".to_string()]);
    assert_eq!(task.group_category, TaskGroupCategory::NoDate);

    let loaded = tasks.get_task(&task.id).unwrap();
    assert_eq!(loaded, task);
}

#[test]
fn create_task_applies_preference_defaults() {
    let conn = open_db_in_memory().unwrap();
    let tasks = service(&conn);
    let prefs = PreferenceSettings {
        default_new_task_due_date: Some(DefaultDueDate::Tomorrow),
        default_new_task_priority: Some(2),
        ..PreferenceSettings::default()
    };

    let task = tasks.create_task(NewTask::titled("Call mom"), &prefs).unwrap();

    assert_eq!(task.due_date, Some(start_of_local_day_ms(day_offset(1))));
    assert_eq!(task.priority, Some(2));
    assert_eq!(task.group_category, TaskGroupCategory::Next7Days);
}

#[test]
fn create_task_rejects_blank_title_trash_and_unknown_list() {
    let conn = open_db_in_memory().unwrap();
    let tasks = service(&conn);
    let prefs = PreferenceSettings::default();

    assert!(matches!(
        tasks.create_task(NewTask::titled("   "), &prefs),
        Err(TaskServiceError::InvalidTitle)
    ));
    assert!(matches!(
        tasks.create_task(
            NewTask {
                list_name: Some("trash".to_string()),
                ..NewTask::titled("x")
            },
            &prefs
        ),
        Err(TaskServiceError::TrashNotAllowed)
    ));
    assert!(matches!(
        tasks.create_task(
            NewTask {
                list_name: Some("Nowhere".to_string()),
                ..NewTask::titled("x")
            },
            &prefs
        ),
        Err(TaskServiceError::ListNotFound(_))
    ));
}

#[test]
fn complete_and_reopen_track_timestamps_and_percentage() {
    let conn = open_db_in_memory().unwrap();
    let tasks = service(&conn);
    let task = tasks
        .create_task(NewTask::titled("Ship release"), &PreferenceSettings::default())
        .unwrap();

    let partial = tasks.set_percentage(&task.id, Some(40)).unwrap();
    assert_eq!(partial.complete_percentage, Some(40));
    assert!(!partial.completed);

    let done = tasks.complete_task(&task.id).unwrap();
    assert!(done.completed);
    assert!(done.completed_at.is_some());
    assert_eq!(done.group_category, TaskGroupCategory::NoDate);

    let reopened = tasks.toggle_complete(&task.id).unwrap();
    assert!(!reopened.completed);
    assert_eq!(reopened.completed_at, None);

    let finished = tasks.set_percentage(&task.id, Some(100)).unwrap();
    assert!(finished.completed);
}

#[test]
fn update_task_patches_and_clears_fields() {
    let conn = open_db_in_memory().unwrap();
    let lists = ListService::new(SqliteListRepository::new(&conn));
    lists.create_list("Work", None, None).unwrap();
    let tasks = service(&conn);
    let task = tasks
        .create_task(
            NewTask {
                content: Some("notes".to_string()),
                due_date: Some(start_of_local_day_ms(day_offset(-2))),
                priority: Some(1),
                ..NewTask::titled("Draft")
            },
            &PreferenceSettings::default(),
        )
        .unwrap();
    assert_eq!(task.group_category, TaskGroupCategory::Overdue);

    let updated = tasks
        .update_task(
            &task.id,
            TaskPatch {
                title: Some("Final draft".to_string()),
                content: Some(None),
                due_date: Some(Some(start_of_local_day_ms(local_today()))),
                priority: Some(None),
                tags: Some(vec!["Writing".to_string()]),
                list_name: Some("work".to_string()),
            },
        )
        .unwrap();

    assert_eq!(updated.title, "Final draft");
    assert_eq!(updated.content, None);
    assert_eq!(updated.priority, None);
    assert_eq!(updated.tags, vec!["writing".to_string()]);
    assert_eq!(updated.list_name, "Work");
    assert_eq!(updated.group_category, TaskGroupCategory::Today);
    assert!(updated.updated_at >= task.updated_at);
}

#[test]
fn trash_restore_and_empty_trash() {
    let conn = open_db_in_memory().unwrap();
    let tasks = service(&conn);
    let prefs = PreferenceSettings::default();
    let keep = tasks.create_task(NewTask::titled("Keep me"), &prefs).unwrap();
    let drop_one = tasks.create_task(NewTask::titled("Drop me"), &prefs).unwrap();

    let trashed = tasks.move_to_trash(&keep.id).unwrap();
    assert_eq!(trashed.list_name, TRASH_LIST_NAME);
    assert_eq!(trashed.list_id, None);
    tasks.move_to_trash(&drop_one.id).unwrap();

    let visible = tasks.list_tasks(&TaskListQuery::default()).unwrap();
    assert!(visible.is_empty());

    let restored = tasks.restore_from_trash(&keep.id).unwrap();
    assert_eq!(restored.list_name, INBOX_LIST_NAME);

    assert_eq!(tasks.empty_trash().unwrap(), 1);
    assert!(matches!(
        tasks.get_task(&drop_one.id),
        Err(TaskServiceError::TaskNotFound(_))
    ));
    assert_eq!(tasks.list_tasks(&TaskListQuery::default()).unwrap().len(), 1);
}

#[test]
fn delete_permanently_removes_task() {
    let conn = open_db_in_memory().unwrap();
    let tasks = service(&conn);
    let task = tasks
        .create_task(NewTask::titled("Temporary"), &PreferenceSettings::default())
        .unwrap();

    tasks.delete_permanently(&task.id).unwrap();

    assert!(matches!(
        tasks.get_task(&task.id),
        Err(TaskServiceError::TaskNotFound(_))
    ));
}

#[test]
fn subtasks_can_be_added_toggled_and_removed() {
    let conn = open_db_in_memory().unwrap();
    let tasks = service(&conn);
    let task = tasks
        .create_task(NewTask::titled("Pack for trip"), &PreferenceSettings::default())
        .unwrap();

    tasks.add_subtask(&task.id, "Passport").unwrap();
    let with_two = tasks.add_subtask(&task.id, "Charger").unwrap();
    assert_eq!(with_two.subtasks.len(), 2);
    assert!(with_two.subtasks[0].order < with_two.subtasks[1].order);

    let passport_id = with_two.subtasks[0].id.clone();
    let toggled = tasks.toggle_subtask(&task.id, &passport_id).unwrap();
    assert!(toggled.subtasks[0].completed);
    assert!(toggled.subtasks[0].completed_at.is_some());

    let removed = tasks.remove_subtask(&task.id, &passport_id).unwrap();
    assert_eq!(removed.subtasks.len(), 1);
    assert_eq!(tasks.get_task(&task.id).unwrap().subtasks.len(), 1);

    assert!(matches!(
        tasks.remove_subtask(&task.id, "missing"),
        Err(TaskServiceError::SubtaskNotFound(_))
    ));
}

#[test]
fn tags_can_be_listed_renamed_and_deleted() {
    let conn = open_db_in_memory().unwrap();
    let tasks = service(&conn);
    let prefs = PreferenceSettings::default();
    for (title, tags) in [("a", vec!["work", "urgent"]), ("b", vec!["work"]), ("c", vec!["home"])] {
        tasks
            .create_task(
                NewTask {
                    tags: tags.into_iter().map(str::to_string).collect(),
                    ..NewTask::titled(title)
                },
                &prefs,
            )
            .unwrap();
    }

    assert_eq!(tasks.list_tags().unwrap(), vec!["home", "urgent", "work"]);

    assert_eq!(tasks.rename_tag("#Work", "job").unwrap(), 2);
    let query = TaskListQuery {
        tag: Some("job".to_string()),
        ..TaskListQuery::default()
    };
    assert_eq!(tasks.list_tasks(&query).unwrap().len(), 2);

    assert_eq!(tasks.delete_tag("urgent").unwrap(), 1);
    assert_eq!(tasks.list_tags().unwrap(), vec!["home", "job"]);

    assert!(matches!(
        tasks.rename_tag("  ", "x"),
        Err(TaskServiceError::InvalidTag(_))
    ));
}

#[test]
fn grouped_tasks_orders_buckets_and_skips_empty_ones() {
    let conn = open_db_in_memory().unwrap();
    let tasks = service(&conn);
    let prefs = PreferenceSettings::default();
    for (title, offset) in [("later", Some(30)), ("overdue", Some(-1)), ("today", Some(0)), ("none", None)] {
        tasks
            .create_task(
                NewTask {
                    due_date: offset.map(|days| start_of_local_day_ms(day_offset(days))),
                    ..NewTask::titled(title)
                },
                &prefs,
            )
            .unwrap();
    }

    let groups = tasks
        .grouped_tasks(&TaskListQuery::default(), local_today())
        .unwrap();
    let categories: Vec<TaskGroupCategory> = groups.iter().map(|group| group.category).collect();

    assert_eq!(
        categories,
        vec![
            TaskGroupCategory::Overdue,
            TaskGroupCategory::Today,
            TaskGroupCategory::Later,
            TaskGroupCategory::NoDate,
        ]
    );
}

#[test]
fn refresh_group_categories_rewrites_stale_rows() {
    let conn = open_db_in_memory().unwrap();
    let tasks = service(&conn);
    tasks
        .create_task(
            NewTask {
                due_date: Some(start_of_local_day_ms(day_offset(1))),
                ..NewTask::titled("tomorrow")
            },
            &PreferenceSettings::default(),
        )
        .unwrap();

    // Two days from now the task is overdue.
    assert_eq!(tasks.refresh_group_categories(day_offset(2)).unwrap(), 1);
    assert_eq!(tasks.refresh_group_categories(day_offset(2)).unwrap(), 0);
}

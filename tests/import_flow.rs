//! End-to-end runs through the public API against an on-disk database.

use category_import::config::ImportConfig;
use category_import::import::{
    run_import, run_import_rows, Behavior, BunchSource, MemoryBunchSource, StagedBunchSource,
    ValidationStrategy,
};
use category_import::model::{Bunch, ImportRow, ENTITY_CODE};
use category_import::storage::{CategoryStore, SqliteStorage};
use tempfile::TempDir;

fn row(id: &str, name: &str) -> ImportRow {
    let url_key = name.to_lowercase();
    [
        ("entity_id", id),
        ("store_id", "0"),
        ("parent", "2"),
        ("is_active", "1"),
        ("include_in_menu", "1"),
        ("name", name),
        ("url_key", url_key.as_str()),
        ("position", "3"),
    ]
    .into_iter()
    .collect()
}

fn config(behavior: Behavior) -> ImportConfig {
    ImportConfig {
        behavior,
        bunch_size: 2,
        validation_strategy: ValidationStrategy::SkipErrors,
        actor: "integration".to_string(),
        ..ImportConfig::default()
    }
}

#[test]
fn test_append_replace_delete_lifecycle() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("categories.db");
    let mut storage = SqliteStorage::open(&db_path).unwrap();

    let roots = vec![row("1", "Root"), row("2", "Default")];
    run_import_rows(&mut storage, roots, &config(Behavior::Append)).unwrap();

    let append = vec![
        row("10", "Shoes"),
        row("11", "Hats"),
        row("12", "Bags"),
        row("x", "Broken"),
    ];
    let report = run_import_rows(&mut storage, append, &config(Behavior::Append)).unwrap();
    assert_eq!(report.stats.created, 3);
    assert_eq!(report.error_count, 1);
    assert!(report.errors.contains_key(&3));

    let replace = vec![row("20", "Outdoor"), row("21", "Indoor"), row("22", "Kids")];
    let report = run_import_rows(&mut storage, replace, &config(Behavior::Replace)).unwrap();
    assert_eq!(report.stats.deleted, 5);
    assert_eq!(report.stats.created, 3);

    run_import_rows(&mut storage, vec![row("30", "Sale")], &config(Behavior::Append)).unwrap();

    let remove = vec![row("30", "Sale"), row("99", "Missing")];
    let report = run_import_rows(&mut storage, remove, &config(Behavior::Delete)).unwrap();
    assert!(report.result);
    assert_eq!(report.stats.deleted, 1);

    let ids: Vec<i64> = storage
        .list_categories()
        .unwrap()
        .iter()
        .map(|c| c.entity_id)
        .collect();
    assert_eq!(ids, vec![1, 2, 22]);
    assert_eq!(storage.get_category(22).unwrap().unwrap().position, 0);

    let history = storage.list_import_history(None).unwrap();
    assert_eq!(history.len(), 5);
    assert!(history.iter().all(|h| h.entity == ENTITY_CODE));
}

#[test]
fn test_staged_bunches_drive_a_run() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("categories.db");
    let mut storage = SqliteStorage::open(&db_path).unwrap();

    let rows = vec![row("30", "A"), row("31", "B"), row("32", "C")];
    let mut memory = MemoryBunchSource::new(rows, 2);
    let mut bunches: Vec<Bunch> = Vec::new();
    while let Some(bunch) = memory.next_bunch().unwrap() {
        bunches.push(bunch);
    }
    let staged_count = storage
        .stage_bunches(ENTITY_CODE, Behavior::Append, &bunches)
        .unwrap();
    assert_eq!(staged_count, 2);

    let mut staged = StagedBunchSource::open(&db_path, ENTITY_CODE).unwrap();
    let report = run_import(&mut storage, &mut staged, &config(Behavior::Append)).unwrap();
    assert_eq!(report.processed_rows, 3);
    assert_eq!(report.stats.created, 3);

    assert_eq!(storage.clear_staged(ENTITY_CODE).unwrap(), 2);
}

#[test]
fn test_delete_with_only_invalid_rows_reports_false() {
    let temp_dir = TempDir::new().unwrap();
    let mut storage = SqliteStorage::open(&temp_dir.path().join("categories.db")).unwrap();

    let report =
        run_import_rows(&mut storage, vec![row("", "Nothing")], &config(Behavior::Delete)).unwrap();
    assert!(!report.result);
    assert!(report.has_errors());
}

//! Persistence tests: restart round trips, failed writes, legacy migration
//! and load-time repair

mod helpers;

use std::fs;

use helpers::*;
use serde_json::json;
use QueueBuddy::models::{LEGACY_GROUP_ID, LEGACY_GROUP_NAME};
use QueueBuddy::storage::find_duplicate_queue_size_keys;
use QueueBuddy::ErrorKind;

#[test]
fn test_state_survives_restart() {
    let ts = TestStore::new();
    ts.group_with_course(G1, "math", "Math", Some(3));
    ts.store.enqueue(G1, "math", request(1, "Alice")).unwrap();
    ts.store.enqueue(G1, "math", request(2, "Bob")).unwrap();
    ts.store.add_group_admin(G1, ADMIN).unwrap();
    ts.store.blacklist_add(13).unwrap();
    ts.store.associate_user_with_group(1, G1).unwrap();
    let before = ts.store.snapshot().unwrap();

    let ts = ts.reopen();

    assert_eq!(ts.store.snapshot().unwrap(), before);
    assert!(ts.report.repairs.is_clean());
    assert!(!ts.report.rewritten);
    assert_eq!(ts.triggers.registered_keys().len(), 4);

    let runtime = ts.read_runtime();
    assert_eq!(runtime["format_version"], "2.0");
    assert_eq!(runtime["user_groups"]["1"], G1);
    assert_eq!(runtime["group_queues"][G1.to_string()]["math"][1]["position"], 2);
}

#[test]
fn test_failed_runtime_write_leaves_state_untouched() {
    let ts = TestStore::new();
    ts.group_with_course(G1, "math", "Math", None);
    ts.store.enqueue(G1, "math", request(1, "Alice")).unwrap();
    let before = ts.store.snapshot().unwrap();

    ts.break_runtime_document();

    let err = ts.store.enqueue(G1, "math", request(2, "Bob")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Persistence);
    assert!(err.is_recoverable());
    assert!(ts.store.close_registration(G1, "math").is_err());
    assert!(ts.store.clear_queue(G1, "math").is_err());

    assert_eq!(ts.store.snapshot().unwrap(), before);
}

#[test]
fn test_truncated_runtime_document_restarts_with_empty_queues() {
    let ts = TestStore::new();
    ts.group_with_course(G1, "math", "Math", Some(3));
    ts.store.enqueue(G1, "math", request(1, "Alice")).unwrap();

    let bytes = fs::read(ts.data_path()).unwrap();
    fs::write(ts.data_path(), &bytes[..bytes.len() / 2]).unwrap();

    let ts = ts.reopen();
    assert!(ts.report.discarded_runtime);
    assert!(ts.report.rewritten);
    assert!(ts.store.queue(G1, "math").unwrap().is_empty());
    assert!(!ts.store.is_registration_open(G1, "math").unwrap());
    assert_eq!(ts.store.queue_capacity(G1).unwrap(), 3);
    assert_eq!(ts.triggers.registered_keys().len(), 4);

    let runtime = ts.read_runtime();
    assert_eq!(runtime["format_version"], "2.0");
    assert_eq!(runtime["group_registration_status"][G1.to_string()]["math"], false);

    let ts = ts.reopen();
    assert!(!ts.report.discarded_runtime);
    assert!(!ts.report.rewritten);
}

#[test]
fn test_misshapen_runtime_document_is_replaced() {
    let ts = TestStore::with_documents(Some(&current_config()), Some(&json!(null)));
    assert!(ts.report.discarded_runtime);
    assert!(ts.store.queue(G1, "math").unwrap().is_empty());

    let mut runtime = json!({
        "format_version": "2.0",
        "group_queues": {G1.to_string(): {"math": [entry_json(1, "Alice", 1)]}}
    });
    runtime["group_queues"][G1.to_string()]["math"][0]["registered_at"] = json!("2024-09-04T20:00:00");
    let ts = TestStore::with_documents(Some(&current_config()), Some(&runtime));
    assert!(ts.report.discarded_runtime);
    assert!(ts.store.queue(G1, "math").unwrap().is_empty());
    assert_eq!(ts.read_runtime()["format_version"], "2.0");
}

#[test]
fn test_case_variant_queue_keys_are_repaired_and_rewritten() {
    let runtime = json!({
        "format_version": "2.0",
        "group_queues": {G1.to_string(): {
            "Math": [entry_json(1, "Alice", 1)],
            "math": [entry_json(2, "Bob", 1)]
        }}
    });

    let ts = TestStore::with_documents(Some(&current_config()), Some(&runtime));
    let positions: Vec<usize> = ts.store.queue(G1, "math").unwrap().iter().map(|e| e.position).collect();
    assert_eq!(positions, vec![1, 2]);
    assert_eq!(ts.report.repairs.merged_queues, 1);
    assert!(ts.report.rewritten);

    let written = ts.read_runtime();
    assert!(written["group_queues"][G1.to_string()].get("Math").is_none());
    assert_eq!(written["group_queues"][G1.to_string()]["math"][1]["position"], 2);

    let ts = ts.reopen();
    assert!(ts.report.repairs.is_clean());
}

#[test]
fn test_failed_config_write_keeps_old_document() {
    let ts = TestStore::new();
    ts.store.initialize_group(G1, None).unwrap();
    let before = ts.store.snapshot().unwrap();

    ts.break_config_document();
    assert!(ts.store.set_queue_capacity(G1, 10).is_err());
    assert!(ts.store.add_group_admin(G1, ADMIN).is_err());

    assert_eq!(ts.store.snapshot().unwrap(), before);
    assert_eq!(ts.store.queue_capacity(G1).unwrap(), 50);
    // Only the two documents remain; no temporary files are left behind
    assert_eq!(fs::read_dir(ts.temp_dir.path()).unwrap().count(), 2);
}

#[test]
fn test_config_document_is_always_whole() {
    let ts = TestStore::new();
    for group in 0..10 {
        ts.store.initialize_group(G1 - group, None).unwrap();
        ts.store.set_queue_capacity(G1 - group, 5 + group).unwrap();

        let config = ts.read_config();
        assert_eq!(config["groups"].as_object().unwrap().len() as i64, group + 1);
    }
    assert_eq!(fs::read_dir(ts.temp_dir.path()).unwrap().count(), 2);
}

#[test]
fn test_legacy_documents_are_migrated_once() {
    let ts = TestStore::with_documents(Some(&legacy_config()), Some(&legacy_runtime()));

    assert!(ts.report.migrated_config);
    assert!(ts.report.migrated_runtime);
    assert!(ts.report.rewritten);

    let group = ts.store.group(LEGACY_GROUP_ID).unwrap().unwrap();
    assert_eq!(group.name, LEGACY_GROUP_NAME);

    let math = ts.store.queue(LEGACY_GROUP_ID, "math").unwrap();
    assert_eq!(math.iter().map(|e| e.position).collect::<Vec<_>>(), vec![1, 2]);
    assert!(ts.store.is_registration_open(LEGACY_GROUP_ID, "math").unwrap());
    assert!(ts.store.is_registration_open(LEGACY_GROUP_ID, "oop_lab").unwrap());
    assert_eq!(ts.store.dev_users().unwrap(), vec![DEV]);
    assert!(ts.store.is_blacklisted(13).unwrap());

    let config = ts.read_config();
    assert!(config.get("courses").is_none());
    assert_eq!(
        config["groups"][LEGACY_GROUP_ID.to_string()]["courses"]["oop_lab"]["schedule"],
        json!({"day": 2, "time": "20:00"})
    );
    let runtime = ts.read_runtime();
    assert_eq!(runtime["format_version"], "2.0");
    assert!(runtime.get("queues").is_none());

    let migrated = ts.store.snapshot().unwrap();
    let ts = ts.reopen();
    assert!(!ts.report.migrated_config);
    assert!(!ts.report.migrated_runtime);
    assert!(ts.report.repairs.is_clean());
    assert_eq!(ts.store.snapshot().unwrap(), migrated);
}

#[test]
fn test_duplicate_queue_size_keys_are_rewritten() {
    let ts = TestStore::new();
    fs::write(
        ts.config_path(),
        format!(
            r#"{{"groups": {{"{g}": {{"name": "G1", "created_at": "2024-09-01T10:00:00+03:00", "courses": {{}}}}}},
               "max_queue_size": 50,
               "group_queue_sizes": {{"{g}": 10, "{g}": 30}}}}"#,
            g = G1
        ),
    )
    .unwrap();

    let ts = ts.reopen();
    assert_eq!(ts.report.duplicate_queue_size_keys, vec![G1.to_string()]);
    assert!(ts.report.rewritten);
    assert_eq!(ts.store.queue_capacity(G1).unwrap(), 30);

    let text = fs::read_to_string(ts.config_path()).unwrap();
    assert!(find_duplicate_queue_size_keys(&text).unwrap().is_empty());
}

#[test]
fn test_load_time_repairs() {
    let mut config = current_config();
    config["groups"]["bogus"] = json!({"name": "Bogus", "created_at": "", "courses": {}});
    config["group_queue_sizes"] = json!({G1.to_string(): -4});

    let runtime = json!({
        "format_version": "2.0",
        "group_queues": {
            G1.to_string(): {
                "math": [entry_json(1, "Alice", 4), entry_json(2, "Bob", 4)],
                "removed_course": [entry_json(3, "Carol", 1)]
            }
        },
        "group_registration_status": {G1.to_string(): {"math": true, "removed_course": true}},
        "user_groups": {"7": G1, "not-a-user": G1}
    });

    let ts = TestStore::with_documents(Some(&config), Some(&runtime));
    let repairs = &ts.report.repairs;
    assert_eq!(repairs.renumbered_queues, 1);
    assert_eq!(repairs.dropped_orphans, 2);
    assert_eq!(repairs.skipped_keys.len(), 3);
    assert!(ts.report.rewritten);

    let positions: Vec<usize> = ts.store.queue(G1, "math").unwrap().iter().map(|e| e.position).collect();
    assert_eq!(positions, vec![1, 2]);
    assert!(ts.store.is_registration_open(G1, "math").unwrap());
    assert_eq!(ts.store.queue_capacity(G1).unwrap(), 50);
    assert_eq!(ts.store.user_group(7).unwrap(), Some(G1));
    assert_eq!(ts.store.groups().unwrap().len(), 1);

    let ts = ts.reopen();
    assert!(ts.report.repairs.is_clean());
}

#[test]
fn test_empty_documents_give_empty_store() {
    let ts = TestStore::new();
    assert!(ts.store.groups().unwrap().is_empty());
    assert!(!ts.report.rewritten);
    assert!(!ts.config_path().exists());
    assert!(!ts.data_path().exists());
}

use ldap_import::backend::RecordBackend;
use ldap_import::mapping::MappingResolver;
use ldap_import::models::{FieldValue, RecordKind};
use ldap_import::reconcile::{CancellationFlag, ImportOutcome, RestorePolicy, RunStatus};
use std::sync::Arc;

mod common;

#[tokio::test]
async fn test_importing_same_entry_twice() {
    let backend = common::setup_test_backend().await;
    let directory = Arc::new(common::ScriptedDirectory::new());
    let mut reconciler = common::reconciler(&directory, &backend);
    let context = common::context(common::BASE_CONFIG, RecordKind::Users);
    let entry = common::user_entry("jdoe", &[]);

    let candidate = reconciler
        .match_local_records(&context, vec![entry.clone()])
        .await
        .unwrap()
        .remove(0);
    let merged = MappingResolver::merge(&entry, &candidate.local, &context.mapping).unwrap();
    let first = reconciler
        .import_entry(&context, merged, &entry, RestorePolicy::Both)
        .await
        .unwrap();
    let created = match first {
        ImportOutcome::Created(record) => record,
        other => panic!("expected a create, got {:?}", other),
    };
    assert!(created.id > 0);
    assert_eq!(created.name, "jdoe");
    assert_eq!(
        created.fields.get("realName"),
        Some(&FieldValue::Single("JDOE Example".to_string()))
    );
    assert!(created.password.is_some());

    let candidate = reconciler
        .match_local_records(&context, vec![entry.clone()])
        .await
        .unwrap()
        .remove(0);
    assert_eq!(candidate.local.id, created.id);
    let merged = MappingResolver::merge(&entry, &candidate.local, &context.mapping).unwrap();
    let second = reconciler
        .import_entry(&context, merged, &entry, RestorePolicy::Both)
        .await
        .unwrap();

    match second {
        ImportOutcome::Updated { record, changed } => {
            assert_eq!(record.id, created.id);
            assert!(!changed);
        }
        other => panic!("expected an update, got {:?}", other),
    }

    let counters = reconciler.get_counters(RecordKind::Users);
    assert_eq!(counters.added, 1);
    assert_eq!(counters.updated, 0);
}

#[tokio::test]
async fn test_second_run_changes_nothing() {
    let backend = common::setup_test_backend().await;
    let entries = vec![
        common::user_entry("alice", &[]),
        common::user_entry("bob", &[]),
    ];
    let context = common::context(common::BASE_CONFIG, RecordKind::Users);

    let directory = Arc::new(common::ScriptedDirectory::with_pages(vec![entries.clone()]));
    let report = common::reconciler(&directory, &backend)
        .run(&context, &CancellationFlag::new())
        .await;
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.counters.users_added, 2);

    let directory = Arc::new(common::ScriptedDirectory::with_pages(vec![entries]));
    let report = common::reconciler(&directory, &backend)
        .run(&context, &CancellationFlag::new())
        .await;
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.counters.users_added, 0);
    assert_eq!(report.counters.users_updated, 0);
    assert_eq!(report.entries_seen, 2);
    assert_eq!(
        backend
            .count_for_configuration(context.table, 1)
            .await
            .unwrap(),
        2
    );
}

#[tokio::test]
async fn test_changed_attribute_counts_as_update_and_keeps_password() {
    let backend = common::setup_test_backend().await;
    let context = common::context(common::BASE_CONFIG, RecordKind::Users);

    let directory = Arc::new(common::ScriptedDirectory::with_pages(vec![vec![
        common::user_entry("jdoe", &[]),
    ]]));
    common::reconciler(&directory, &backend)
        .run(&context, &CancellationFlag::new())
        .await;
    let before = backend
        .find_record_by_dn(context.table, &common::user_dn("jdoe"))
        .await
        .unwrap()
        .unwrap();

    let changed = common::user_entry("jdoe", &[]).with_attribute("mail", ["john@example.org"]);
    let directory = Arc::new(common::ScriptedDirectory::with_pages(vec![vec![changed]]));
    let report = common::reconciler(&directory, &backend)
        .run(&context, &CancellationFlag::new())
        .await;
    assert_eq!(report.counters.users_updated, 1);

    let after = backend
        .find_record_by_id(context.table, before.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        after.fields.get("email"),
        Some(&FieldValue::Single("john@example.org".to_string()))
    );
    assert_eq!(after.password, before.password);
}

#[tokio::test]
async fn test_username_collision_gets_numeric_suffix() {
    let backend = common::setup_test_backend().await;
    let context = common::context(common::BASE_CONFIG, RecordKind::Users);

    // Same uid below two different branches
    let first = common::user_entry("jdoe", &[]);
    let mut second = common::user_entry("jdoe", &[]);
    second.dn = "uid=jdoe,ou=contractors,ou=people,dc=example,dc=com".to_string();
    let mut third = common::user_entry("jdoe", &[]);
    third.dn = "uid=jdoe,ou=interns,ou=people,dc=example,dc=com".to_string();

    let directory = Arc::new(common::ScriptedDirectory::with_pages(vec![vec![
        first, second, third,
    ]]));
    let report = common::reconciler(&directory, &backend)
        .run(&context, &CancellationFlag::new())
        .await;
    assert_eq!(report.counters.users_added, 3);

    let names: Vec<String> = backend
        .find_records_by_dns(
            context.table,
            &[
                common::user_dn("jdoe"),
                "uid=jdoe,ou=contractors,ou=people,dc=example,dc=com".to_string(),
                "uid=jdoe,ou=interns,ou=people,dc=example,dc=com".to_string(),
            ],
        )
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(names, vec!["jdoe", "jdoe1", "jdoe2"]);
}

#[tokio::test]
async fn test_suffixed_username_survives_reimport() {
    let backend = common::setup_test_backend().await;
    let context = common::context(common::BASE_CONFIG, RecordKind::Users);
    // A local account that is not managed by the directory
    sqlx::query("INSERT INTO be_users (configuration_id, dn, dn_key, name) VALUES (0, '', '', 'jdoe')")
        .execute(backend.pool())
        .await
        .unwrap();

    let directory = Arc::new(common::ScriptedDirectory::with_pages(vec![vec![
        common::user_entry("jdoe", &[]),
    ]]));
    let report = common::reconciler(&directory, &backend)
        .run(&context, &CancellationFlag::new())
        .await;
    assert_eq!(report.counters.users_added, 1);
    let created = backend
        .find_record_by_dn(context.table, &common::user_dn("jdoe"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(created.name, "jdoe1");

    let directory = Arc::new(common::ScriptedDirectory::with_pages(vec![vec![
        common::user_entry("jdoe", &[]),
    ]]));
    let report = common::reconciler(&directory, &backend)
        .run(&context, &CancellationFlag::new())
        .await;
    assert_eq!(report.counters.users_added, 0);
    assert_eq!(report.counters.users_updated, 0);

    let stored = backend
        .find_record_by_id(context.table, created.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.name, "jdoe1");
}

#[tokio::test]
async fn test_renamed_user_gets_unique_new_name() {
    let backend = common::setup_test_backend().await;
    let context = common::context(common::BASE_CONFIG, RecordKind::Users);

    let directory = Arc::new(common::ScriptedDirectory::with_pages(vec![vec![
        common::user_entry("jdoe", &[]),
        common::user_entry("john", &[]),
    ]]));
    common::reconciler(&directory, &backend)
        .run(&context, &CancellationFlag::new())
        .await;

    // jdoe's uid changes to john, which is taken
    let renamed = common::user_entry("jdoe", &[]).with_attribute("uid", ["john"]);
    let directory = Arc::new(common::ScriptedDirectory::with_pages(vec![vec![renamed]]));
    let report = common::reconciler(&directory, &backend)
        .run(&context, &CancellationFlag::new())
        .await;
    assert_eq!(report.counters.users_updated, 1);

    let stored = backend
        .find_record_by_dn(context.table, &common::user_dn("jdoe"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.name, "john1");
}

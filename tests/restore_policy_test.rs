use ldap_import::backend::RecordBackend;
use ldap_import::models::RecordKind;
use ldap_import::reconcile::{CancellationFlag, MissingUserPolicy, RestorePolicy, RunStatus};
use std::sync::Arc;

mod common;

/// Import jdoe, flag it disabled and deleted, then import it again with `policy`
async fn reimport_flagged_user(policy: RestorePolicy) -> (bool, bool) {
    let backend = common::setup_test_backend().await;
    let context = common::context(common::BASE_CONFIG, RecordKind::Users);

    let directory = Arc::new(common::ScriptedDirectory::with_pages(vec![vec![
        common::user_entry("jdoe", &[]),
    ]]));
    common::reconciler(&directory, &backend)
        .run(&context, &CancellationFlag::new())
        .await;
    backend.disable_for_configuration(context.table, 1).await.unwrap();
    backend.delete_for_configuration(context.table, 1).await.unwrap();

    let context = context.with_restore_policy(policy);
    let directory = Arc::new(common::ScriptedDirectory::with_pages(vec![vec![
        common::user_entry("jdoe", &[]),
    ]]));
    let report = common::reconciler(&directory, &backend)
        .run(&context, &CancellationFlag::new())
        .await;
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.counters.users_added, 0);

    let stored = backend
        .find_record_by_dn(context.table, &common::user_dn("jdoe"))
        .await
        .unwrap()
        .unwrap();
    (stored.disabled, stored.deleted)
}

#[tokio::test]
async fn test_restore_enable() {
    assert_eq!(reimport_flagged_user(RestorePolicy::Enable).await, (false, true));
}

#[tokio::test]
async fn test_restore_undelete() {
    assert_eq!(reimport_flagged_user(RestorePolicy::Undelete).await, (true, false));
}

#[tokio::test]
async fn test_restore_both() {
    assert_eq!(reimport_flagged_user(RestorePolicy::Both).await, (false, false));
}

#[tokio::test]
async fn test_restore_nothing() {
    assert_eq!(reimport_flagged_user(RestorePolicy::Nothing).await, (true, true));
}

#[tokio::test]
async fn test_missing_users_stay_disabled() {
    let backend = common::setup_test_backend().await;
    let context = common::context(common::BASE_CONFIG, RecordKind::Users);

    let directory = Arc::new(common::ScriptedDirectory::with_pages(vec![vec![
        common::user_entry("alice", &[]),
        common::user_entry("bob", &[]),
    ]]));
    common::reconciler(&directory, &backend)
        .run(&context, &CancellationFlag::new())
        .await;

    // bob left the directory
    let context = context.with_missing_user_policy(MissingUserPolicy::Disable);
    let directory = Arc::new(common::ScriptedDirectory::with_pages(vec![vec![
        common::user_entry("alice", &[]),
    ]]));
    let report = common::reconciler(&directory, &backend)
        .run(&context, &CancellationFlag::new())
        .await;

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.users_flagged, 2);
    // alice was re-enabled, which is a change
    assert_eq!(report.counters.users_updated, 1);

    let alice = backend
        .find_record_by_dn(context.table, &common::user_dn("alice"))
        .await
        .unwrap()
        .unwrap();
    let bob = backend
        .find_record_by_dn(context.table, &common::user_dn("bob"))
        .await
        .unwrap()
        .unwrap();
    assert!(!alice.disabled);
    assert!(bob.disabled);
    assert!(!bob.deleted);
}

#[tokio::test]
async fn test_missing_users_deleted() {
    let backend = common::setup_test_backend().await;
    let context = common::context(common::BASE_CONFIG, RecordKind::Users);

    let directory = Arc::new(common::ScriptedDirectory::with_pages(vec![vec![
        common::user_entry("alice", &[]),
        common::user_entry("bob", &[]),
    ]]));
    common::reconciler(&directory, &backend)
        .run(&context, &CancellationFlag::new())
        .await;

    let context = context.with_missing_user_policy(MissingUserPolicy::Delete);
    let directory = Arc::new(common::ScriptedDirectory::with_pages(vec![vec![
        common::user_entry("bob", &[]),
    ]]));
    common::reconciler(&directory, &backend)
        .run(&context, &CancellationFlag::new())
        .await;

    assert_eq!(
        backend.count_for_configuration(context.table, 1).await.unwrap(),
        1
    );
    let alice = backend
        .find_record_by_dn(context.table, &common::user_dn("alice"))
        .await
        .unwrap()
        .unwrap();
    assert!(alice.deleted);
}

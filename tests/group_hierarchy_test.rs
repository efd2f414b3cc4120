use ldap_import::backend::database::sqlite::SqliteBackend;
use ldap_import::backend::RecordBackend;
use ldap_import::models::RecordKind;
use ldap_import::reconcile::{CancellationFlag, RunStatus};
use ldap_import::utils::normalize_dn;
use std::sync::Arc;

mod common;

async fn seed_group(backend: &SqliteBackend, id: i64, cn: &str) {
    let dn = common::group_dn(cn);
    sqlx::query(
        "INSERT INTO be_groups (id, configuration_id, dn, dn_key, name) VALUES (?1, 1, ?2, ?3, ?4)",
    )
    .bind(id)
    .bind(&dn)
    .bind(normalize_dn(&dn))
    .bind(cn)
    .execute(backend.pool())
    .await
    .unwrap();
}

#[tokio::test]
async fn test_new_subgroup_is_linked_into_existing_parent() {
    let backend = common::setup_test_backend().await;
    let context = common::context(common::BASE_CONFIG, RecordKind::Groups);
    seed_group(&backend, 10, "A").await;

    let directory = Arc::new(common::ScriptedDirectory::with_pages(vec![vec![
        common::group_entry("B", &["A"]),
    ]]));
    let report = common::reconciler(&directory, &backend)
        .run(&context, &CancellationFlag::new())
        .await;
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.counters.groups_added, 1);

    let b = backend
        .find_record_by_dn(context.table, &common::group_dn("B"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(b.id, 11);
    assert_eq!(b.name, "B");

    let a = backend.find_record_by_id(context.table, 10).await.unwrap().unwrap();
    assert_eq!(a.memberships, vec![11]);
    assert!(directory.lookups().is_empty());
}

#[tokio::test]
async fn test_linking_is_not_repeated() {
    let backend = common::setup_test_backend().await;
    let context = common::context(common::BASE_CONFIG, RecordKind::Groups);
    seed_group(&backend, 10, "A").await;

    for _ in 0..2 {
        let directory = Arc::new(common::ScriptedDirectory::with_pages(vec![vec![
            common::group_entry("B", &["A"]),
        ]]));
        common::reconciler(&directory, &backend)
            .run(&context, &CancellationFlag::new())
            .await;
    }

    let a = backend.find_record_by_id(context.table, 10).await.unwrap().unwrap();
    assert_eq!(a.memberships, vec![11]);
}

#[tokio::test]
async fn test_missing_parents_are_imported_up_the_chain() {
    let backend = common::setup_test_backend().await;
    let context = common::context(common::BASE_CONFIG, RecordKind::Groups);
    let directory = Arc::new(common::ScriptedDirectory::with_pages(vec![vec![
        common::group_entry("Child", &["Parent"]),
    ]]));
    directory.add_entry(common::group_entry("Parent", &["Root"]));
    directory.add_entry(common::group_entry("Root", &[]));

    let report = common::reconciler(&directory, &backend)
        .run(&context, &CancellationFlag::new())
        .await;
    assert_eq!(report.counters.groups_added, 3);

    let find = |cn: &'static str| {
        let backend = backend.clone();
        let table = context.table;
        async move {
            backend
                .find_record_by_dn(table, &common::group_dn(cn))
                .await
                .unwrap()
                .unwrap()
        }
    };
    let child = find("Child").await;
    let parent = find("Parent").await;
    let root = find("Root").await;

    assert!(child.memberships.is_empty());
    assert_eq!(parent.memberships, vec![child.id]);
    assert_eq!(root.memberships, vec![parent.id]);
}

#[tokio::test]
async fn test_parent_later_in_same_page_is_not_created_twice() {
    let backend = common::setup_test_backend().await;
    let context = common::context(common::BASE_CONFIG, RecordKind::Groups);
    // A is imported while walking B's parents, then reached again as an entry
    let directory = Arc::new(common::ScriptedDirectory::with_pages(vec![vec![
        common::group_entry("B", &["A"]),
        common::group_entry("A", &[]),
    ]]));
    directory.add_entry(common::group_entry("A", &[]));

    let report = common::reconciler(&directory, &backend)
        .run(&context, &CancellationFlag::new())
        .await;
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.counters.groups_added, 2);

    let (rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM be_groups WHERE dn_key = ?1")
        .bind(normalize_dn(&common::group_dn("A")))
        .fetch_one(backend.pool())
        .await
        .unwrap();
    assert_eq!(rows, 1);

    let a = backend
        .find_record_by_dn(context.table, &common::group_dn("A"))
        .await
        .unwrap()
        .unwrap();
    let b = backend
        .find_record_by_dn(context.table, &common::group_dn("B"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(a.memberships, vec![b.id]);
    assert_eq!(backend.count_for_configuration(context.table, 1).await.unwrap(), 2);
}

#[tokio::test]
async fn test_parent_cycle_terminates() {
    let backend = common::setup_test_backend().await;
    let context = common::context(common::BASE_CONFIG, RecordKind::Groups);
    let directory = Arc::new(common::ScriptedDirectory::with_pages(vec![vec![
        common::group_entry("X", &["Y"]),
    ]]));
    // Y and Z are each other's parent, and Z is also X's parent
    directory.add_entry(common::group_entry("Y", &["Z"]));
    directory.add_entry(common::group_entry("Z", &["Y", "X"]));

    let report = common::reconciler(&directory, &backend)
        .run(&context, &CancellationFlag::new())
        .await;
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.counters.groups_added, 3);
    assert_eq!(directory.lookups().len(), 2);

    let x = backend
        .find_record_by_dn(context.table, &common::group_dn("X"))
        .await
        .unwrap()
        .unwrap();
    let y = backend
        .find_record_by_dn(context.table, &common::group_dn("Y"))
        .await
        .unwrap()
        .unwrap();
    let z = backend
        .find_record_by_dn(context.table, &common::group_dn("Z"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(y.memberships, vec![x.id, z.id]);
    assert_eq!(z.memberships, vec![y.id]);
    assert_eq!(x.memberships, vec![z.id]);
}

#[tokio::test]
async fn test_unknown_and_foreign_parents_are_skipped() {
    let backend = common::setup_test_backend().await;
    let context = common::context(common::BASE_CONFIG, RecordKind::Groups);
    let entry = common::group_entry("Team", &["Ghost"]).with_attribute(
        "memberOf",
        [
            common::group_dn("Ghost"),
            "cn=Other,ou=elsewhere,dc=example,dc=com".to_string(),
        ],
    );
    let directory = Arc::new(common::ScriptedDirectory::with_pages(vec![vec![entry]]));

    let report = common::reconciler(&directory, &backend)
        .run(&context, &CancellationFlag::new())
        .await;

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.counters.groups_added, 1);
    // Only the DN below the group base was looked up
    assert_eq!(directory.lookups(), vec![common::group_dn("Ghost")]);
}

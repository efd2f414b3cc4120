#![allow(dead_code)]

use async_trait::async_trait;
use ldap_import::backend::database::sqlite::SqliteBackend;
use ldap_import::backend::database::DatabaseBackendConfig;
use ldap_import::backend::{Backend, BackendFactory, RecordBackend};
use ldap_import::config::AppConfig;
use ldap_import::directory::{DirectoryClient, SearchPage, SearchRequest, SearchScope};
use ldap_import::error::{AppError, AppResult};
use ldap_import::extension::ExtensionRegistry;
use ldap_import::models::{DirectoryEntry, Mode, RecordKind};
use ldap_import::reconcile::{Reconciler, SyncContext};
use ldap_import::startup::init_tables;
use ldap_import::utils::normalize_dn;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use testcontainers_modules::postgres::Postgres;
use testcontainers_modules::testcontainers::runners::AsyncRunner;
use testcontainers_modules::testcontainers::ContainerAsync;

pub const PEOPLE_BASE: &str = "ou=people,dc=example,dc=com";
pub const GROUPS_BASE: &str = "ou=groups,dc=example,dc=com";

/// Configuration 1, backend users and groups
pub const BASE_CONFIG: &str = r#"
directory:
  url: "ldap://ldap.example.com"
backend:
  type: "database"
  database:
    type: "sqlite"
    url: ":memory:"
credentials:
  algorithm: "bcrypt"
  bcrypt_cost: 4
configurations:
  - id: 1
    name: "Example"
    backend:
      users:
        basedn: "ou=people,dc=example,dc=com"
        filter: "(&(objectClass=inetOrgPerson)(uid={USERNAME}))"
        mapping:
          username: "<uid>"
          email: "<mail>"
          realName: "<givenName> <sn>"
          usergroup: "<memberOf>"
      groups:
        basedn: "ou=groups,dc=example,dc=com"
        filter: "(objectClass=groupOfNames)"
        mapping:
          title: "<cn>"
          parent_group: "<memberOf>"
"#;

/// `BASE_CONFIG` with extra keys for the backend section, indented by six blanks
pub fn config_with(backend_settings: &str) -> String {
    format!("{}{}", BASE_CONFIG, backend_settings)
}

/// In-memory SQLite store with all four tables
pub async fn setup_test_backend() -> Arc<SqliteBackend> {
    let backend = SqliteBackend::connect(&DatabaseBackendConfig::memory_sqlite())
        .await
        .unwrap();
    init_tables(&backend).await.unwrap();
    Arc::new(backend)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TestDatabaseType {
    Sqlite,
    Postgres,
}

/// A store of the requested type. The container must outlive the backend.
pub struct TestDatabase {
    pub backend: Arc<dyn RecordBackend>,
    pub postgres_container: Option<ContainerAsync<Postgres>>,
}

pub async fn setup_test_database(database_type: TestDatabaseType) -> TestDatabase {
    match database_type {
        TestDatabaseType::Sqlite => TestDatabase {
            backend: setup_test_backend().await,
            postgres_container: None,
        },
        TestDatabaseType::Postgres => {
            let container = Postgres::default().start().await.unwrap();
            let connection_url = format!(
                "postgresql://postgres:postgres@{}:{}/postgres",
                container.get_host().await.unwrap(),
                container.get_host_port_ipv4(5432).await.unwrap()
            );
            let backend =
                BackendFactory::create(&DatabaseBackendConfig::postgres(connection_url).with_max_connections(5))
                    .await
                    .unwrap();
            init_tables(backend.as_ref()).await.unwrap();
            TestDatabase {
                backend,
                postgres_container: Some(container),
            }
        }
    }
}

pub fn load_config(yaml: &str) -> AppConfig {
    AppConfig::load_from_str(yaml).unwrap()
}

pub fn context(yaml: &str, kind: RecordKind) -> SyncContext {
    context_with_registry(yaml, kind, &ExtensionRegistry::with_builtins())
}

pub fn context_with_registry(
    yaml: &str,
    kind: RecordKind,
    registry: &ExtensionRegistry,
) -> SyncContext {
    SyncContext::from_config(&load_config(yaml), 1, Mode::Backend, kind, registry).unwrap()
}

pub fn reconciler(directory: &Arc<ScriptedDirectory>, backend: &Arc<SqliteBackend>) -> Reconciler {
    Reconciler::new(
        directory.clone() as Arc<dyn DirectoryClient>,
        backend.clone() as Arc<dyn RecordBackend>,
    )
}

pub fn reconciler_for(
    directory: &Arc<ScriptedDirectory>,
    backend: &Arc<dyn RecordBackend>,
) -> Reconciler {
    Reconciler::new(directory.clone() as Arc<dyn DirectoryClient>, backend.clone())
}

pub fn user_dn(uid: &str) -> String {
    format!("uid={},{}", uid, PEOPLE_BASE)
}

pub fn group_dn(cn: &str) -> String {
    format!("cn={},{}", cn, GROUPS_BASE)
}

pub fn user_entry(uid: &str, groups: &[&str]) -> DirectoryEntry {
    let mut entry = DirectoryEntry::new(user_dn(uid))
        .with_attribute("uid", [uid])
        .with_attribute("mail", [format!("{}@example.com", uid)])
        .with_attribute("givenName", [uid.to_uppercase()])
        .with_attribute("sn", ["Example"]);
    if !groups.is_empty() {
        entry = entry.with_attribute("memberOf", groups.iter().map(|cn| group_dn(cn)));
    }
    entry
}

pub fn group_entry(cn: &str, parents: &[&str]) -> DirectoryEntry {
    let mut entry = DirectoryEntry::new(group_dn(cn)).with_attribute("cn", [cn]);
    if !parents.is_empty() {
        entry = entry.with_attribute("memberOf", parents.iter().map(|cn| group_dn(cn)));
    }
    entry
}

pub enum ScriptedPage {
    Entries(Vec<DirectoryEntry>),
    Unavailable(String),
}

/// Directory double: paged searches replay scripted pages, base-scope
/// lookups are answered from a DN index.
#[derive(Default)]
pub struct ScriptedDirectory {
    pages: Mutex<VecDeque<ScriptedPage>>,
    entries: Mutex<HashMap<String, DirectoryEntry>>,
    paged_searches: AtomicUsize,
    lookups: Mutex<Vec<String>>,
}

impl ScriptedDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pages(pages: Vec<Vec<DirectoryEntry>>) -> Self {
        let directory = Self::new();
        for page in pages {
            directory.push_page(page);
        }
        directory
    }

    pub fn push_page(&self, entries: Vec<DirectoryEntry>) {
        self.pages
            .lock()
            .unwrap()
            .push_back(ScriptedPage::Entries(entries));
    }

    pub fn push_failure(&self, message: &str) {
        self.pages
            .lock()
            .unwrap()
            .push_back(ScriptedPage::Unavailable(message.to_string()));
    }

    /// Make an entry findable by a base-scope lookup
    pub fn add_entry(&self, entry: DirectoryEntry) {
        self.entries
            .lock()
            .unwrap()
            .insert(normalize_dn(&entry.dn), entry);
    }

    pub fn paged_searches(&self) -> usize {
        self.paged_searches.load(Ordering::SeqCst)
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }
}

#[async_trait]
impl DirectoryClient for ScriptedDirectory {
    async fn connect(&self) -> AppResult<()> {
        Ok(())
    }

    async fn search(&self, request: &SearchRequest, _resume: bool) -> AppResult<SearchPage> {
        if request.paginate {
            self.paged_searches.fetch_add(1, Ordering::SeqCst);
            let mut pages = self.pages.lock().unwrap();
            return match pages.pop_front() {
                Some(ScriptedPage::Entries(entries)) => Ok(SearchPage {
                    entries,
                    is_partial: !pages.is_empty(),
                }),
                Some(ScriptedPage::Unavailable(message)) => {
                    Err(AppError::DirectoryUnavailable(message))
                }
                None => Ok(SearchPage::default()),
            };
        }

        if request.scope == SearchScope::Base {
            self.lookups.lock().unwrap().push(request.base_dn.clone());
            let entry = self
                .entries
                .lock()
                .unwrap()
                .get(&normalize_dn(&request.base_dn))
                .cloned();
            return Ok(SearchPage {
                entries: entry.into_iter().collect(),
                is_partial: false,
            });
        }

        Ok(SearchPage::default())
    }

    async fn disconnect(&self) -> AppResult<()> {
        Ok(())
    }
}

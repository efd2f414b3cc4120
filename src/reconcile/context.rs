use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{AppConfig, TableConfig};
use crate::error::{AppError, AppResult};
use crate::extension::{ExtensionRegistry, PostProcessor};
use crate::mapping::MappingTable;
use crate::models::{LocalRecord, Mode, RecordKind, TargetTable};
use crate::password::CredentialGenerator;
use crate::utils::normalize_dn;

/// Which flags of an existing record are cleared when it is imported again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestorePolicy {
    /// Clear the disabled flag only
    Enable,
    /// Clear the deleted flag only
    Undelete,
    #[default]
    Both,
    Nothing,
}

impl RestorePolicy {
    pub fn apply(&self, record: &mut LocalRecord) {
        match self {
            RestorePolicy::Enable => record.disabled = false,
            RestorePolicy::Undelete => record.deleted = false,
            RestorePolicy::Both => {
                record.disabled = false;
                record.deleted = false;
            }
            RestorePolicy::Nothing => {}
        }
    }
}

impl FromStr for RestorePolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "enable" => Ok(RestorePolicy::Enable),
            "undelete" => Ok(RestorePolicy::Undelete),
            "both" => Ok(RestorePolicy::Both),
            "nothing" => Ok(RestorePolicy::Nothing),
            other => Err(AppError::Configuration(format!(
                "Unknown restore policy: {}",
                other
            ))),
        }
    }
}

/// What happens to the users of a configuration before an import, so that
/// users gone from the directory end up disabled or deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingUserPolicy {
    #[default]
    Nothing,
    Disable,
    Delete,
}

impl FromStr for MissingUserPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nothing" => Ok(MissingUserPolicy::Nothing),
            "disable" => Ok(MissingUserPolicy::Disable),
            "delete" => Ok(MissingUserPolicy::Delete),
            other => Err(AppError::Configuration(format!(
                "Unknown missing user policy: {}",
                other
            ))),
        }
    }
}

/// Base DN and filter template of a search
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchSettings {
    pub basedn: String,
    pub filter: String,
}

impl From<&TableConfig> for SearchSettings {
    fn from(config: &TableConfig) -> Self {
        Self {
            basedn: config.basedn.clone(),
            filter: config.filter.clone(),
        }
    }
}

/// Everything a sync run needs, built once and read-only afterwards.
///
/// Mapping expressions, hook names and post-processor names are all
/// resolved while building, so a bad configuration fails before the
/// directory is contacted.
#[derive(Clone)]
pub struct SyncContext {
    pub configuration_id: u32,
    pub table: TargetTable,
    pub search: SearchSettings,
    pub mapping: MappingTable,
    /// Group search and mapping of the same mode, used for memberships and hierarchy
    pub group_search: SearchSettings,
    pub group_mapping: MappingTable,
    /// Normalized DNs
    pub required_groups: Vec<String>,
    pub assign_groups: Vec<i64>,
    pub admin_groups: Vec<i64>,
    pub import_missing_groups: bool,
    pub restore_policy: RestorePolicy,
    pub missing_user_policy: MissingUserPolicy,
    pub post_processors: Vec<Arc<dyn PostProcessor>>,
    pub credentials: Arc<CredentialGenerator>,
}

impl SyncContext {
    pub fn from_config(
        config: &AppConfig,
        configuration_id: u32,
        mode: Mode,
        kind: RecordKind,
        registry: &ExtensionRegistry,
    ) -> AppResult<Self> {
        let configuration = config.configuration(configuration_id)?;
        let settings = configuration.mode(mode);
        let table_config = settings.table(kind);

        let mapping = MappingTable::compile(kind, &table_config.mapping, registry)?;
        let group_mapping =
            MappingTable::compile(RecordKind::Groups, &settings.groups.mapping, registry)?;
        let post_processors = registry.resolve_post_processors(&settings.post_processors)?;
        let credentials = CredentialGenerator::new(
            config.credentials.algorithm,
            config.credentials.bcrypt_cost,
        )?;

        Ok(Self {
            configuration_id,
            table: TargetTable::new(mode, kind),
            search: SearchSettings::from(table_config),
            mapping,
            group_search: SearchSettings::from(&settings.groups),
            group_mapping,
            required_groups: settings
                .required_groups
                .iter()
                .map(|dn| normalize_dn(dn))
                .filter(|dn| !dn.is_empty())
                .collect(),
            assign_groups: settings.assign_groups.clone(),
            admin_groups: settings.admin_groups.clone(),
            import_missing_groups: settings.import_missing_groups,
            restore_policy: RestorePolicy::default(),
            missing_user_policy: MissingUserPolicy::default(),
            post_processors,
            credentials: Arc::new(credentials),
        })
    }

    pub fn with_restore_policy(mut self, policy: RestorePolicy) -> Self {
        self.restore_policy = policy;
        self
    }

    pub fn with_missing_user_policy(mut self, policy: MissingUserPolicy) -> Self {
        self.missing_user_policy = policy;
        self
    }

    pub fn kind(&self) -> RecordKind {
        self.table.kind
    }

    pub fn group_table(&self) -> TargetTable {
        self.table.group_table()
    }

    /// A record that does not exist locally yet, for this context's table
    pub fn blank_record(&self) -> LocalRecord {
        LocalRecord::blank(self.table.kind, self.configuration_id)
    }
}

impl std::fmt::Debug for SyncContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncContext")
            .field("configuration_id", &self.configuration_id)
            .field("table", &self.table)
            .field("search", &self.search)
            .field("mapping", &self.mapping)
            .field("required_groups", &self.required_groups)
            .field("restore_policy", &self.restore_policy)
            .field("missing_user_policy", &self.missing_user_policy)
            .field("post_processors", &self.post_processors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
directory:
  url: "ldap://localhost"
backend:
  type: "database"
  database:
    type: "sqlite"
    url: ":memory:"
credentials:
  algorithm: "bcrypt"
  bcrypt_cost: 4
configurations:
  - id: 7
    backend:
      users:
        basedn: "ou=people,dc=example,dc=com"
        filter: "(uid={USERNAME})"
        mapping:
          username: "<uid>"
          __department: "<departmentNumber>"
      groups:
        basedn: "ou=groups,dc=example,dc=com"
        mapping:
          title: "<cn>"
      required_groups: ["CN=Staff, OU=Groups,DC=example,DC=com"]
      post_processors: ["log"]
"#;

    fn config() -> AppConfig {
        AppConfig::load_from_str(CONFIG).unwrap()
    }

    #[test]
    fn test_restore_policy_flags() {
        let cases = [
            (RestorePolicy::Enable, false, true),
            (RestorePolicy::Undelete, true, false),
            (RestorePolicy::Both, false, false),
            (RestorePolicy::Nothing, true, true),
        ];
        for (policy, disabled, deleted) in cases {
            let mut record = LocalRecord::blank(RecordKind::Users, 1);
            record.disabled = true;
            record.deleted = true;
            policy.apply(&mut record);
            assert_eq!((record.disabled, record.deleted), (disabled, deleted), "{:?}", policy);
        }
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("UNDELETE".parse::<RestorePolicy>().unwrap(), RestorePolicy::Undelete);
        assert!("sometimes".parse::<RestorePolicy>().is_err());
        assert_eq!("disable".parse::<MissingUserPolicy>().unwrap(), MissingUserPolicy::Disable);
        assert_eq!(RestorePolicy::default(), RestorePolicy::Both);
    }

    #[test]
    fn test_context_from_config() {
        let context = SyncContext::from_config(
            &config(),
            7,
            Mode::Backend,
            RecordKind::Users,
            &ExtensionRegistry::with_builtins(),
        )
        .unwrap()
        .with_restore_policy(RestorePolicy::Enable);

        assert_eq!(context.table, TargetTable::users(Mode::Backend));
        assert_eq!(context.group_table(), TargetTable::groups(Mode::Backend));
        assert_eq!(context.search.basedn, "ou=people,dc=example,dc=com");
        assert_eq!(
            context.required_groups,
            vec!["cn=staff,ou=groups,dc=example,dc=com".to_string()]
        );
        assert_eq!(context.post_processors.len(), 1);
        assert_eq!(context.restore_policy, RestorePolicy::Enable);
        assert_eq!(context.blank_record().configuration_id, 7);
    }

    #[test]
    fn test_unknown_post_processor_fails_early() {
        let yaml = CONFIG.replace("[\"log\"]", "[\"nope\"]");
        let config = AppConfig::load_from_str(&yaml).unwrap();
        let result = SyncContext::from_config(
            &config,
            7,
            Mode::Backend,
            RecordKind::Users,
            &ExtensionRegistry::with_builtins(),
        );
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_unknown_configuration() {
        let result = SyncContext::from_config(
            &config(),
            8,
            Mode::Backend,
            RecordKind::Groups,
            &ExtensionRegistry::with_builtins(),
        );
        assert!(result.is_err());
    }
}

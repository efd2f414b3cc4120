use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use crate::backend::database::DatabaseBackendConfig;
use crate::backend::DatabaseType;
use crate::error::{AppError, AppResult};
use crate::models::{Mode, RecordKind};
use crate::password::PasswordAlgorithm;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    pub directory: DirectoryConfig,
    pub backend: BackendConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    pub configurations: Vec<ImportConfiguration>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    #[default]
    Compact,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Connection settings of the directory server
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DirectoryConfig {
    /// `ldap://host:389`, `ldaps://host:636` or `ldapi://...`
    pub url: String,
    /// Empty for an anonymous bind
    #[serde(default)]
    pub bind_dn: String,
    #[serde(default)]
    pub bind_password: Option<String>,
    #[serde(default)]
    pub starttls: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Entries per page of a paged search; 0 disables paging
    #[serde(default = "default_page_size")]
    pub page_size: i32,
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_page_size() -> i32 {
    500
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BackendConfig {
    #[serde(rename = "type")]
    pub backend_type: String,
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    #[serde(rename = "type")]
    pub db_type: String,
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

/// How placeholder passwords of created users are hashed
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub algorithm: PasswordAlgorithm,
    #[serde(default)]
    pub bcrypt_cost: Option<u32>,
}

/// One named import configuration (a directory server view with its mappings)
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ImportConfiguration {
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub backend: ModeConfig,
    #[serde(default)]
    pub frontend: ModeConfig,
}

impl ImportConfiguration {
    pub fn mode(&self, mode: Mode) -> &ModeConfig {
        match mode {
            Mode::Backend => &self.backend,
            Mode::Frontend => &self.frontend,
        }
    }
}

/// Settings of one side (backend or frontend) of a configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ModeConfig {
    #[serde(default)]
    pub users: TableConfig,
    #[serde(default)]
    pub groups: TableConfig,
    /// Directory group DNs a user must belong to (at least one) to be imported
    #[serde(default)]
    pub required_groups: Vec<String>,
    /// Local group ids every imported user is assigned to
    #[serde(default)]
    pub assign_groups: Vec<i64>,
    /// Local group ids granting the admin flag (backend users only)
    #[serde(default)]
    pub admin_groups: Vec<i64>,
    /// Create local groups for directory groups of a user that are not imported yet
    #[serde(default)]
    pub import_missing_groups: bool,
    /// Registered post-processors run on records carrying auxiliary data
    #[serde(default)]
    pub post_processors: Vec<String>,
}

impl ModeConfig {
    pub fn table(&self, kind: RecordKind) -> &TableConfig {
        match kind {
            RecordKind::Users => &self.users,
            RecordKind::Groups => &self.groups,
        }
    }
}

/// Search and mapping settings of one record kind
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct TableConfig {
    #[serde(default)]
    pub basedn: String,
    #[serde(default)]
    pub filter: String,
    #[serde(default)]
    pub mapping: BTreeMap<String, String>,
}

impl AppConfig {
    /// Load configuration from YAML file
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, String> {
        let path = config_path.as_ref();

        if !path.exists() {
            return Err(format!("Configuration file not found: {}", path.display()));
        }

        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;

        Self::load_from_str(&content)
            .map_err(|e| format!("Failed to parse config file {}: {}", path.display(), e))
    }

    pub fn load_from_str(content: &str) -> Result<Self, String> {
        // Expand environment variables in YAML content
        let expanded_content = Self::expand_env_vars(content)?;

        let app_config: AppConfig =
            serde_yaml::from_str(&expanded_content).map_err(|e| e.to_string())?;
        app_config.validate()?;

        Ok(app_config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.configurations.is_empty() {
            return Err("Configuration must contain at least one import configuration".to_string());
        }

        let mut ids = HashSet::new();
        for configuration in &self.configurations {
            if configuration.id == 0 {
                return Err("Configuration id 0 is reserved".to_string());
            }
            if !ids.insert(configuration.id) {
                return Err(format!("Duplicate configuration id {}", configuration.id));
            }
        }

        let url = url::Url::parse(&self.directory.url)
            .map_err(|e| format!("Invalid directory url {}: {}", self.directory.url, e))?;
        if !matches!(url.scheme(), "ldap" | "ldaps" | "ldapi") {
            return Err(format!(
                "Directory url must use ldap, ldaps or ldapi, got {}",
                url.scheme()
            ));
        }
        if self.directory.page_size < 0 {
            return Err("Directory page_size cannot be negative".to_string());
        }

        Ok(())
    }

    /// Replace `${VAR}` or `${VAR:-default}` with the environment value
    fn expand_env_vars(content: &str) -> Result<String, String> {
        let chars: Vec<char> = content.chars().collect();
        let mut expanded = String::new();
        let mut i = 0;

        while i < chars.len() {
            if i + 1 < chars.len() && chars[i] == '$' && chars[i + 1] == '{' {
                let mut j = i + 2;
                while j < chars.len() && chars[j] != '}' {
                    j += 1;
                }

                if j < chars.len() {
                    let var_expr: String = chars[i + 2..j].iter().collect();

                    let (var_name, default_value) = match var_expr.split_once(":-") {
                        Some((name, default)) => (name.to_string(), Some(default.to_string())),
                        None => (var_expr, None),
                    };

                    let value = match (std::env::var(&var_name), default_value) {
                        (Ok(val), _) => val,
                        (Err(_), Some(default)) => default,
                        (Err(_), None) => {
                            return Err(format!(
                                "Environment variable {} not found and no default provided",
                                var_name
                            ));
                        }
                    };

                    expanded.push_str(&value);
                    i = j + 1;
                    continue;
                }
            }
            expanded.push(chars[i]);
            i += 1;
        }

        Ok(expanded)
    }

    pub fn configuration(&self, id: u32) -> AppResult<&ImportConfiguration> {
        self.configurations
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| AppError::Configuration(format!("Unknown configuration id {}", id)))
    }

    /// Storage settings for the backend factory
    pub fn database_backend_config(&self) -> AppResult<DatabaseBackendConfig> {
        if self.backend.backend_type != "database" {
            return Err(AppError::Configuration(format!(
                "Unsupported backend type: {}",
                self.backend.backend_type
            )));
        }

        let database_config = self.backend.database.as_ref().ok_or_else(|| {
            AppError::Configuration(
                "Database configuration is required when backend type is 'database'".to_string(),
            )
        })?;

        let database_type = match database_config.db_type.as_str() {
            "postgresql" => DatabaseType::PostgreSQL,
            "sqlite" => DatabaseType::SQLite,
            other => {
                return Err(AppError::Configuration(format!(
                    "Unsupported database type: {}",
                    other
                )))
            }
        };

        Ok(
            DatabaseBackendConfig::new(database_type, database_config.url.clone())
                .with_max_connections(database_config.max_connections),
        )
    }
}

//! Typed extension points.
//!
//! Mapping hooks compute a field value from the raw directory entry
//! (`{hook:NAME}` / `{hook:NAME;ARG}` in a mapping expression). Post-processors
//! receive every imported record that carries auxiliary data. Both are looked
//! up by name when a sync context is built, so an unknown name fails before
//! the first entry is touched.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::{DirectoryEntry, FieldValue, LocalRecord, TargetTable};
use crate::utils::first_rdn_value;

pub trait MappingHook: Send + Sync {
    fn resolve(&self, entry: &DirectoryEntry, argument: Option<&str>)
        -> AppResult<Option<FieldValue>>;
}

pub trait PostProcessor: Send + Sync {
    fn process_imported_record(&self, table: TargetTable, record: &LocalRecord) -> AppResult<()>;
}

#[derive(Clone, Default)]
pub struct ExtensionRegistry {
    hooks: HashMap<String, Arc<dyn MappingHook>>,
    post_processors: HashMap<String, Arc<dyn PostProcessor>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the hooks and post-processors shipped with the crate
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_hook("rdn", Arc::new(RdnHook));
        registry.register_hook("lower", Arc::new(LowercaseHook));
        registry.register_post_processor("log", Arc::new(LoggingPostProcessor));
        registry
    }

    pub fn register_hook(&mut self, name: &str, hook: Arc<dyn MappingHook>) {
        self.hooks.insert(name.to_string(), hook);
    }

    pub fn register_post_processor(&mut self, name: &str, processor: Arc<dyn PostProcessor>) {
        self.post_processors.insert(name.to_string(), processor);
    }

    pub fn hook(&self, name: &str) -> AppResult<Arc<dyn MappingHook>> {
        self.hooks
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::Configuration(format!("Unknown mapping hook '{}'", name)))
    }

    pub fn post_processor(&self, name: &str) -> AppResult<Arc<dyn PostProcessor>> {
        self.post_processors.get(name).cloned().ok_or_else(|| {
            AppError::Configuration(format!("Unknown post-processor '{}'", name))
        })
    }

    /// Resolve a list of configured post-processor names, preserving order
    pub fn resolve_post_processors(&self, names: &[String]) -> AppResult<Vec<Arc<dyn PostProcessor>>> {
        names.iter().map(|name| self.post_processor(name)).collect()
    }
}

impl std::fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .field("post_processors", &self.post_processors.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// `{hook:rdn}`: value of the entry's first RDN
struct RdnHook;

impl MappingHook for RdnHook {
    fn resolve(&self, entry: &DirectoryEntry, _argument: Option<&str>) -> AppResult<Option<FieldValue>> {
        Ok(first_rdn_value(&entry.dn).map(FieldValue::Single))
    }
}

/// `{hook:lower;ATTR}`: first value of ATTR, lowercased
struct LowercaseHook;

impl MappingHook for LowercaseHook {
    fn resolve(&self, entry: &DirectoryEntry, argument: Option<&str>) -> AppResult<Option<FieldValue>> {
        let attribute = argument.ok_or_else(|| {
            AppError::Configuration("Hook 'lower' requires an attribute argument".to_string())
        })?;
        Ok(entry
            .get(attribute)
            .and_then(|v| v.first().map(|s| FieldValue::Single(s.to_lowercase()))))
    }
}

/// Emits the auxiliary data of each imported record to the log
struct LoggingPostProcessor;

impl PostProcessor for LoggingPostProcessor {
    fn process_imported_record(&self, table: TargetTable, record: &LocalRecord) -> AppResult<()> {
        let extra = serde_json::to_string(&record.extra)?;
        info!(table = %table, id = record.id, dn = %record.dn, extra = %extra, "Imported record carries auxiliary data");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_names_are_configuration_errors() {
        let registry = ExtensionRegistry::with_builtins();
        assert!(matches!(registry.hook("nope"), Err(AppError::Configuration(_))));
        assert!(matches!(
            registry.resolve_post_processors(&["log".to_string(), "nope".to_string()]),
            Err(AppError::Configuration(_))
        ));
        assert_eq!(
            registry
                .resolve_post_processors(&["log".to_string()])
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_builtin_hooks() {
        let registry = ExtensionRegistry::with_builtins();
        let entry = DirectoryEntry::new("uid=jdoe,ou=people,dc=example,dc=com")
            .with_attribute("mail", ["John.Doe@Example.com"]);

        let rdn = registry.hook("rdn").unwrap().resolve(&entry, None).unwrap();
        assert_eq!(rdn, Some(FieldValue::Single("jdoe".to_string())));

        let lower = registry
            .hook("lower")
            .unwrap()
            .resolve(&entry, Some("mail"))
            .unwrap();
        assert_eq!(lower, Some(FieldValue::Single("john.doe@example.com".to_string())));

        assert!(registry.hook("lower").unwrap().resolve(&entry, None).is_err());
    }
}

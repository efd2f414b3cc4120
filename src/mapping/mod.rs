//! Mapping of directory attributes onto local record fields.
//!
//! A mapping table is compiled once per sync run from the configured
//! `field: expression` pairs and stays immutable afterwards.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::extension::{ExtensionRegistry, MappingHook};
use crate::models::RecordKind;

pub mod parser;
pub mod resolver;

pub use parser::{AttributeModifier, Token};
pub use resolver::{MappingResolver, ResolvedFields};

/// Field receiving the user's login name
pub const USERNAME_FIELD: &str = "username";
/// Field receiving the group's title
pub const TITLE_FIELD: &str = "title";
/// Attribute carrying the directory groups of a user
pub const USER_GROUP_FIELD: &str = "usergroup";
/// Attribute carrying the parent groups of a group
pub const PARENT_GROUP_FIELD: &str = "parent_group";
/// Prefix of auxiliary fields handed to post-processors
pub const AUXILIARY_PREFIX: &str = "__";

/// Bookkeeping fields owned by the reconciler
const RESERVED_FIELDS: &[&str] = &[
    "id",
    "dn",
    "disabled",
    "deleted",
    "memberships",
    "password",
    "admin",
    "configuration_id",
];

/// A compiled `field: expression` pair
#[derive(Debug, Clone)]
pub struct MappingRule {
    pub field: String,
    pub tokens: Vec<Token>,
}

impl MappingRule {
    pub fn compile(field: &str, expression: &str) -> AppResult<Self> {
        Ok(Self {
            field: field.to_string(),
            tokens: parser::parse_expression(expression)?,
        })
    }

    /// Directory attributes referenced by this rule
    pub fn attributes(&self) -> Vec<&str> {
        self.tokens
            .iter()
            .filter_map(|token| match token {
                Token::Attribute { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn uses_hook(&self) -> bool {
        self.tokens.iter().any(|t| matches!(t, Token::Hook { .. }))
    }

    pub fn is_literal(&self) -> bool {
        self.tokens.iter().all(|t| matches!(t, Token::Literal(_)))
    }

    /// The attribute name if the rule is exactly one bare `<attr>` reference
    pub fn single_attribute(&self) -> Option<&str> {
        match self.tokens.as_slice() {
            [Token::Attribute {
                name,
                modifier: AttributeModifier::All,
            }] => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn is_auxiliary(&self) -> bool {
        self.field.starts_with(AUXILIARY_PREFIX)
    }
}

/// Compiled mapping for one record kind
#[derive(Clone)]
pub struct MappingTable {
    kind: RecordKind,
    rules: Vec<MappingRule>,
    relation_attribute: Option<String>,
    hooks: HashMap<String, Arc<dyn MappingHook>>,
}

impl MappingTable {
    /// Compile and validate a configured mapping. Hook names are resolved
    /// against the registry here.
    pub fn compile(
        kind: RecordKind,
        raw: &BTreeMap<String, String>,
        registry: &ExtensionRegistry,
    ) -> AppResult<Self> {
        let relation_field = match kind {
            RecordKind::Users => USER_GROUP_FIELD,
            RecordKind::Groups => PARENT_GROUP_FIELD,
        };

        let mut rules = Vec::new();
        let mut relation_attribute = None;
        let mut hooks = HashMap::new();

        for (field, expression) in raw {
            let field = field.trim();
            if field.is_empty() {
                return Err(AppError::Configuration(
                    "Mapping contains an empty field name".to_string(),
                ));
            }
            if RESERVED_FIELDS.contains(&field) {
                return Err(AppError::Configuration(format!(
                    "Field '{}' is managed by the importer and cannot be mapped",
                    field
                )));
            }

            let rule = MappingRule::compile(field, expression)?;

            if field == relation_field {
                let attribute = rule.single_attribute().ok_or_else(|| {
                    AppError::Configuration(format!(
                        "Field '{}' must reference exactly one attribute, e.g. '<memberOf>'",
                        field
                    ))
                })?;
                relation_attribute = Some(attribute.to_string());
                continue;
            }

            for token in &rule.tokens {
                if let Token::Hook { name, .. } = token {
                    hooks.insert(name.clone(), registry.hook(name)?);
                }
            }
            rules.push(rule);
        }

        Ok(Self {
            kind,
            rules,
            relation_attribute,
            hooks,
        })
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn rules(&self) -> &[MappingRule] {
        &self.rules
    }

    /// Attribute holding directory group DNs (users) or parent group DNs (groups)
    pub fn relation_attribute(&self) -> Option<&str> {
        self.relation_attribute.as_deref()
    }

    /// Field name populating the record's name column
    pub fn name_field(&self) -> &'static str {
        match self.kind {
            RecordKind::Users => USERNAME_FIELD,
            RecordKind::Groups => TITLE_FIELD,
        }
    }

    /// True when a hook needs raw access to every attribute of the entry
    pub fn has_extended_mapping(&self) -> bool {
        self.rules.iter().any(MappingRule::uses_hook)
    }

    /// Attributes to request from the directory, empty meaning "all"
    pub fn ldap_attributes(&self) -> Vec<String> {
        if self.has_extended_mapping() {
            return Vec::new();
        }
        let mut attributes: Vec<String> = Vec::new();
        let referenced = self
            .rules
            .iter()
            .flat_map(|rule| rule.attributes())
            .chain(self.relation_attribute.as_deref());
        for attribute in referenced {
            let lower = attribute.to_lowercase();
            if lower == "dn" {
                continue;
            }
            if !attributes.iter().any(|a| a.to_lowercase() == lower) {
                attributes.push(attribute.to_string());
            }
        }
        if attributes.is_empty() {
            // Asking for no attribute at all would return every attribute
            attributes.push("1.1".to_string());
        }
        attributes
    }

    pub(crate) fn hook(&self, name: &str) -> AppResult<&Arc<dyn MappingHook>> {
        self.hooks
            .get(name)
            .ok_or_else(|| AppError::Configuration(format!("Unknown mapping hook '{}'", name)))
    }
}

impl std::fmt::Debug for MappingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingTable")
            .field("kind", &self.kind)
            .field("rules", &self.rules)
            .field("relation_attribute", &self.relation_attribute)
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .finish()
    }
}

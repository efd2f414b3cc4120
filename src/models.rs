use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

/// Value of a directory attribute. Directories are multi-valued by default,
/// a single value is kept apart so that mapped fields stay scalar when the
/// directory only returned one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Single(String),
    Multi(Vec<String>),
}

impl AttributeValue {
    pub fn from_values(mut values: Vec<String>) -> Self {
        if values.len() == 1 {
            AttributeValue::Single(values.remove(0))
        } else {
            AttributeValue::Multi(values)
        }
    }

    pub fn values(&self) -> Vec<&str> {
        match self {
            AttributeValue::Single(v) => vec![v.as_str()],
            AttributeValue::Multi(values) => values.iter().map(String::as_str).collect(),
        }
    }

    pub fn first(&self) -> Option<&str> {
        match self {
            AttributeValue::Single(v) => Some(v.as_str()),
            AttributeValue::Multi(values) => values.first().map(String::as_str),
        }
    }
}

/// An entry returned by the directory, keyed by its distinguished name.
///
/// Attribute names are compared case-insensitively; they are stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub dn: String,
    attributes: BTreeMap<String, AttributeValue>,
}

impl DirectoryEntry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style helper, mostly used when converting search results
    pub fn with_attribute<I, S>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_attribute(name, values.into_iter().map(Into::into).collect());
        self
    }

    pub fn set_attribute(&mut self, name: &str, values: Vec<String>) {
        if values.is_empty() {
            self.attributes.remove(&name.to_lowercase());
            return;
        }
        self.attributes
            .insert(name.to_lowercase(), AttributeValue::from_values(values));
    }

    /// Look up an attribute. `dn` resolves to the entry DN.
    pub fn get(&self, name: &str) -> Option<AttributeValue> {
        let key = name.to_lowercase();
        if key == "dn" || (key == "distinguishedname" && !self.attributes.contains_key(&key)) {
            return Some(AttributeValue::Single(self.dn.clone()));
        }
        self.attributes.get(&key).cloned()
    }

    pub fn values(&self, name: &str) -> Vec<String> {
        self.get(name)
            .map(|v| v.values().into_iter().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }
}

/// Value of a mapped local field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Single(String),
    Multi(Vec<String>),
}

impl FieldValue {
    pub fn as_text(&self) -> String {
        match self {
            FieldValue::Single(v) => v.clone(),
            FieldValue::Multi(values) => values.first().cloned().unwrap_or_default(),
        }
    }

    pub fn values(&self) -> Vec<String> {
        match self {
            FieldValue::Single(v) => vec![v.clone()],
            FieldValue::Multi(values) => values.clone(),
        }
    }
}

impl From<AttributeValue> for FieldValue {
    fn from(value: AttributeValue) -> Self {
        match value {
            AttributeValue::Single(v) => FieldValue::Single(v),
            AttributeValue::Multi(values) => FieldValue::Multi(values),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Users,
    Groups,
}

/// Which side of the local application the records belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[serde(alias = "be")]
    Backend,
    #[serde(alias = "fe")]
    Frontend,
}

impl Mode {
    pub fn prefix(&self) -> &'static str {
        match self {
            Mode::Backend => "be",
            Mode::Frontend => "fe",
        }
    }
}

impl FromStr for Mode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "be" | "backend" => Ok(Mode::Backend),
            "fe" | "frontend" => Ok(Mode::Frontend),
            other => Err(AppError::Configuration(format!("Unknown mode: {}", other))),
        }
    }
}

impl FromStr for RecordKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "users" | "user" => Ok(RecordKind::Users),
            "groups" | "group" => Ok(RecordKind::Groups),
            other => Err(AppError::Configuration(format!(
                "Unknown record kind: {}",
                other
            ))),
        }
    }
}

/// Identity of a local table: `be_users`, `be_groups`, `fe_users`, `fe_groups`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetTable {
    pub mode: Mode,
    pub kind: RecordKind,
}

impl TargetTable {
    pub fn new(mode: Mode, kind: RecordKind) -> Self {
        Self { mode, kind }
    }

    pub fn users(mode: Mode) -> Self {
        Self::new(mode, RecordKind::Users)
    }

    pub fn groups(mode: Mode) -> Self {
        Self::new(mode, RecordKind::Groups)
    }

    /// Group table belonging to the same mode
    pub fn group_table(&self) -> Self {
        Self::groups(self.mode)
    }

    pub fn name(&self) -> String {
        let suffix = match self.kind {
            RecordKind::Users => "users",
            RecordKind::Groups => "groups",
        };
        format!("{}_{}", self.mode.prefix(), suffix)
    }

    pub fn all() -> [TargetTable; 4] {
        [
            TargetTable::users(Mode::Backend),
            TargetTable::groups(Mode::Backend),
            TargetTable::users(Mode::Frontend),
            TargetTable::groups(Mode::Frontend),
        ]
    }
}

impl fmt::Display for TargetTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// A local user or group row.
///
/// `id == 0` means the record has never been persisted. `memberships` holds
/// the user's group ids or the group's subgroup ids. `extra` carries
/// auxiliary data for post-processors and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalRecord {
    pub id: i64,
    pub kind: RecordKind,
    pub configuration_id: u32,
    pub dn: String,
    pub name: String,
    pub password: Option<String>,
    pub admin: bool,
    pub disabled: bool,
    pub deleted: bool,
    pub memberships: Vec<i64>,
    pub fields: BTreeMap<String, FieldValue>,
    #[serde(skip)]
    pub extra: BTreeMap<String, FieldValue>,
}

impl LocalRecord {
    /// A record that does not exist locally yet
    pub fn blank(kind: RecordKind, configuration_id: u32) -> Self {
        Self {
            id: 0,
            kind,
            configuration_id,
            dn: String::new(),
            name: String::new(),
            password: None,
            admin: false,
            disabled: false,
            deleted: false,
            memberships: Vec::new(),
            fields: BTreeMap::new(),
            extra: BTreeMap::new(),
        }
    }

    pub fn is_new(&self) -> bool {
        self.id == 0
    }

    /// Append an id to the membership list unless already present
    pub fn add_membership(&mut self, id: i64) -> bool {
        if self.memberships.contains(&id) {
            return false;
        }
        self.memberships.push(id);
        true
    }
}

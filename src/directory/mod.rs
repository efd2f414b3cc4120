use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::DirectoryEntry;

pub mod filter;
pub mod ldap;
pub mod page_source;

pub use ldap::LdapDirectory;
pub use page_source::{DirectoryPage, DirectoryPageSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// Only the entry named by the base DN
    Base,
    /// The base DN and everything below it
    Subtree,
}

/// A search against the directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub base_dn: String,
    pub scope: SearchScope,
    pub filter: String,
    /// Attributes to return, empty meaning all attributes
    pub attributes: Vec<String>,
    pub first_entry_only: bool,
    /// Server-side size limit, 0 meaning none
    pub size_limit: i32,
    /// Paged searches keep a continuation cursor that `resume` continues from.
    /// Lookups that are not paged never touch that cursor.
    pub paginate: bool,
}

impl SearchRequest {
    pub fn paged(base_dn: &str, filter: &str, attributes: Vec<String>) -> Self {
        Self {
            base_dn: base_dn.to_string(),
            scope: SearchScope::Subtree,
            filter: filter.to_string(),
            attributes,
            first_entry_only: false,
            size_limit: 0,
            paginate: true,
        }
    }

    pub fn subtree(base_dn: &str, filter: &str, attributes: Vec<String>) -> Self {
        Self {
            paginate: false,
            ..Self::paged(base_dn, filter, attributes)
        }
    }

    /// Lookup of the single entry named by `dn`
    pub fn entry(dn: &str, filter: &str, attributes: Vec<String>) -> Self {
        Self {
            base_dn: dn.to_string(),
            scope: SearchScope::Base,
            filter: filter.to_string(),
            attributes,
            first_entry_only: true,
            size_limit: 1,
            paginate: false,
        }
    }
}

/// Entries of one search call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
    pub entries: Vec<DirectoryEntry>,
    /// The server holds more results for the current paged search
    pub is_partial: bool,
}

/// External directory client.
///
/// Any connection or search failure must surface as
/// `AppError::DirectoryUnavailable`.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    async fn connect(&self) -> AppResult<()>;

    /// Run a search. With `resume` set the last paged search continues from
    /// its cursor instead of starting over.
    async fn search(&self, request: &SearchRequest, resume: bool) -> AppResult<SearchPage>;

    async fn disconnect(&self) -> AppResult<()>;
}

use std::sync::Arc;

use tracing::{debug, info};

use super::filter::{normalize_filter, replace_filter_markers};
use super::{DirectoryClient, SearchRequest};
use crate::error::AppResult;
use crate::models::DirectoryEntry;
use crate::reconcile::SyncContext;

/// One page of the import search
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryPage {
    pub entries: Vec<DirectoryEntry>,
    pub has_more: bool,
}

/// Resumable, paginated view of the directory for one sync context.
///
/// The paging cursor itself lives in the client; this type only decides what
/// to search for and turns the client's partial flag into `has_more`.
#[derive(Clone)]
pub struct DirectoryPageSource {
    client: Arc<dyn DirectoryClient>,
}

impl DirectoryPageSource {
    pub fn new(client: Arc<dyn DirectoryClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<dyn DirectoryClient> {
        &self.client
    }

    /// Search request for the import of the context's target table
    pub fn import_request(context: &SyncContext) -> SearchRequest {
        let filter = normalize_filter(&replace_filter_markers(&context.search.filter));
        SearchRequest::paged(
            &context.search.basedn,
            &filter,
            context.mapping.ldap_attributes(),
        )
    }

    pub async fn fetch(&self, context: &SyncContext, resume: bool) -> AppResult<DirectoryPage> {
        if context.search.basedn.trim().is_empty() {
            debug!(table = %context.table, "No base DN configured, nothing to fetch");
            return Ok(DirectoryPage::default());
        }

        let request = Self::import_request(context);
        let page = self.client.search(&request, resume).await?;

        info!(
            table = %context.table,
            entries = page.entries.len(),
            has_more = page.is_partial,
            resume,
            "Fetched directory page"
        );

        Ok(DirectoryPage {
            entries: page.entries,
            has_more: page.is_partial,
        })
    }
}

impl std::fmt::Debug for DirectoryPageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryPageSource").finish_non_exhaustive()
    }
}

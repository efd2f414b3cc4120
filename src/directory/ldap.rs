//! `ldap3`-backed directory client with RFC 2696 paged searches

use async_trait::async_trait;
use ldap3::controls::{Control, ControlType, PagedResults};
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry, SearchOptions};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use super::{DirectoryClient, SearchPage, SearchRequest, SearchScope};
use crate::config::DirectoryConfig;
use crate::error::{AppError, AppResult};
use crate::models::DirectoryEntry;

/// Result code returned when the size limit cut the result set short
const RC_SIZE_LIMIT_EXCEEDED: u32 = 4;
/// Result code returned when the base DN does not exist
const RC_NO_SUCH_OBJECT: u32 = 32;

pub struct LdapDirectory {
    config: DirectoryConfig,
    /// Cached connection, created on first use
    connection: RwLock<Option<Ldap>>,
    /// Cookie of the current paged search; `None` when no page is pending
    cursor: Mutex<Option<Vec<u8>>>,
}

impl LdapDirectory {
    pub fn new(config: DirectoryConfig) -> Self {
        Self {
            config,
            connection: RwLock::new(None),
            cursor: Mutex::new(None),
        }
    }

    async fn get_connection(&self) -> AppResult<Ldap> {
        {
            let guard = self.connection.read().await;
            if let Some(ref ldap) = *guard {
                return Ok(ldap.clone());
            }
        }

        let ldap = self.create_connection().await?;
        let mut guard = self.connection.write().await;
        *guard = Some(ldap.clone());
        Ok(ldap)
    }

    async fn create_connection(&self) -> AppResult<Ldap> {
        debug!(url = %self.config.url, "Connecting to directory");

        let settings = LdapConnSettings::new()
            .set_conn_timeout(Duration::from_secs(self.config.timeout_secs))
            .set_starttls(self.config.starttls);

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &self.config.url)
            .await
            .map_err(|e| {
                AppError::DirectoryUnavailable(format!(
                    "Failed to connect to {}: {}",
                    self.config.url, e
                ))
            })?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "Directory connection driver error");
            }
        });

        if !self.config.bind_dn.is_empty() {
            let password = self.config.bind_password.as_deref().unwrap_or("");
            ldap.simple_bind(&self.config.bind_dn, password)
                .await
                .and_then(|result| result.success())
                .map_err(|e| {
                    AppError::DirectoryUnavailable(format!(
                        "Bind failed for {}: {}",
                        self.config.bind_dn, e
                    ))
                })?;
        }

        info!(url = %self.config.url, "Directory connection established");
        Ok(ldap)
    }

    fn scope(scope: SearchScope) -> Scope {
        match scope {
            SearchScope::Base => Scope::Base,
            SearchScope::Subtree => Scope::Subtree,
        }
    }

    fn attributes(request: &SearchRequest) -> Vec<String> {
        if request.attributes.is_empty() {
            vec!["*".to_string()]
        } else {
            request.attributes.clone()
        }
    }

    fn paged_cookie(ctrls: &[Control]) -> Vec<u8> {
        ctrls
            .iter()
            .find_map(|Control(kind, raw)| match kind {
                Some(ControlType::PagedResults) => Some(raw.parse::<PagedResults>().cookie),
                _ => None,
            })
            .unwrap_or_default()
    }
}

/// Convert a raw search entry, keeping only textual attributes
pub fn entry_from_search(entry: SearchEntry) -> DirectoryEntry {
    let mut converted = DirectoryEntry::new(entry.dn);
    for (name, values) in entry.attrs {
        converted.set_attribute(&name, values);
    }
    converted
}

#[async_trait]
impl DirectoryClient for LdapDirectory {
    async fn connect(&self) -> AppResult<()> {
        self.get_connection().await.map(|_| ())
    }

    #[instrument(skip(self, request), fields(base_dn = %request.base_dn, filter = %request.filter, resume))]
    async fn search(&self, request: &SearchRequest, resume: bool) -> AppResult<SearchPage> {
        let mut ldap = self.get_connection().await?;
        let paged = request.paginate && self.config.page_size > 0;

        let mut options = SearchOptions::new();
        if request.size_limit > 0 {
            options = options.sizelimit(request.size_limit);
        }
        ldap.with_search_options(options);

        let mut cursor = self.cursor.lock().await;
        if paged {
            let cookie = if resume {
                match cursor.take() {
                    Some(cookie) => cookie,
                    // Nothing left to resume
                    None => return Ok(SearchPage::default()),
                }
            } else {
                Vec::new()
            };
            ldap.with_controls(PagedResults {
                size: self.config.page_size,
                cookie,
            });
        }

        let result = ldap
            .search(
                &request.base_dn,
                Self::scope(request.scope),
                &request.filter,
                Self::attributes(request),
            )
            .await
            .map_err(|e| AppError::DirectoryUnavailable(format!("Search failed: {}", e)))?;

        let ldap3::SearchResult(raw_entries, status) = result;
        match status.rc {
            0 | RC_SIZE_LIMIT_EXCEEDED => {}
            RC_NO_SUCH_OBJECT if request.scope == SearchScope::Base => {
                return Ok(SearchPage::default());
            }
            rc => {
                *cursor = None;
                return Err(AppError::DirectoryUnavailable(format!(
                    "Search on {} failed with code {}: {}",
                    request.base_dn, rc, status.text
                )));
            }
        }

        let mut is_partial = false;
        if paged {
            let cookie = Self::paged_cookie(&status.ctrls);
            is_partial = !cookie.is_empty();
            *cursor = if is_partial { Some(cookie) } else { None };
        }

        let mut entries: Vec<DirectoryEntry> = raw_entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(entry_from_search)
            .collect();
        if request.first_entry_only {
            entries.truncate(1);
        }

        debug!(returned = entries.len(), is_partial, "Directory search completed");
        Ok(SearchPage {
            entries,
            is_partial,
        })
    }

    async fn disconnect(&self) -> AppResult<()> {
        *self.cursor.lock().await = None;
        let connection = self.connection.write().await.take();
        if let Some(mut ldap) = connection {
            ldap.unbind()
                .await
                .map_err(|e| AppError::DirectoryUnavailable(format!("Unbind failed: {}", e)))?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for LdapDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapDirectory")
            .field("url", &self.config.url)
            .field("bind_dn", &self.config.bind_dn)
            .field("page_size", &self.config.page_size)
            .finish()
    }
}

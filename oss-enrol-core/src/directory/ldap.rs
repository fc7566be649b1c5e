//! LDAP-backed directory client.
//!
//! One connection per run: [`LdapDirectory::connect`] binds, every search
//! reuses the connection, and dropping the value unbinds.

use std::time::Duration;

use ldap3::{LdapConn, LdapConnSettings, Scope, SearchEntry, SearchResult};
use tracing::{debug, info, warn};

use super::{DirectoryClient, DirectoryEntry};
use crate::config::DirectoryConfig;
use crate::error::{Error, Result};

/// LDAP result code for "noSuchObject"
const RC_NO_SUCH_OBJECT: u32 = 32;
/// LDAP result code for "invalidCredentials"
const RC_INVALID_CREDENTIALS: u32 = 49;

/// A bound LDAP connection scoped to one run.
pub struct LdapDirectory {
    conn: LdapConn,
    url: String,
}

impl LdapDirectory {
    /// Connect and bind using the directory configuration.
    pub fn connect(config: &DirectoryConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let settings = LdapConnSettings::new()
            .set_conn_timeout(timeout)
            .set_starttls(config.starttls);

        debug!("Connecting to LDAP server at {}", config.url);
        let mut conn = LdapConn::with_settings(settings, &config.url)
            .map_err(|e| Error::DirectoryUnreachable(format!("{}: {}", config.url, e)))?;
        conn.with_timeout(timeout);

        if !config.bind_dn.is_empty() {
            let password = config.bind_password.as_deref().unwrap_or("");
            let result = conn
                .simple_bind(&config.bind_dn, password)
                .map_err(|e| Error::DirectoryUnreachable(format!("{}: {}", config.url, e)))?;
            if result.rc != 0 {
                let message = if result.rc == RC_INVALID_CREDENTIALS {
                    "invalid credentials".to_string()
                } else {
                    format!("code {}: {}", result.rc, result.text)
                };
                return Err(Error::DirectoryBind {
                    dn: config.bind_dn.clone(),
                    message,
                });
            }
            debug!("Bound as {}", config.bind_dn);
        }

        info!("Connected to directory {}", config.url);
        Ok(Self {
            conn,
            url: config.url.clone(),
        })
    }
}

impl DirectoryClient for LdapDirectory {
    fn search(&mut self, filter: &str, contexts: &[String], attrs: &[&str]) -> Result<Vec<DirectoryEntry>> {
        let mut entries = Vec::new();

        for base in contexts.iter().map(|c| c.trim()).filter(|c| !c.is_empty()) {
            let SearchResult(result_entries, result) = self
                .conn
                .search(base, Scope::Subtree, filter, attrs.to_vec())
                .map_err(|e| Error::DirectoryUnreachable(format!("{}: {}", self.url, e)))?;

            if result.rc == RC_NO_SUCH_OBJECT {
                warn!("Search base {} does not exist on {}", base, self.url);
                continue;
            }
            if result.rc != 0 {
                return Err(Error::DirectoryUnreachable(format!(
                    "search in {} failed with code {}: {}",
                    base, result.rc, result.text
                )));
            }

            // referrals are not followed
            for raw in result_entries.into_iter().filter(|e| !e.is_ref()) {
                let entry = SearchEntry::construct(raw);
                entries.push(DirectoryEntry {
                    dn: entry.dn,
                    attrs: entry.attrs,
                });
            }
        }

        debug!("Search {} returned {} entries", filter, entries.len());
        Ok(entries)
    }
}

impl Drop for LdapDirectory {
    fn drop(&mut self) {
        if let Err(e) = self.conn.unbind() {
            debug!("Unbind from {} failed: {}", self.url, e);
        }
    }
}

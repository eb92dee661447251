//! Lazily-established, cached LDAP session.

use std::sync::Arc;
use std::time::Duration;

use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, Scope, SearchEntry};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use reporting_connector::error::{ConnectorError, ConnectorResult};
use reporting_core::{RetryConfig, RetryExecutor};

use crate::config::LdapConnection;

/// LDAP result code for `noSuchObject`.
const RC_NO_SUCH_OBJECT: u32 = 32;

/// LDAP result code for `invalidCredentials`.
const RC_INVALID_CREDENTIALS: u32 = 49;

/// A bound LDAP handle shared by all lookups of one directory.
///
/// The first search connects and binds (retried with backoff); later
/// searches reuse the handle. A failed search drops the cached handle so the
/// next call reconnects.
pub struct LdapSession {
    connection: LdapConnection,
    cached: Arc<RwLock<Option<Ldap>>>,
    retry: RetryExecutor,
}

impl LdapSession {
    /// Create a session that connects on first use.
    pub fn new(connection: LdapConnection) -> ConnectorResult<Self> {
        connection.validate()?;
        Ok(Self {
            connection,
            cached: Arc::new(RwLock::new(None)),
            retry: RetryExecutor::new(RetryConfig::default()),
        })
    }

    /// Override the retry policy used for connect and bind.
    #[must_use]
    pub fn with_retry(mut self, config: RetryConfig) -> Self {
        self.retry = RetryExecutor::new(config);
        self
    }

    /// Connection parameters of this session.
    pub fn connection(&self) -> &LdapConnection {
        &self.connection
    }

    async fn handle(&self) -> ConnectorResult<Ldap> {
        {
            let guard = self.cached.read().await;
            if let Some(ref ldap) = *guard {
                return Ok(ldap.clone());
            }
        }

        let ldap = self
            .retry
            .execute("ldap bind", || self.connect())
            .await?;

        let mut guard = self.cached.write().await;
        *guard = Some(ldap.clone());
        Ok(ldap)
    }

    async fn connect(&self) -> ConnectorResult<Ldap> {
        let url = self.connection.url();
        debug!(url = %url, "Connecting to LDAP server");

        let settings = LdapConnSettings::new()
            .set_conn_timeout(Duration::from_secs(
                self.connection.connection_timeout_secs,
            ))
            .set_no_tls_verify(self.connection.skip_tls_verify);

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &url)
            .await
            .map_err(|e| {
                ConnectorError::connection_failed_with_source(
                    format!("Failed to connect to LDAP server at {url}"),
                    e,
                )
            })?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "LDAP connection driver error");
            }
        });

        let bind_dn = &self.connection.bind_dn;
        let bind_password = self.connection.bind_password.as_deref().unwrap_or("");

        let result = ldap
            .simple_bind(bind_dn, bind_password)
            .await
            .map_err(|e| {
                ConnectorError::connection_failed_with_source(
                    format!("LDAP bind failed for {bind_dn}"),
                    e,
                )
            })?;

        if result.rc != 0 {
            if result.rc == RC_INVALID_CREDENTIALS {
                return Err(ConnectorError::AuthenticationFailed);
            }
            return Err(ConnectorError::connection_failed(format!(
                "LDAP bind failed with code {}: {}",
                result.rc, result.text
            )));
        }

        info!(url = %url, "LDAP connection established");
        Ok(ldap)
    }

    async fn invalidate(&self) {
        let mut guard = self.cached.write().await;
        *guard = None;
    }

    /// Subtree search returning constructed entries.
    ///
    /// A missing base (`noSuchObject`) yields no entries.
    pub async fn search(
        &self,
        base: &str,
        filter: &str,
        attributes: &[String],
    ) -> ConnectorResult<Vec<SearchEntry>> {
        let mut ldap = self.handle().await?;

        let result = match ldap
            .search(base, Scope::Subtree, filter, attributes.to_vec())
            .await
        {
            Ok(result) => result,
            Err(e) => {
                self.invalidate().await;
                return Err(ConnectorError::network_with_source(
                    format!("LDAP search under {base} failed"),
                    e,
                ));
            }
        };

        match result.success() {
            Ok((entries, _)) => Ok(entries.into_iter().map(SearchEntry::construct).collect()),
            Err(LdapError::LdapResult { result }) if result.rc == RC_NO_SUCH_OBJECT => {
                debug!(base = %base, "Search base does not exist");
                Ok(Vec::new())
            }
            Err(e) => Err(ConnectorError::query_failed_with_source(
                format!("LDAP search under {base} was rejected"),
                e,
            )),
        }
    }
}

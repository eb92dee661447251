//! Salesforce REST client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use reporting_connector::crm::{CrmSource, OpportunityRecord};
use reporting_connector::error::{ConnectorError, ConnectorResult};
use reporting_core::RetryExecutor;

use crate::config::{CrmAuth, CrmConfig};
use crate::soql;

const JWT_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 180;

#[derive(Debug, Clone)]
struct CrmSession {
    instance_url: String,
    access_token: String,
}

#[derive(Debug, Serialize)]
struct JwtBearerClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    aud: &'a str,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    instance_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse<T> {
    #[serde(default = "Vec::new")]
    records: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(rename = "errorCode", default)]
    error_code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OpportunityRow {
    id: String,
    name: Option<String>,
    account_id: Option<String>,
    owner_id: Option<String>,
    #[serde(rename = "Type")]
    opportunity_type: Option<String>,
    is_closed: Option<bool>,
    close_date: Option<NaiveDate>,
    stage_name: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    amount: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    expected_revenue: Option<Decimal>,
    #[serde(rename = "OpportunityNumber__c")]
    number: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OwnerRow {
    name: Option<String>,
    email: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AccountRow {
    name: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl OpportunityRow {
    fn into_record(self, account_name: Option<String>, owner: OwnerRow) -> OpportunityRecord {
        OpportunityRecord {
            opportunity_id: self.id,
            number: non_empty(self.number),
            name: non_empty(self.name),
            account_id: non_empty(self.account_id),
            account_name: non_empty(account_name),
            amount: self.amount,
            closed_at: self.close_date,
            expected_revenue: self.expected_revenue,
            is_closed: self.is_closed,
            owner_id: non_empty(self.owner_id),
            owner_name: non_empty(owner.name),
            owner_email: non_empty(owner.email),
            owner_title: non_empty(owner.title),
            stage: non_empty(self.stage_name),
            opportunity_type: non_empty(self.opportunity_type),
        }
    }
}

/// Salesforce client resolving opportunities with their owner and account.
pub struct SalesforceCrm {
    config: CrmConfig,
    client: Client,
    session: Arc<RwLock<Option<CrmSession>>>,
    retry: RetryExecutor,
}

impl SalesforceCrm {
    /// Create a client; the API session is established on first query.
    pub fn new(config: CrmConfig) -> ConnectorResult<Self> {
        config.validate()?;
        let client = Self::build_client(&config)?;
        let retry = RetryExecutor::new(config.retry.clone());

        Ok(Self {
            config,
            client,
            session: Arc::new(RwLock::new(None)),
            retry,
        })
    }

    fn build_client(config: &CrmConfig) -> ConnectorResult<Client> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(config.read_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connection_timeout_secs));

        if !config.verify_certificate {
            builder = builder.danger_accept_invalid_certs(true);
        }

        builder.build().map_err(|e| {
            ConnectorError::invalid_configuration(format!("Failed to build HTTP client: {e}"))
        })
    }

    async fn current_session(&self) -> ConnectorResult<CrmSession> {
        {
            let guard = self.session.read().await;
            if let Some(ref session) = *guard {
                return Ok(session.clone());
            }
        }

        let session = self
            .retry
            .execute("salesforce session", || self.establish_session())
            .await?;

        let mut guard = self.session.write().await;
        *guard = Some(session.clone());
        Ok(session)
    }

    async fn invalidate_session(&self) {
        let mut guard = self.session.write().await;
        *guard = None;
    }

    async fn establish_session(&self) -> ConnectorResult<CrmSession> {
        let instance_url = CrmConfig::normalize_url(&self.config.instance_url);

        let (consumer_key, username, private_key_pem) = match &self.config.auth {
            CrmAuth::SessionToken { access_token } => {
                return Ok(CrmSession {
                    instance_url,
                    access_token: access_token.clone(),
                });
            }
            CrmAuth::JwtBearer {
                consumer_key,
                username,
                private_key_pem,
            } => (consumer_key, username, private_key_pem),
        };

        let login_url = CrmConfig::normalize_url(&self.config.login_url);
        let assertion = self.sign_assertion(consumer_key, username, &login_url, private_key_pem)?;

        debug!(login_url = %login_url, "Requesting Salesforce access token");

        let response = self
            .client
            .post(format!("{login_url}/services/oauth2/token"))
            .form(&[("grant_type", JWT_GRANT_TYPE), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| ConnectorError::network_with_source("Salesforce token request failed", e))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ConnectorError::TargetUnavailable {
                message: format!("Salesforce token endpoint returned {status}"),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Salesforce rejected the JWT assertion");
            return Err(ConnectorError::AuthenticationFailed);
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            ConnectorError::connection_failed_with_source("Failed to parse token response", e)
        })?;

        let instance_url = token
            .instance_url
            .as_deref()
            .map(CrmConfig::normalize_url)
            .unwrap_or(instance_url);

        info!(instance_url = %instance_url, "Salesforce session established");

        Ok(CrmSession {
            instance_url,
            access_token: token.access_token,
        })
    }

    fn sign_assertion(
        &self,
        consumer_key: &str,
        username: &str,
        audience: &str,
        private_key_pem: &str,
    ) -> ConnectorResult<String> {
        let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes()).map_err(|e| {
            ConnectorError::invalid_configuration(format!("Invalid private key: {e}"))
        })?;

        let claims = JwtBearerClaims {
            iss: consumer_key,
            sub: username,
            aud: audience,
            exp: Utc::now().timestamp() + ASSERTION_LIFETIME_SECS,
        };

        encode(&Header::new(Algorithm::RS256), &claims, &key).map_err(|e| {
            ConnectorError::invalid_configuration(format!("Failed to sign assertion: {e}"))
        })
    }

    /// Run a SOQL query and return its records.
    ///
    /// A query Salesforce rejects as malformed (e.g. an id of the wrong shape)
    /// matches nothing.
    async fn query<T: DeserializeOwned>(&self, soql: &str) -> ConnectorResult<Vec<T>> {
        let mut reauthenticated = false;

        loop {
            let session = self.current_session().await?;
            let url = format!(
                "{}/services/data/{}/query",
                session.instance_url, self.config.api_version
            );

            debug!(soql = %soql, "Running SOQL query");

            let response = self
                .client
                .get(&url)
                .bearer_auth(&session.access_token)
                .query(&[("q", soql)])
                .send()
                .await
                .map_err(|e| ConnectorError::network_with_source("Salesforce query failed", e))?;

            let status = response.status();

            if status == StatusCode::UNAUTHORIZED {
                self.invalidate_session().await;
                let refreshable = matches!(self.config.auth, CrmAuth::JwtBearer { .. });
                if refreshable && !reauthenticated {
                    reauthenticated = true;
                    debug!("Salesforce session expired, re-authenticating");
                    continue;
                }
                return Err(ConnectorError::AuthenticationFailed);
            }

            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                return Err(ConnectorError::TargetUnavailable {
                    message: format!("Salesforce returned {status}"),
                });
            }

            if status == StatusCode::BAD_REQUEST {
                let errors: Vec<ApiError> = response.json().await.unwrap_or_default();
                let (code, message) = errors
                    .first()
                    .map(|e| (e.error_code.as_str(), e.message.as_str()))
                    .unwrap_or(("UNKNOWN", ""));
                warn!(error_code = %code, message = %message, "Salesforce rejected query");
                return Ok(Vec::new());
            }

            if !status.is_success() {
                return Err(ConnectorError::query_failed(format!(
                    "Salesforce query returned {status}"
                )));
            }

            let body: QueryResponse<T> = response.json().await.map_err(|e| {
                ConnectorError::InvalidData {
                    message: format!("Failed to parse query response: {e}"),
                }
            })?;

            return Ok(body.records);
        }
    }

    async fn first<T: DeserializeOwned>(&self, soql: &str) -> ConnectorResult<Option<T>> {
        Ok(self.query::<T>(soql).await?.into_iter().next())
    }

    async fn resolve(&self, soql: &str) -> ConnectorResult<Option<OpportunityRecord>> {
        let Some(row) = self.first::<OpportunityRow>(soql).await? else {
            return Ok(None);
        };

        let account_name = match row.account_id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => self
                .first::<AccountRow>(&soql::account_by_id(id))
                .await?
                .and_then(|a| a.name),
            None => None,
        };

        let owner = match row.owner_id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => self
                .first::<OwnerRow>(&soql::owner_by_id(id))
                .await?
                .unwrap_or_default(),
            None => OwnerRow::default(),
        };

        Ok(Some(row.into_record(account_name, owner)))
    }
}

#[async_trait]
impl CrmSource for SalesforceCrm {
    #[instrument(skip(self))]
    async fn opportunity_by_number(
        &self,
        number: &str,
    ) -> ConnectorResult<Option<OpportunityRecord>> {
        self.resolve(&soql::opportunity_by_number(number)).await
    }

    #[instrument(skip(self))]
    async fn opportunity_by_id(&self, id: &str) -> ConnectorResult<Option<OpportunityRecord>> {
        self.resolve(&soql::opportunity_by_id(id)).await
    }
}

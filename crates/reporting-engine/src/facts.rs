//! Provision attributes read off a subject.

use chrono::{DateTime, Utc};
use reporting_db::models::{RESULT_FAILURE, RESULT_SUCCESS};

use crate::cache::WatchCache;
use crate::config::ApiDomains;
use crate::error::{EngineError, EngineResult};
use crate::event::{AnarchySubject, ResourceState};

pub const DEFAULT_ACCOUNT: &str = "tests";
pub const DEFAULT_CLOUD: &str = "unknown";
pub const DEFAULT_ENVIRONMENT: &str = "DEV";

/// Everything a provision row and its dimensions are built from.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionFacts {
    pub uuid: String,
    pub current_state: String,
    pub username: Option<String>,
    pub catalog_item: String,
    pub catalog_name: String,
    pub class_name: String,
    pub account: String,
    pub sandbox_name: Option<String>,
    pub cloud: String,
    pub cloud_region: Option<String>,
    pub environment: String,
    pub workshop_users: Option<i32>,
    pub opportunity: Option<String>,
    pub purpose: Option<String>,
    pub chargeback_method: Option<String>,
    pub babylon_guid: Option<String>,
    pub provisioned_at: DateTime<Utc>,
}

impl ProvisionFacts {
    pub fn provision_result(&self) -> &'static str {
        if self.current_state == ResourceState::ProvisionFailed.as_str() {
            RESULT_FAILURE
        } else {
            RESULT_SUCCESS
        }
    }
}

/// Maps subject fields onto provision attributes.
#[derive(Debug, Clone, Default)]
pub struct FactExtractor {
    domains: ApiDomains,
}

impl FactExtractor {
    pub fn new(domains: ApiDomains) -> Self {
        Self { domains }
    }

    pub fn domains(&self) -> &ApiDomains {
        &self.domains
    }

    /// Namespace of the claim that owns the subject, if any.
    pub fn claim_namespace<'a>(&self, subject: &'a AnarchySubject) -> Option<&'a str> {
        subject.annotation(&self.domains.poolboy_key("resource-claim-namespace"))
    }

    pub fn claim_name<'a>(&self, subject: &'a AnarchySubject) -> Option<&'a str> {
        subject.annotation(&self.domains.poolboy_key("resource-claim-name"))
    }

    pub fn resource_uuid(&self, subject: &AnarchySubject) -> Option<String> {
        subject
            .job_var("uuid")
            .or_else(|| {
                subject
                    .annotation(&self.domains.poolboy_key("resource-handle-uid"))
                    .map(str::to_string)
            })
            .or_else(|| subject.metadata.uid.clone())
    }

    /// Requester username, from the subject or its claim namespace.
    pub async fn username(&self, subject: &AnarchySubject, cache: &WatchCache) -> Option<String> {
        let direct = subject
            .annotation(&self.domains.poolboy_key("resource-requester-preferred-username"))
            .map(str::to_string);
        if direct.is_some() {
            return direct;
        }
        match self.claim_namespace(subject) {
            Some(ns) => cache.namespace_requester(ns).await,
            None => None,
        }
    }

    async fn catalog_name(&self, subject: &AnarchySubject, cache: &WatchCache) -> Option<String> {
        let (Some(ns), Some(name)) = (self.claim_namespace(subject), self.claim_name(subject))
        else {
            return None;
        };
        let claim = cache.claim(ns, name).await?;
        claim
            .metadata
            .annotation(&self.domains.babylon_key("catalogDisplayName"))
            .or_else(|| {
                claim
                    .metadata
                    .label(&self.domains.babylon_key("catalogItemName"))
            })
            .map(str::to_string)
    }

    /// Read every provision attribute.
    ///
    /// Fails when the subject has no uuid, state or governor.
    pub async fn extract(
        &self,
        subject: &AnarchySubject,
        cache: &WatchCache,
    ) -> EngineResult<ProvisionFacts> {
        let uuid = self
            .resource_uuid(subject)
            .ok_or_else(|| EngineError::invalid("subject has no resource uuid"))?;
        let current_state = subject
            .current_state()
            .ok_or_else(|| EngineError::invalid("subject has no current_state"))?
            .to_string();
        let catalog_item = subject
            .governor()
            .ok_or_else(|| EngineError::invalid("subject has no governor"))?
            .to_string();

        let catalog_name = self
            .catalog_name(subject, cache)
            .await
            .unwrap_or_else(|| catalog_item.clone());
        let class_name = subject
            .job_var("class_name")
            .unwrap_or_else(|| catalog_item.clone());
        let account = subject
            .job_var("sandbox_account")
            .or_else(|| subject.provision_data("ibm_sandbox_account"))
            .unwrap_or_else(|| DEFAULT_ACCOUNT.to_string());
        let sandbox_name = subject
            .job_var("sandbox_name")
            .or_else(|| subject.provision_data("ibm_sandbox_name"));
        let cloud = normalize_cloud(subject.job_var("cloud_provider").as_deref());
        let cloud_region = subject
            .job_var("aws_region")
            .or_else(|| subject.job_var("region"));
        let environment = subject
            .job_var("environment")
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string())
            .to_uppercase();
        let provisioned_at = subject
            .provision_job()
            .and_then(|job| job.start_timestamp)
            .unwrap_or_else(Utc::now);

        Ok(ProvisionFacts {
            uuid,
            current_state,
            username: self.username(subject, cache).await,
            catalog_item,
            catalog_name,
            class_name,
            account,
            sandbox_name,
            cloud,
            cloud_region,
            environment,
            workshop_users: subject.job_var_i32("num_users"),
            opportunity: opportunity_reference(subject.job_var("salesforce_id")),
            purpose: subject.job_var("purpose"),
            chargeback_method: subject.job_var("chargeback_method"),
            babylon_guid: subject.job_var("guid"),
            provisioned_at,
        })
    }
}

pub fn normalize_cloud(provider: Option<&str>) -> String {
    match provider.map(str::trim) {
        Some("ec2") => "aws".to_string(),
        Some("osp") => "openstack".to_string(),
        Some(other) if !other.is_empty() => other.to_string(),
        _ => DEFAULT_CLOUD.to_string(),
    }
}

/// Placeholder values the catalog fills in when no opportunity was given.
fn opportunity_reference(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.eq_ignore_ascii_case("default") && !v.eq_ignore_ascii_case("null"))
}

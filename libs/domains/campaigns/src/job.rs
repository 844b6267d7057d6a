//! Job payloads carried on the dispatch queue.

use crate::error::CampaignResult;
use crate::models::Recipient;
use crate::transport::ProviderConfig;
use job_queue::QueueDef;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub const CAMPAIGN_JOB_NAME: &str = "send-campaign";
pub const SINGLE_JOB_NAME: &str = "send-email";

/// The dispatch queue shared by the intake service and the worker
pub struct CampaignQueue;

impl QueueDef for CampaignQueue {
    const QUEUE_NAME: &'static str = "email-queue";
}

/// A unit of work on the dispatch queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DispatchJob {
    Campaign(CampaignJob),
    /// Legacy single-recipient send with no delivery log
    Single(SingleEmailJob),
}

impl DispatchJob {
    pub fn job_name(&self) -> &'static str {
        match self {
            DispatchJob::Campaign(_) => CAMPAIGN_JOB_NAME,
            DispatchJob::Single(_) => SINGLE_JOB_NAME,
        }
    }

    /// Reject payloads that must fail before any send
    pub fn check(&self) -> CampaignResult<()> {
        match self {
            DispatchJob::Campaign(job) => job.check(),
            DispatchJob::Single(job) => job.check(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CampaignJob {
    #[serde(default)]
    pub campaign_id: Option<Uuid>,
    #[serde(default)]
    pub owner_id: Option<Uuid>,
    #[validate(length(min = 1))]
    pub subject: String,
    #[serde(alias = "html")]
    #[validate(length(min = 1))]
    pub content: String,
    #[validate(length(min = 1), nested)]
    pub recipients: Vec<Recipient>,
    #[serde(default)]
    pub provider: ProviderConfig,
}

impl CampaignJob {
    pub fn check(&self) -> CampaignResult<()> {
        self.validate()?;
        self.provider.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SingleEmailJob {
    #[validate(nested)]
    pub recipient: Recipient,
    #[validate(length(min = 1))]
    pub subject: String,
    #[serde(alias = "html")]
    #[validate(length(min = 1))]
    pub content: String,
    #[serde(default)]
    pub provider: ProviderConfig,
}

impl SingleEmailJob {
    pub fn check(&self) -> CampaignResult<()> {
        self.validate()?;
        self.provider.validate()
    }
}

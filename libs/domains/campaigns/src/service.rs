//! Intake, status and analytics operations used by the API layer.

use crate::error::{CampaignError, CampaignResult};
use crate::job::{CampaignJob, DispatchJob, SingleEmailJob};
use crate::journal::DeliveryJournal;
use crate::models::{
    DeliveryStats, DispatchProgress, NewCampaign, Recipient, RecipientInput, SendOutcome,
};
use crate::suppression::SuppressionGate;
use crate::transport::ProviderConfig;
use job_queue::{JobId, JobQueue, JobState};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

/// A bulk-send request as submitted by an owner
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CampaignRequest {
    #[validate(length(min = 1))]
    pub recipients: Vec<RecipientInput>,
    #[validate(length(min = 1))]
    pub subject: String,
    #[serde(alias = "html")]
    #[validate(length(min = 1))]
    pub content: String,
    /// Reuse an existing campaign record instead of creating one
    #[serde(default)]
    pub campaign_id: Option<Uuid>,
    #[serde(default)]
    pub provider: ProviderConfig,
}

/// A legacy single-recipient send
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SingleEmailRequest {
    pub to: RecipientInput,
    #[validate(length(min = 1))]
    pub subject: String,
    #[serde(alias = "html")]
    #[validate(length(min = 1))]
    pub content: String,
    #[serde(default)]
    pub provider: ProviderConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueReceipt {
    pub job_id: JobId,
    pub campaign_id: Uuid,
    pub queued: usize,
    pub blocked: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignJobStatus {
    pub job_id: JobId,
    pub state: JobState,
    pub progress: Option<DispatchProgress>,
    pub result: Option<SendOutcome>,
    pub failed_reason: Option<String>,
}

pub struct CampaignService {
    queue: Arc<dyn JobQueue<DispatchJob>>,
    journal: Arc<dyn DeliveryJournal>,
    gate: SuppressionGate,
}

impl CampaignService {
    pub fn new(
        queue: Arc<dyn JobQueue<DispatchJob>>,
        journal: Arc<dyn DeliveryJournal>,
        gate: SuppressionGate,
    ) -> Self {
        Self {
            queue,
            journal,
            gate,
        }
    }

    pub fn gate(&self) -> &SuppressionGate {
        &self.gate
    }

    /// Accept a campaign: filter suppressions, journal pending rows, enqueue.
    #[instrument(skip(self, request), fields(owner_id = %owner_id, recipients = request.recipients.len()))]
    pub async fn enqueue_campaign(
        &self,
        owner_id: Uuid,
        request: CampaignRequest,
    ) -> CampaignResult<EnqueueReceipt> {
        request.validate()?;
        request.provider.validate()?;

        let recipients: Vec<Recipient> = request.recipients.into_iter().map(Into::into).collect();
        for recipient in &recipients {
            recipient.validate()?;
        }

        let filtered = self.gate.filter(recipients, owner_id).await?;
        let blocked = filtered.blocked.len();
        if filtered.allowed.is_empty() {
            return Err(CampaignError::AllRecipientsSuppressed { blocked });
        }

        let campaign_id = match request.campaign_id {
            Some(campaign_id) => {
                self.journal
                    .campaign(campaign_id)
                    .await?
                    .ok_or(CampaignError::CampaignNotFound(campaign_id))?
                    .id
            }
            None => {
                self.journal
                    .create_campaign(NewCampaign {
                        owner_id,
                        subject: request.subject.clone(),
                        content: request.content.clone(),
                        total_recipients: filtered.allowed.len(),
                    })
                    .await?
                    .id
            }
        };

        let recipients: Vec<Recipient> = filtered
            .allowed
            .into_iter()
            .map(|recipient| recipient.with_tracking_id(Uuid::new_v4()))
            .collect();
        if let Err(e) = self.journal.record_pending(campaign_id, &recipients).await {
            error!(
                campaign_id = %campaign_id,
                error = %e,
                "Failed to journal recipients, campaign left unqueued"
            );
            return Err(e);
        }

        let queued = recipients.len();
        let job = DispatchJob::Campaign(CampaignJob {
            campaign_id: Some(campaign_id),
            owner_id: Some(owner_id),
            subject: request.subject,
            content: request.content,
            recipients,
            provider: request.provider,
        });
        let job_id = match self.queue.enqueue(job.job_name(), &job).await {
            Ok(job_id) => job_id,
            Err(e) => {
                error!(
                    campaign_id = %campaign_id,
                    queued,
                    error = %e,
                    "Failed to enqueue campaign, pending rows left unqueued"
                );
                return Err(e.into());
            }
        };

        info!(job_id = %job_id, campaign_id = %campaign_id, queued, blocked, "Campaign queued");

        Ok(EnqueueReceipt {
            job_id,
            campaign_id,
            queued,
            blocked,
        })
    }

    /// Queue a single send; it gets no delivery log row
    pub async fn enqueue_single(&self, request: SingleEmailRequest) -> CampaignResult<JobId> {
        request.validate()?;

        let job = DispatchJob::Single(SingleEmailJob {
            recipient: request.to.into(),
            subject: request.subject,
            content: request.content,
            provider: request.provider,
        });
        job.check()?;

        let job_id = self.queue.enqueue(job.job_name(), &job).await?;
        info!(job_id = %job_id, "Single email queued");
        Ok(job_id)
    }

    pub async fn job_status(&self, job_id: &JobId) -> CampaignResult<Option<CampaignJobStatus>> {
        let Some(status) = self.queue.status(job_id).await? else {
            return Ok(None);
        };

        let progress = status
            .progress
            .map(serde_json::from_value::<DispatchProgress>)
            .transpose()?;
        let result = status
            .result
            .map(serde_json::from_value::<SendOutcome>)
            .transpose()?;

        Ok(Some(CampaignJobStatus {
            job_id: status.id,
            state: status.state,
            progress,
            result,
            failed_reason: status.failed_reason,
        }))
    }

    /// Record an open from the tracking pixel; only the first one counts
    pub async fn record_open(&self, tracking_id: Uuid) -> CampaignResult<bool> {
        self.journal.mark_opened(tracking_id).await
    }

    pub async fn campaign_stats(&self, campaign_id: Uuid) -> CampaignResult<DeliveryStats> {
        if self.journal.campaign(campaign_id).await?.is_none() {
            return Err(CampaignError::CampaignNotFound(campaign_id));
        }
        self.journal.stats(campaign_id).await
    }
}

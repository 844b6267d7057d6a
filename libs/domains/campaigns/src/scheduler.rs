//! Walks a campaign's recipients in sequential or batched mode.

use crate::config::{DispatchConfig, DispatchPlan};
use crate::job::CampaignJob;
use crate::metrics;
use crate::models::{DeliveryStatus, DispatchProgress, Recipient, SendOutcome};
use crate::pacing::Pacer;
use crate::sender::{DispatchContext, PacedSender};
use crate::transport::EmailTransport;
use job_queue::JobContext;
use std::sync::Arc;
use strum::AsRefStr;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Lifecycle of one campaign run
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum RunState {
    Received,
    Dispatching,
    Completed,
}

pub struct CampaignScheduler {
    sender: Arc<PacedSender>,
    pacer: Arc<dyn Pacer>,
    config: DispatchConfig,
}

impl CampaignScheduler {
    pub fn new(sender: Arc<PacedSender>, pacer: Arc<dyn Pacer>, config: DispatchConfig) -> Self {
        Self {
            sender,
            pacer,
            config,
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Run a validated campaign job to completion.
    ///
    /// Per-recipient failures never abort the run. Every recipient is
    /// attempted once and the campaign is marked completed at the end.
    #[instrument(
        skip(self, job, transport, ctx),
        fields(job_id = %ctx.id(), campaign_id = ?job.campaign_id, total = job.recipients.len())
    )]
    pub async fn run(
        &self,
        job: &CampaignJob,
        transport: &dyn EmailTransport,
        ctx: &JobContext,
    ) -> SendOutcome {
        let total = job.recipients.len();
        info!(
            state = RunState::Received.as_ref(),
            attempt = ctx.attempt(),
            transport = transport.name(),
            "Campaign job received"
        );

        let dispatch = DispatchContext {
            campaign_id: job.campaign_id,
            owner_id: self.resolve_owner(job).await,
            subject: &job.subject,
            content: &job.content,
            provider: &job.provider,
            transport,
        };

        let plan = self.config.plan_for(total);
        info!(state = RunState::Dispatching.as_ref(), ?plan, "Dispatching campaign");

        let mut outcome = SendOutcome::default();
        match plan {
            DispatchPlan::Sequential => {
                for recipient in &job.recipients {
                    self.dispatch_one(recipient, &dispatch, &mut outcome).await;
                    self.report(ctx, &outcome, total).await;
                }
            }
            DispatchPlan::Batched { batch_size } => {
                let batches = total.div_ceil(batch_size);
                for (index, batch) in job.recipients.chunks(batch_size).enumerate() {
                    for recipient in batch {
                        self.dispatch_one(recipient, &dispatch, &mut outcome).await;
                    }
                    self.report(ctx, &outcome, total).await;

                    if index + 1 < batches {
                        self.pacer.pause(self.config.inter_batch_pause).await;
                    }
                }
            }
        }

        if let Some(campaign_id) = job.campaign_id {
            self.complete_campaign(campaign_id).await;
        }

        metrics::campaign_completed(total);
        info!(
            state = RunState::Completed.as_ref(),
            sent = outcome.success_count,
            failed = outcome.failure_count,
            skipped = outcome.skipped_count,
            "Campaign finished"
        );
        outcome
    }

    async fn dispatch_one(
        &self,
        recipient: &Recipient,
        dispatch: &DispatchContext<'_>,
        outcome: &mut SendOutcome,
    ) {
        if self.already_resolved(recipient).await {
            outcome.record_skip();
            return;
        }
        self.sender.send(recipient, dispatch, outcome).await;
    }

    /// With `skip_non_pending`, a redelivered job leaves resolved rows alone
    async fn already_resolved(&self, recipient: &Recipient) -> bool {
        if !self.config.skip_non_pending {
            return false;
        }
        let Some(tracking_id) = recipient.tracking_id else {
            return false;
        };

        match self.sender.journal().entry(tracking_id).await {
            Ok(Some(entry)) => entry.status != DeliveryStatus::Pending,
            Ok(None) => false,
            Err(e) => {
                warn!(
                    tracking_id = %tracking_id,
                    error = %e,
                    "Could not read delivery log; sending anyway"
                );
                metrics::journal_error("entry");
                false
            }
        }
    }

    async fn resolve_owner(&self, job: &CampaignJob) -> Option<Uuid> {
        if job.owner_id.is_some() {
            return job.owner_id;
        }
        let campaign_id = job.campaign_id?;

        match self.sender.journal().campaign(campaign_id).await {
            Ok(Some(campaign)) => Some(campaign.owner_id),
            Ok(None) => {
                warn!("Campaign row not found; bounces will not be suppressed");
                None
            }
            Err(e) => {
                warn!(error = %e, "Could not load campaign owner; bounces will not be suppressed");
                metrics::journal_error("campaign");
                None
            }
        }
    }

    async fn report(&self, ctx: &JobContext, outcome: &SendOutcome, total: usize) {
        let progress = DispatchProgress::from_outcome(outcome, total);
        if let Err(e) = ctx.report_progress(&progress).await {
            warn!(error = %e, "Failed to report progress");
        }
    }

    async fn complete_campaign(&self, campaign_id: Uuid) {
        match self.sender.journal().mark_campaign_completed(campaign_id).await {
            Ok(true) => {}
            Ok(false) => warn!("Campaign row not found; not marked completed"),
            Err(e) => {
                warn!(error = %e, "Failed to mark campaign completed");
                metrics::journal_error("mark_campaign_completed");
            }
        }
    }
}

//! Queue processor that routes dispatch jobs to the scheduler or the
//! single-send path.

use crate::job::DispatchJob;
use crate::models::SendOutcome;
use crate::scheduler::CampaignScheduler;
use crate::sender::{DispatchContext, PacedSender};
use crate::transport::TransportResolver;
use async_trait::async_trait;
use job_queue::{JobContext, JobProcessor, QueueError};
use std::sync::Arc;
use tracing::{info, warn};

pub struct DispatchProcessor {
    scheduler: Arc<CampaignScheduler>,
    sender: Arc<PacedSender>,
    transports: Arc<dyn TransportResolver>,
}

impl DispatchProcessor {
    pub fn new(
        scheduler: Arc<CampaignScheduler>,
        sender: Arc<PacedSender>,
        transports: Arc<dyn TransportResolver>,
    ) -> Self {
        Self {
            scheduler,
            sender,
            transports,
        }
    }
}

#[async_trait]
impl JobProcessor<DispatchJob> for DispatchProcessor {
    type Output = SendOutcome;

    async fn process(&self, job: &DispatchJob, ctx: &JobContext) -> Result<SendOutcome, QueueError> {
        if let Err(e) = job.check() {
            warn!(job_id = %ctx.id(), error = %e, "Rejecting invalid dispatch job");
            return Err(e.into());
        }

        match job {
            DispatchJob::Campaign(campaign) => {
                let transport = self.transports.resolve(&campaign.provider).await?;
                Ok(self.scheduler.run(campaign, transport.as_ref(), ctx).await)
            }
            DispatchJob::Single(single) => {
                let transport = self.transports.resolve(&single.provider).await?;
                let dispatch = DispatchContext {
                    campaign_id: None,
                    owner_id: None,
                    subject: &single.subject,
                    content: &single.content,
                    provider: &single.provider,
                    transport: transport.as_ref(),
                };
                self.sender.send_single(&single.recipient, &dispatch).await?;

                info!(job_id = %ctx.id(), to = %single.recipient.email, "Single email sent");
                Ok(SendOutcome::single_success())
            }
        }
    }

    fn name(&self) -> &'static str {
        "campaign-dispatch"
    }
}

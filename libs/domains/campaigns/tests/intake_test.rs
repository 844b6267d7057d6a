//! Campaign intake, job status and open tracking through `CampaignService`.

use domain_campaigns::{
    CampaignError, CampaignRequest, CampaignService, CampaignStatus, DeliveryJournal,
    DeliveryStatus, DispatchJob, DispatchProgress, InMemoryDeliveryJournal,
    InMemorySuppressionStore, ProviderConfig, RecipientInput, SendOutcome, SingleEmailRequest,
    SuppressionGate, SuppressionSource,
};
use job_queue::{InMemoryJobQueue, JobId, JobQueue, JobState, QueueHandle};
use std::sync::Arc;
use uuid::Uuid;

struct Fixture {
    owner_id: Uuid,
    queue: Arc<InMemoryJobQueue<DispatchJob>>,
    journal: Arc<InMemoryDeliveryJournal>,
    service: CampaignService,
}

fn fixture() -> Fixture {
    let queue = Arc::new(InMemoryJobQueue::new("email-queue"));
    let journal = Arc::new(InMemoryDeliveryJournal::new());
    let gate = SuppressionGate::new(Arc::new(InMemorySuppressionStore::new()));
    let service = CampaignService::new(queue.clone(), journal.clone(), gate);
    Fixture {
        owner_id: Uuid::new_v4(),
        queue,
        journal,
        service,
    }
}

fn request(emails: &[&str]) -> CampaignRequest {
    CampaignRequest {
        recipients: emails
            .iter()
            .map(|email| RecipientInput::Address(email.to_string()))
            .collect(),
        subject: "Launch".into(),
        content: "<p>We are live</p>".into(),
        campaign_id: None,
        provider: ProviderConfig::shared_ses(),
    }
}

#[test]
fn test_request_accepts_mixed_recipient_shapes() {
    let request: CampaignRequest = serde_json::from_value(serde_json::json!({
        "recipients": [
            "a@example.com",
            {"email": "b@example.com", "data": {"name": "Bea"}},
            {"email": "c@example.com", "attachments": [{"name": "menu.pdf", "url": "https://cdn.example.com/menu.pdf"}]}
        ],
        "subject": "Menu",
        "html": "<p>Hi {{name}}</p>",
        "provider": {"provider": "shared-ses", "language": "en"}
    }))
    .unwrap();

    assert_eq!(request.recipients.len(), 3);
    assert_eq!(request.content, "<p>Hi {{name}}</p>");
    assert!(request.campaign_id.is_none());
    assert!(matches!(request.recipients[0], RecipientInput::Address(_)));
    assert!(matches!(request.recipients[1], RecipientInput::Detailed { .. }));
}

#[tokio::test]
async fn test_enqueue_creates_campaign_and_pending_rows() {
    let f = fixture();
    let receipt = f
        .service
        .enqueue_campaign(f.owner_id, request(&["a@example.com", " B@Example.com "]))
        .await
        .unwrap();

    assert_eq!(receipt.queued, 2);
    assert_eq!(receipt.blocked, 0);

    let campaign = f.journal.campaign(receipt.campaign_id).await.unwrap().unwrap();
    assert_eq!(campaign.owner_id, f.owner_id);
    assert_eq!(campaign.status, CampaignStatus::Processing);
    assert_eq!(campaign.total_recipients, 2);

    let entries = f.journal.entries(receipt.campaign_id).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|entry| entry.status == DeliveryStatus::Pending));

    let record = f.queue.record(&receipt.job_id).await.unwrap();
    assert_eq!(record.name, "send-campaign");
    let DispatchJob::Campaign(job) = record.payload else {
        panic!("expected a campaign job");
    };
    assert_eq!(job.campaign_id, Some(receipt.campaign_id));
    assert_eq!(job.owner_id, Some(f.owner_id));
    assert_eq!(job.recipients[1].email, "B@Example.com");

    let tracking: Vec<Uuid> = job.recipients.iter().filter_map(|r| r.tracking_id).collect();
    assert_eq!(tracking.len(), 2);
    assert_ne!(tracking[0], tracking[1]);
    for id in tracking {
        assert!(f.journal.entry(id).await.unwrap().is_some());
    }
}

#[tokio::test]
async fn test_suppressed_addresses_are_filtered_case_insensitively() {
    let f = fixture();
    f.service
        .gate()
        .suppress(
            f.owner_id,
            "Blocked@Example.com",
            "Requested removal",
            SuppressionSource::Unsubscribe,
        )
        .await
        .unwrap();

    let receipt = f
        .service
        .enqueue_campaign(f.owner_id, request(&["ok@example.com", "blocked@EXAMPLE.com"]))
        .await
        .unwrap();

    assert_eq!(receipt.queued, 1);
    assert_eq!(receipt.blocked, 1);
    let campaign = f.journal.campaign(receipt.campaign_id).await.unwrap().unwrap();
    assert_eq!(campaign.total_recipients, 1);
}

#[tokio::test]
async fn test_suppression_lists_are_per_owner() {
    let f = fixture();
    let other_owner = Uuid::new_v4();
    f.service
        .gate()
        .suppress(other_owner, "shared@example.com", "bounced", SuppressionSource::Bounce)
        .await
        .unwrap();

    let receipt = f
        .service
        .enqueue_campaign(f.owner_id, request(&["shared@example.com"]))
        .await
        .unwrap();
    assert_eq!(receipt.queued, 1);
}

#[tokio::test]
async fn test_all_suppressed_is_rejected_without_side_effects() {
    let f = fixture();
    for email in ["a@example.com", "b@example.com"] {
        f.service
            .gate()
            .suppress(f.owner_id, email, "bounced", SuppressionSource::Bounce)
            .await
            .unwrap();
    }

    let err = f
        .service
        .enqueue_campaign(f.owner_id, request(&["a@example.com", "B@example.com"]))
        .await
        .unwrap_err();

    assert!(matches!(err, CampaignError::AllRecipientsSuppressed { blocked: 2 }));
    assert_eq!(f.queue.waiting_count().await, 0);
}

#[tokio::test]
async fn test_invalid_requests_are_rejected() {
    let f = fixture();

    let mut empty_subject = request(&["a@example.com"]);
    empty_subject.subject.clear();
    let err = f.service.enqueue_campaign(f.owner_id, empty_subject).await.unwrap_err();
    assert!(matches!(err, CampaignError::Validation(_)));

    let err = f
        .service
        .enqueue_campaign(f.owner_id, request(&[]))
        .await
        .unwrap_err();
    assert!(matches!(err, CampaignError::Validation(_)));

    let err = f
        .service
        .enqueue_campaign(f.owner_id, request(&["not-an-address"]))
        .await
        .unwrap_err();
    assert!(matches!(err, CampaignError::Validation(_)));

    let mut smtp_without_host = request(&["a@example.com"]);
    smtp_without_host.provider =
        serde_json::from_value(serde_json::json!({"provider": "smtp"})).unwrap();
    let err = f
        .service
        .enqueue_campaign(f.owner_id, smtp_without_host)
        .await
        .unwrap_err();
    assert!(matches!(err, CampaignError::ProviderConfig(_)));

    assert_eq!(f.queue.waiting_count().await, 0);
}

#[tokio::test]
async fn test_unknown_campaign_id_is_rejected() {
    let f = fixture();
    let mut req = request(&["a@example.com"]);
    let missing = Uuid::new_v4();
    req.campaign_id = Some(missing);

    let err = f.service.enqueue_campaign(f.owner_id, req).await.unwrap_err();
    assert!(matches!(err, CampaignError::CampaignNotFound(id) if id == missing));
}

#[tokio::test]
async fn test_existing_campaign_id_is_reused() {
    let f = fixture();
    let first = f
        .service
        .enqueue_campaign(f.owner_id, request(&["a@example.com"]))
        .await
        .unwrap();

    let mut req = request(&["b@example.com"]);
    req.campaign_id = Some(first.campaign_id);
    let second = f.service.enqueue_campaign(f.owner_id, req).await.unwrap();

    assert_eq!(second.campaign_id, first.campaign_id);
    assert_ne!(second.job_id, first.job_id);
    assert_eq!(f.journal.entries(first.campaign_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_single_email_is_queued_without_journal() {
    let f = fixture();
    let job_id = f
        .service
        .enqueue_single(SingleEmailRequest {
            to: RecipientInput::Address("solo@example.com".into()),
            subject: "Receipt".into(),
            content: "<p>Thanks</p>".into(),
            provider: ProviderConfig::shared_ses(),
        })
        .await
        .unwrap();

    let record = f.queue.record(&job_id).await.unwrap();
    assert_eq!(record.name, "send-email");
    assert!(matches!(
        record.payload,
        DispatchJob::Single(ref job) if job.recipient.email == "solo@example.com"
    ));
}

#[tokio::test]
async fn test_job_status_reports_progress_and_result() {
    let f = fixture();
    let receipt = f
        .service
        .enqueue_campaign(f.owner_id, request(&["a@example.com", "b@example.com"]))
        .await
        .unwrap();

    let status = f.service.job_status(&receipt.job_id).await.unwrap().unwrap();
    assert_eq!(status.state, JobState::Waiting);
    assert!(status.progress.is_none());

    let reserved = f.queue.reserve().await.unwrap().unwrap();
    let progress = DispatchProgress { sent: 1, failed: 0, total: 2 };
    f.queue
        .report_progress(&reserved.id, serde_json::to_value(progress).unwrap())
        .await
        .unwrap();

    let status = f.service.job_status(&receipt.job_id).await.unwrap().unwrap();
    assert_eq!(status.state, JobState::Active);
    assert_eq!(status.progress, Some(progress));

    let mut outcome = SendOutcome::default();
    outcome.record_success();
    outcome.record_failure("b@example.com", "550 no such user");
    f.queue
        .complete(&reserved.id, serde_json::to_value(&outcome).unwrap())
        .await
        .unwrap();

    let status = f.service.job_status(&receipt.job_id).await.unwrap().unwrap();
    assert_eq!(status.state, JobState::Completed);
    assert_eq!(status.result, Some(outcome));

    assert!(
        f.service
            .job_status(&JobId::from("missing"))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_open_is_recorded_once_and_counted() {
    let f = fixture();
    let receipt = f
        .service
        .enqueue_campaign(f.owner_id, request(&["a@example.com", "b@example.com"]))
        .await
        .unwrap();
    let tracking_id = f.journal.entries(receipt.campaign_id).await.unwrap()[0].tracking_id;

    assert!(f.service.record_open(tracking_id).await.unwrap());
    assert!(!f.service.record_open(tracking_id).await.unwrap());
    assert!(!f.service.record_open(Uuid::new_v4()).await.unwrap());

    let stats = f.service.campaign_stats(receipt.campaign_id).await.unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.pending, 2);
    assert_eq!(stats.opened, 1);
}

#[tokio::test]
async fn test_stats_for_unknown_campaign() {
    let f = fixture();
    let err = f.service.campaign_stats(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, CampaignError::CampaignNotFound(_)));
}

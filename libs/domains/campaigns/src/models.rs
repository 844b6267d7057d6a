use chrono::{DateTime, Utc};
use sea_orm::sea_query::StringLen;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};
use uuid::Uuid;
use validator::Validate;

/// Campaign lifecycle status
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    Default,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CampaignStatus {
    /// Accepted and queued or being dispatched
    #[default]
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "completed")]
    Completed,
}

/// Delivery status of one recipient within a campaign
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    Default,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeliveryStatus {
    #[default]
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "sent")]
    Sent,
    #[sea_orm(string_value = "failed")]
    Failed,
}

/// How an address ended up on a suppression list
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    Default,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SuppressionSource {
    #[default]
    #[sea_orm(string_value = "manual")]
    Manual,
    /// Recorded automatically after a permanent delivery failure
    #[sea_orm(string_value = "bounce")]
    Bounce,
    #[sea_orm(string_value = "unsubscribe")]
    Unsubscribe,
}

/// A bulk-send request and its lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub subject: String,
    pub content: String,
    pub total_recipients: i32,
    pub status: CampaignStatus,
    pub created_at: DateTime<Utc>,
}

/// Data needed to create a campaign record
#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub owner_id: Uuid,
    pub subject: String,
    pub content: String,
    pub total_recipients: usize,
}

/// One row per (campaign, recipient)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryLogEntry {
    pub tracking_id: Uuid,
    pub campaign_id: Uuid,
    pub recipient_email: String,
    pub status: DeliveryStatus,
    pub error_message: Option<String>,
    pub opened_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Per-campaign delivery counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStats {
    pub total: u64,
    pub pending: u64,
    pub sent: u64,
    pub failed: u64,
    pub opened: u64,
}

/// An address an owner must never be sent to again
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuppressionEntry {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub email: String,
    pub reason: String,
    pub source: SuppressionSource,
    pub created_at: DateTime<Utc>,
}

/// Data needed to add an address to a suppression list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSuppression {
    pub owner_id: Uuid,
    pub email: String,
    pub reason: String,
    pub source: SuppressionSource,
}

impl NewSuppression {
    /// Build an entry with the address normalized for case-insensitive matching
    pub fn new(
        owner_id: Uuid,
        email: &str,
        reason: impl Into<String>,
        source: SuppressionSource,
    ) -> Self {
        Self {
            owner_id,
            email: normalize_email(email),
            reason: reason.into(),
            source,
        }
    }
}

/// Result of an insert-or-ignore into a suppression list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

/// A file linked by URL and fetched at send time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Attachment {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(url)]
    pub url: String,
}

/// One addressee of a campaign, with personalization data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    #[validate(email)]
    pub email: String,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[validate(nested)]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_id: Option<Uuid>,
}

impl Recipient {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            data: Map::new(),
            attachments: Vec::new(),
            tracking_id: None,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn with_tracking_id(mut self, tracking_id: Uuid) -> Self {
        self.tracking_id = Some(tracking_id);
        self
    }

    /// Lowercased, trimmed address used for suppression and journal matching
    pub fn normalized_email(&self) -> String {
        normalize_email(&self.email)
    }
}

/// A recipient as accepted at intake: a bare address or a structured object
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecipientInput {
    Address(String),
    Detailed {
        email: String,
        #[serde(default)]
        data: Option<Map<String, Value>>,
        #[serde(default)]
        attachments: Option<Vec<Attachment>>,
    },
}

impl From<RecipientInput> for Recipient {
    fn from(input: RecipientInput) -> Self {
        match input {
            RecipientInput::Address(email) => Recipient::new(email.trim()),
            RecipientInput::Detailed {
                email,
                data,
                attachments,
            } => Recipient {
                email: email.trim().to_string(),
                data: data.unwrap_or_default(),
                attachments: attachments.unwrap_or_default(),
                tracking_id: None,
            },
        }
    }
}

/// A recipient that could not be delivered to during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedRecipient {
    pub email: String,
    pub error: String,
}

/// Aggregate result of a dispatch job
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOutcome {
    pub success_count: usize,
    pub failure_count: usize,
    pub failed_emails: Vec<FailedRecipient>,
    /// Recipients skipped because their journal row was already resolved
    #[serde(default, skip_serializing_if = "is_zero")]
    pub skipped_count: usize,
}

fn is_zero(value: &usize) -> bool {
    *value == 0
}

impl SendOutcome {
    /// Outcome of a successful single (non-campaign) send
    pub fn single_success() -> Self {
        Self {
            success_count: 1,
            ..Self::default()
        }
    }

    pub fn record_success(&mut self) {
        self.success_count += 1;
    }

    pub fn record_failure(&mut self, email: &str, error: &str) {
        self.failure_count += 1;
        self.failed_emails.push(FailedRecipient {
            email: email.to_string(),
            error: error.to_string(),
        });
    }

    pub fn record_skip(&mut self) {
        self.skipped_count += 1;
    }

    /// Recipients attempted or skipped so far
    pub fn processed(&self) -> usize {
        self.success_count + self.failure_count + self.skipped_count
    }
}

/// Progress payload reported to the queue while a campaign runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchProgress {
    /// Successful deliveries so far
    pub sent: usize,
    pub failed: usize,
    pub total: usize,
}

impl DispatchProgress {
    pub fn from_outcome(outcome: &SendOutcome, total: usize) -> Self {
        Self {
            sent: outcome.success_count,
            failed: outcome.failure_count,
            total,
        }
    }
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

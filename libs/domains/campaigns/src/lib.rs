//! Campaigns Domain
//!
//! Bulk email dispatch: personalized, throttled sending to many recipients
//! with a per-recipient delivery log and automatic bounce suppression.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ CampaignService  │  ← intake, status, analytics
//! └────────┬─────────┘
//!          │ DispatchJob (email-queue)
//! ┌────────▼─────────┐
//! │DispatchProcessor │  ← job routing, transport resolution
//! └────────┬─────────┘
//! ┌────────▼─────────┐
//! │CampaignScheduler │  ← sequential or batched walk, progress
//! └────────┬─────────┘
//! ┌────────▼─────────┐
//! │   PacedSender    │  ← personalize, envelope, send, journal, pace
//! └──┬──────┬─────┬──┘
//!    │      │     │
//! Journal  Gate  Transport
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_campaigns::{
//!     CampaignService, PgDeliveryJournal, PgSuppressionStore, SuppressionGate,
//!     DispatchJob, CampaignQueue,
//! };
//! use job_queue::{QueueDef, RedisJobQueue};
//! use std::sync::Arc;
//!
//! # async fn example(db: sea_orm::DatabaseConnection, redis: redis::aio::ConnectionManager) {
//! let queue = Arc::new(RedisJobQueue::<DispatchJob>::from_queue_def::<CampaignQueue>(redis));
//! let gate = SuppressionGate::new(Arc::new(PgSuppressionStore::new(db.clone())));
//! let service = CampaignService::new(queue, Arc::new(PgDeliveryJournal::new(db)), gate);
//! # }
//! ```

pub mod classifier;
pub mod config;
pub mod entity;
pub mod error;
pub mod job;
pub mod journal;
pub mod metrics;
pub mod models;
pub mod pacing;
pub mod personalizer;
pub mod processor;
pub mod scheduler;
pub mod sender;
pub mod service;
pub mod suppression;
pub mod transport;

pub use classifier::{FailureClass, classify};
pub use config::{DispatchConfig, DispatchPlan, EnvelopeConfig};
pub use error::{CampaignError, CampaignResult};
pub use job::{CampaignJob, CampaignQueue, DispatchJob, SingleEmailJob};
pub use journal::{DeliveryJournal, InMemoryDeliveryJournal, LogKey, PgDeliveryJournal};
pub use models::{
    Attachment, Campaign, CampaignStatus, DeliveryLogEntry, DeliveryStats, DeliveryStatus,
    DispatchProgress, FailedRecipient, InsertOutcome, Recipient, RecipientInput, SendOutcome,
    SuppressionEntry, SuppressionSource,
};
pub use pacing::{Pacer, RecordingPacer, TokioPacer};
pub use processor::DispatchProcessor;
pub use scheduler::CampaignScheduler;
pub use sender::{DispatchContext, PacedSender, RecipientOutcome};
pub use service::{
    CampaignJobStatus, CampaignRequest, CampaignService, EnqueueReceipt, SingleEmailRequest,
};
pub use suppression::{
    FilterOutcome, InMemorySuppressionStore, PgSuppressionStore, SuppressionGate,
    SuppressionStore,
};
pub use transport::{
    EmailTransport, EnvelopeBuilder, MockTransport, OutboundEmail, ProviderConfig, ProviderKind,
    SendReceipt, TransportRegistry, TransportResolver,
};

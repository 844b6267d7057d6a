//! Recording transport for tests and local runs.

use super::{EmailTransport, OutboundEmail, SendReceipt};
use async_trait::async_trait;
use eyre::{Result, eyre};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Captures delivered mail and fails chosen addresses with a fixed message
#[derive(Default)]
pub struct MockTransport {
    sent: Mutex<Vec<OutboundEmail>>,
    attempts: Mutex<Vec<String>>,
    failures: HashMap<String, String>,
    fail_all: Option<String>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every send with `message`
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_all: Some(message.into()),
            ..Self::default()
        }
    }

    /// Fail sends to `email` (case-insensitive) with `message`
    pub fn with_failure(mut self, email: &str, message: impl Into<String>) -> Self {
        self.failures
            .insert(email.trim().to_lowercase(), message.into());
        self
    }

    /// Successfully delivered messages, in order
    pub async fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Every address a send was attempted for, in order
    pub async fn attempts(&self) -> Vec<String> {
        self.attempts.lock().await.clone()
    }

    pub async fn attempts_for(&self, email: &str) -> usize {
        let email = email.trim().to_lowercase();
        self.attempts
            .lock()
            .await
            .iter()
            .filter(|attempt| attempt.to_lowercase() == email)
            .count()
    }

    pub async fn was_sent_to(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.sent
            .lock()
            .await
            .iter()
            .any(|sent| sent.to.to_lowercase() == email)
    }
}

#[async_trait]
impl EmailTransport for MockTransport {
    async fn send(&self, email: &OutboundEmail) -> Result<SendReceipt> {
        self.attempts.lock().await.push(email.to.clone());

        let failure = self
            .fail_all
            .as_ref()
            .or_else(|| self.failures.get(&email.to.trim().to_lowercase()));
        if let Some(message) = failure {
            return Err(eyre!("{message}"));
        }

        let mut sent = self.sent.lock().await;
        sent.push(email.clone());
        Ok(SendReceipt {
            message_id: Some(format!("mock-{}", sent.len())),
        })
    }

    async fn health_check(&self) -> Result<()> {
        match &self.fail_all {
            Some(_) => Err(eyre!("Mock transport is failing")),
            None => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(to: &str) -> OutboundEmail {
        OutboundEmail {
            to: to.into(),
            from: "noreply@toolmail.com".into(),
            reply_to: None,
            subject: "Hi".into(),
            html: "<p>Hi</p>".into(),
            text: "Hi".into(),
            attachments: Vec::new(),
            list_unsubscribe: None,
        }
    }

    #[tokio::test]
    async fn test_records_successes_and_failures() {
        let transport = MockTransport::new().with_failure("C@x.com", "550 no such user");

        assert!(transport.send(&email("a@x.com")).await.is_ok());
        let err = transport.send(&email("c@x.com")).await.unwrap_err();
        assert_eq!(format!("{err:#}"), "550 no such user");

        assert_eq!(transport.sent_count().await, 1);
        assert_eq!(transport.attempts().await, vec!["a@x.com", "c@x.com"]);
        assert!(transport.was_sent_to("A@X.com").await);
        assert!(!transport.was_sent_to("c@x.com").await);
    }

    #[tokio::test]
    async fn test_failing_transport() {
        let transport = MockTransport::failing("connection refused");
        assert!(transport.send(&email("a@x.com")).await.is_err());
        assert!(transport.health_check().await.is_err());
        assert_eq!(transport.attempts_for("a@x.com").await, 1);
    }
}

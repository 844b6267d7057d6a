//! Dispatch counters, exported through the worker's Prometheus recorder.

use crate::classifier::FailureClass;

pub fn email_sent(transport: &'static str) {
    metrics::counter!("campaign_emails_sent_total", "transport" => transport).increment(1);
}

pub fn email_failed(transport: &'static str, class: FailureClass) {
    metrics::counter!(
        "campaign_emails_failed_total",
        "transport" => transport,
        "class" => class.as_ref().to_string()
    )
    .increment(1);
}

pub fn suppression_recorded() {
    metrics::counter!("campaign_suppressions_recorded_total").increment(1);
}

pub fn journal_error(operation: &'static str) {
    metrics::counter!("campaign_journal_errors_total", "operation" => operation).increment(1);
}

pub fn campaign_completed(recipients: usize) {
    metrics::counter!("campaign_runs_completed_total").increment(1);
    metrics::histogram!("campaign_recipients").record(recipients as f64);
}

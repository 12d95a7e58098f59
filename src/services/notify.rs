use async_trait::async_trait;
use tracing::info;

/// Receives the summary of each scheduled run.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subject: &str, body: &str);
}

/// Writes notifications to the log, addressed to the configured recipient.
pub struct LogNotifier {
    recipient: Option<String>,
}

impl LogNotifier {
    pub fn new(recipient: Option<String>) -> Self {
        Self { recipient }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, subject: &str, body: &str) {
        match &self.recipient {
            Some(to) => info!("Notification to {}: {} - {}", to, subject, body),
            None => info!("Notification: {} - {}", subject, body),
        }
    }
}

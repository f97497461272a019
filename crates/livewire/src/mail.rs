//! The mail collaborator.

use std::collections::BTreeMap;
use std::future::{ready, Future};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::MailError;

/// Sends templated email. Template rendering is the implementor's job.
pub trait Mailer: Send + Sync + 'static {
    /// Renders `template` with `variables` and sends it to `recipients`.
    fn send_templated_email(
        &self,
        recipients: &[String],
        template: &str,
        subject: &str,
        variables: BTreeMap<String, String>,
    ) -> impl Future<Output = Result<(), MailError>> + Send;
}

/// One message handed to a [`RecordingMailer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub recipients: Vec<String>,
    pub template: String,
    pub subject: String,
    pub variables: BTreeMap<String, String>,
}

/// A [`Mailer`] that logs and keeps every message instead of sending it.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
    failing: AtomicBool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following send fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Everything sent so far, oldest first.
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().clone()
    }

    /// The most recent message.
    pub fn last(&self) -> Option<SentMail> {
        self.sent.lock().last().cloned()
    }
}

impl Mailer for RecordingMailer {
    fn send_templated_email(
        &self,
        recipients: &[String],
        template: &str,
        subject: &str,
        variables: BTreeMap<String, String>,
    ) -> impl Future<Output = Result<(), MailError>> + Send {
        if self.failing.load(Ordering::SeqCst) {
            return ready(Err(MailError::Delivery("mailer is failing".into())));
        }

        tracing::info!(?recipients, template, subject, "email recorded");
        self.sent.lock().push(SentMail {
            recipients: recipients.to_vec(),
            template: template.to_string(),
            subject: subject.to_string(),
            variables,
        });
        ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_mailer_keeps_messages() {
        let mailer = RecordingMailer::new();
        let vars = BTreeMap::from([("Code".to_string(), "abc".to_string())]);

        mailer
            .send_templated_email(&["a@example.com".into()], "t.html", "Hi", vars.clone())
            .await
            .unwrap();

        let last = mailer.last().unwrap();
        assert_eq!(last.recipients, vec!["a@example.com".to_string()]);
        assert_eq!(last.template, "t.html");
        assert_eq!(last.variables, vars);
    }

    #[tokio::test]
    async fn test_recording_mailer_failing_records_nothing() {
        let mailer = RecordingMailer::new();
        mailer.set_failing(true);

        let result = mailer
            .send_templated_email(&["a@example.com".into()], "t.html", "Hi", BTreeMap::new())
            .await;

        assert!(matches!(result, Err(MailError::Delivery(_))));
        assert!(mailer.sent().is_empty());
    }
}

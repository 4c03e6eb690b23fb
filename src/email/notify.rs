//! Fire-and-forget notification dispatch.
//!
//! Submission handlers return to the caller as soon as the record is
//! persisted; dispatch runs in a spawned task and every message produces one
//! structured outcome event (`outcome = sent | failed | skipped`). A failed
//! or skipped dispatch never rolls back or surfaces to the submitter.

use uuid::Uuid;

use crate::db::models::{Feedback, Lead, SmtpSettings};
use crate::email::{templates, Mailer, OutgoingEmail, SmtpMailer};

/// Spawn admin + confirmation emails for a freshly persisted lead.
pub fn spawn_lead_notifications(lead: Lead) {
    tokio::spawn(async move {
        let Some(settings) = resolve_settings("lead", lead.id).await else {
            return;
        };
        let mailer = match SmtpMailer::new(&settings) {
            Ok(m) => m,
            Err(e) => {
                tracing::error!(
                    record_id = %lead.id,
                    outcome = "failed",
                    reason = %e,
                    "could not build SMTP transport for lead notifications"
                );
                return;
            }
        };
        // lettre's transport blocks; keep the async executor free.
        let record_id = lead.id;
        if let Err(e) =
            tokio::task::spawn_blocking(move || dispatch_lead_emails(&mailer, &settings, &lead))
                .await
        {
            tracing::error!(record_id = %record_id, "lead notification task panicked: {}", e);
        }
    });
}

/// Spawn admin + confirmation emails for freshly persisted feedback.
pub fn spawn_feedback_notifications(feedback: Feedback) {
    tokio::spawn(async move {
        let Some(settings) = resolve_settings("feedback", feedback.id).await else {
            return;
        };
        let mailer = match SmtpMailer::new(&settings) {
            Ok(m) => m,
            Err(e) => {
                tracing::error!(
                    record_id = %feedback.id,
                    outcome = "failed",
                    reason = %e,
                    "could not build SMTP transport for feedback notifications"
                );
                return;
            }
        };
        let record_id = feedback.id;
        if let Err(e) = tokio::task::spawn_blocking(move || {
            dispatch_feedback_emails(&mailer, &settings, &feedback)
        })
        .await
        {
            tracing::error!(record_id = %record_id, "feedback notification task panicked: {}", e);
        }
    });
}

/// Resolve the active SMTP settings row. A missing row is not an error for
/// the pipeline; it is logged as a skip and dispatch ends there.
async fn resolve_settings(kind: &str, record_id: Uuid) -> Option<SmtpSettings> {
    let Some(pool) = crate::db::get_pool() else {
        tracing::warn!(
            record_id = %record_id,
            kind = kind,
            outcome = "skipped",
            reason = "database pool not initialized",
            "notification emails skipped"
        );
        return None;
    };

    match crate::db::active_smtp_settings(pool.as_ref()).await {
        Ok(Some(settings)) => Some(settings),
        Ok(None) => {
            tracing::warn!(
                record_id = %record_id,
                kind = kind,
                outcome = "skipped",
                reason = "no active SMTP configuration",
                "notification emails skipped"
            );
            None
        }
        Err(e) => {
            tracing::error!(
                record_id = %record_id,
                kind = kind,
                outcome = "failed",
                reason = %e,
                "could not load SMTP configuration"
            );
            None
        }
    }
}

/// Send both lead emails through the given mailer. Transport errors are
/// contained here; the function never propagates them.
pub fn dispatch_lead_emails(mailer: &dyn Mailer, settings: &SmtpSettings, lead: &Lead) {
    let admin = templates::lead_admin_email(lead, settings);
    send_logged(mailer, &admin, "lead-admin-notification", lead.id);

    match templates::lead_confirmation_email(lead, settings) {
        Some(confirmation) => {
            send_logged(mailer, &confirmation, "lead-confirmation", lead.id);
        }
        None => {
            tracing::info!(
                record_id = %lead.id,
                email = "lead-confirmation",
                outcome = "skipped",
                reason = "no submitter email",
                "confirmation email skipped"
            );
        }
    }
}

/// Send both feedback emails. The confirmation is skipped for anonymous
/// submissions and when no email was supplied.
pub fn dispatch_feedback_emails(mailer: &dyn Mailer, settings: &SmtpSettings, feedback: &Feedback) {
    let admin = templates::feedback_admin_email(feedback, settings);
    send_logged(mailer, &admin, "feedback-admin-notification", feedback.id);

    match templates::feedback_confirmation_email(feedback, settings) {
        Some(confirmation) => {
            send_logged(mailer, &confirmation, "feedback-confirmation", feedback.id);
        }
        None => {
            tracing::info!(
                record_id = %feedback.id,
                email = "feedback-confirmation",
                outcome = "skipped",
                reason = "anonymous or no submitter email",
                "confirmation email skipped"
            );
        }
    }
}

fn send_logged(mailer: &dyn Mailer, email: &OutgoingEmail, kind: &str, record_id: Uuid) {
    match mailer.send(email) {
        Ok(()) => {
            tracing::info!(
                record_id = %record_id,
                email = kind,
                to = %email.to,
                outcome = "sent",
                "notification email sent"
            );
        }
        Err(e) => {
            tracing::error!(
                record_id = %record_id,
                email = kind,
                to = %email.to,
                outcome = "failed",
                reason = %e,
                "notification email failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::{test_settings, MailError};
    use chrono::Utc;
    use std::sync::Mutex;

    struct MockMailer {
        sent: Mutex<Vec<OutgoingEmail>>,
        fail: bool,
    }

    impl MockMailer {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        fn sent(&self) -> Vec<OutgoingEmail> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Mailer for MockMailer {
        fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
            if self.fail {
                return Err(MailError::Address(
                    "broken transport".parse::<lettre::Address>().unwrap_err(),
                ));
            }
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    fn lead_with_email(email: &str) -> Lead {
        Lead {
            id: uuid::Uuid::new_v4(),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            email: email.to_string(),
            phone: None,
            subject: "Quote".to_string(),
            message: "Hello".to_string(),
            notes: None,
            estimated_cost: None,
            review_link: None,
            status: "new".to_string(),
            priority: "medium".to_string(),
            source: "website".to_string(),
            submitted_at: Utc::now(),
            last_updated: Utc::now(),
        }
    }

    fn feedback(is_anonymous: bool, email: &str) -> Feedback {
        Feedback {
            id: uuid::Uuid::new_v4(),
            feedback_type: "suggestion".to_string(),
            feedback: "More photos please".to_string(),
            is_anonymous,
            name: if is_anonymous { "Anonymous" } else { "Sam" }.to_string(),
            email: email.to_string(),
            phone: String::new(),
            resolution: None,
            admin_notes: None,
            status: "new".to_string(),
            submitted_at: Utc::now(),
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn test_lead_dispatch_sends_admin_and_confirmation() {
        let mailer = MockMailer::new();
        let settings = test_settings();
        dispatch_lead_emails(&mailer, &settings, &lead_with_email("jane@example.com"));

        let sent = mailer.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].to, "sales@example.com");
        assert_eq!(sent[1].to, "jane@example.com");
    }

    #[test]
    fn test_anonymous_feedback_sends_admin_only() {
        let mailer = MockMailer::new();
        let settings = test_settings();
        dispatch_feedback_emails(&mailer, &settings, &feedback(true, ""));

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "sales@example.com");
    }

    #[test]
    fn test_feedback_without_email_sends_admin_only() {
        let mailer = MockMailer::new();
        let settings = test_settings();
        dispatch_feedback_emails(&mailer, &settings, &feedback(false, ""));

        assert_eq!(mailer.sent().len(), 1);
    }

    #[test]
    fn test_feedback_with_email_sends_both() {
        let mailer = MockMailer::new();
        let settings = test_settings();
        dispatch_feedback_emails(&mailer, &settings, &feedback(false, "sam@example.com"));

        let sent = mailer.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].to, "sam@example.com");
    }

    #[test]
    fn test_transport_failure_is_contained() {
        // A throwing transport must not panic or propagate; the submission
        // handler has already responded by the time dispatch runs.
        let mailer = MockMailer::failing();
        let settings = test_settings();
        dispatch_lead_emails(&mailer, &settings, &lead_with_email("jane@example.com"));
        dispatch_feedback_emails(&mailer, &settings, &feedback(false, "sam@example.com"));
        assert!(mailer.sent().is_empty());
    }
}

//! Templated transactional email bodies.
//!
//! Pure functions mapping a persisted record plus the resolved SMTP settings
//! to an [`OutgoingEmail`]. Optional fields are guarded: a missing value
//! omits its HTML fragment entirely, so templating never fails.

use crate::db::models::{Feedback, Lead, SmtpSettings};
use crate::email::{from_address, OutgoingEmail};
use chrono::{DateTime, Utc};

/// Display label and accent color per feedback type. Presentation only; any
/// unrecognized value falls back to the "other" entry.
const FEEDBACK_STYLES: &[(&str, &str, &str)] = &[
    ("compliment", "Compliment", "#16a34a"),
    ("suggestion", "Suggestion", "#2563eb"),
    ("concern", "Concern", "#d97706"),
    ("complaint", "Complaint", "#dc2626"),
    ("other", "Other", "#6b7280"),
];

pub fn feedback_style(feedback_type: &str) -> (&'static str, &'static str) {
    FEEDBACK_STYLES
        .iter()
        .find(|(key, _, _)| *key == feedback_type)
        .or_else(|| FEEDBACK_STYLES.iter().find(|(key, _, _)| *key == "other"))
        .map(|(_, label, color)| (*label, *color))
        .unwrap_or(("Other", "#6b7280"))
}

/// Submission timestamps are always rendered in this fixed UTC format,
/// independent of server locale.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%d %b %Y, %H:%M UTC").to_string()
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn detail_row(label: &str, value: &str) -> String {
    format!(
        "<tr><td style=\"padding:4px 12px 4px 0;color:#6b7280;white-space:nowrap\">{}</td>\
         <td style=\"padding:4px 0\">{}</td></tr>",
        label,
        escape_html(value)
    )
}

fn wrap_body(accent: &str, heading: &str, inner: &str) -> String {
    format!(
        "<div style=\"font-family:Arial,Helvetica,sans-serif;max-width:600px;margin:0 auto\">\
         <div style=\"background:{accent};color:#ffffff;padding:16px 24px;border-radius:6px 6px 0 0\">\
         <h2 style=\"margin:0;font-size:18px\">{heading}</h2></div>\
         <div style=\"border:1px solid #e5e7eb;border-top:none;padding:24px;border-radius:0 0 6px 6px\">\
         {inner}</div></div>"
    )
}

/// Admin notification for a new lead.
pub fn lead_admin_email(lead: &Lead, settings: &SmtpSettings) -> OutgoingEmail {
    let full_name = format!("{} {}", lead.first_name, lead.last_name);
    let subject = format!("New enquiry: {} (from {})", lead.subject, full_name);

    let mut rows = String::new();
    rows.push_str(&detail_row("Name", &full_name));
    rows.push_str(&detail_row("Email", &lead.email));
    if let Some(phone) = &lead.phone {
        if !phone.is_empty() {
            rows.push_str(&detail_row("Phone", phone));
        }
    }
    rows.push_str(&detail_row("Subject", &lead.subject));
    rows.push_str(&detail_row("Priority", &lead.priority));
    rows.push_str(&detail_row("Source", &lead.source));
    rows.push_str(&detail_row("Reference", &lead.id.to_string()));
    rows.push_str(&detail_row("Submitted", &format_timestamp(&lead.submitted_at)));

    let inner = format!(
        "<table style=\"border-collapse:collapse;font-size:14px\">{}</table>\
         <p style=\"margin-top:16px;font-size:14px;white-space:pre-wrap\">{}</p>",
        rows,
        escape_html(&lead.message)
    );

    OutgoingEmail {
        from: from_address(settings),
        to: settings.admin_email.clone(),
        subject,
        html: wrap_body("#1e3a5f", "New website enquiry", &inner),
    }
}

/// Confirmation for the lead submitter. `None` when no email was supplied.
pub fn lead_confirmation_email(lead: &Lead, settings: &SmtpSettings) -> Option<OutgoingEmail> {
    if lead.email.trim().is_empty() {
        return None;
    }

    let inner = format!(
        "<p style=\"font-size:14px\">Hi {},</p>\
         <p style=\"font-size:14px\">Thank you for getting in touch. We have received your \
         enquiry and a member of our team will respond within one business day.</p>\
         <table style=\"border-collapse:collapse;font-size:14px\">{}{}</table>",
        escape_html(&lead.first_name),
        detail_row("Subject", &lead.subject),
        detail_row("Message", &lead.message),
    );

    Some(OutgoingEmail {
        from: from_address(settings),
        to: lead.email.clone(),
        subject: "We received your enquiry".to_string(),
        html: wrap_body("#1e3a5f", "Thanks for contacting us", &inner),
    })
}

/// Admin notification for new feedback.
pub fn feedback_admin_email(feedback: &Feedback, settings: &SmtpSettings) -> OutgoingEmail {
    let (label, accent) = feedback_style(&feedback.feedback_type);
    let from_whom = if feedback.is_anonymous || feedback.name.is_empty() {
        "Anonymous".to_string()
    } else {
        feedback.name.clone()
    };

    let mut rows = String::new();
    rows.push_str(&detail_row("Type", label));
    rows.push_str(&detail_row("From", &from_whom));
    if !feedback.email.is_empty() {
        rows.push_str(&detail_row("Email", &feedback.email));
    }
    if !feedback.phone.is_empty() {
        rows.push_str(&detail_row("Phone", &feedback.phone));
    }
    if let Some(resolution) = &feedback.resolution {
        if !resolution.is_empty() {
            rows.push_str(&detail_row("Requested resolution", resolution));
        }
    }
    rows.push_str(&detail_row("Reference", &feedback.id.to_string()));
    rows.push_str(&detail_row(
        "Submitted",
        &format_timestamp(&feedback.submitted_at),
    ));

    let inner = format!(
        "<table style=\"border-collapse:collapse;font-size:14px\">{}</table>\
         <p style=\"margin-top:16px;font-size:14px;white-space:pre-wrap\">{}</p>",
        rows,
        escape_html(&feedback.feedback)
    );

    OutgoingEmail {
        from: from_address(settings),
        to: settings.admin_email.clone(),
        subject: format!("New feedback received: {}", label),
        html: wrap_body(accent, &format!("New {}", label.to_lowercase()), &inner),
    }
}

/// Confirmation for the feedback submitter. `None` when the submission is
/// anonymous or no email was supplied.
pub fn feedback_confirmation_email(
    feedback: &Feedback,
    settings: &SmtpSettings,
) -> Option<OutgoingEmail> {
    if feedback.is_anonymous || feedback.email.trim().is_empty() {
        return None;
    }

    let (label, accent) = feedback_style(&feedback.feedback_type);
    let inner = format!(
        "<p style=\"font-size:14px\">Hi {},</p>\
         <p style=\"font-size:14px\">Thank you for your {}. We read every piece of feedback \
         and will follow up if a response is needed.</p>\
         <table style=\"border-collapse:collapse;font-size:14px\">{}</table>",
        escape_html(&feedback.name),
        label.to_lowercase(),
        detail_row("Your message", &feedback.feedback),
    );

    Some(OutgoingEmail {
        from: from_address(settings),
        to: feedback.email.clone(),
        subject: "We received your feedback".to_string(),
        html: wrap_body(accent, "Thanks for your feedback", &inner),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::test_settings;
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_lead() -> Lead {
        Lead {
            id: Uuid::new_v4(),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            email: "jane@example.com".to_string(),
            phone: None,
            subject: "Curtain wall quote".to_string(),
            message: "Please call me about a 12-storey facade.".to_string(),
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

    fn sample_feedback() -> Feedback {
        Feedback {
            id: Uuid::new_v4(),
            feedback_type: "compliment".to_string(),
            feedback: "The new balcony glazing looks great.".to_string(),
            is_anonymous: false,
            name: "Sam".to_string(),
            email: "sam@example.com".to_string(),
            phone: String::new(),
            resolution: None,
            admin_notes: None,
            status: "new".to_string(),
            submitted_at: Utc::now(),
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn test_admin_email_subject_names_lead() {
        let email = lead_admin_email(&sample_lead(), &test_settings());
        assert!(email.subject.contains("Curtain wall quote"));
        assert!(email.subject.contains("Jane Doe"));
        assert_eq!(email.to, "sales@example.com");
    }

    #[test]
    fn test_missing_phone_omits_fragment() {
        let email = lead_admin_email(&sample_lead(), &test_settings());
        assert!(!email.html.contains("Phone"));

        let mut lead = sample_lead();
        lead.phone = Some("+49 151 0000000".to_string());
        let email = lead_admin_email(&lead, &test_settings());
        assert!(email.html.contains("Phone"));
        assert!(email.html.contains("+49 151 0000000"));
    }

    #[test]
    fn test_admin_email_embeds_record_id_and_timestamp() {
        let lead = sample_lead();
        let email = lead_admin_email(&lead, &test_settings());
        assert!(email.html.contains(&lead.id.to_string()));
        assert!(email.html.contains("UTC"));
    }

    #[test]
    fn test_lead_confirmation_echoes_subject_and_message() {
        let lead = sample_lead();
        let email = lead_confirmation_email(&lead, &test_settings()).unwrap();
        assert_eq!(email.to, "jane@example.com");
        assert!(email.html.contains("Curtain wall quote"));
        assert!(email.html.contains("12-storey facade"));
    }

    #[test]
    fn test_unknown_feedback_type_falls_back_to_other() {
        assert_eq!(feedback_style("complaint").0, "Complaint");
        assert_eq!(feedback_style("spam"), feedback_style("other"));
    }

    #[test]
    fn test_anonymous_feedback_gets_no_confirmation() {
        let mut feedback = sample_feedback();
        feedback.is_anonymous = true;
        feedback.name = "Anonymous".to_string();
        feedback.email = String::new();
        assert!(feedback_confirmation_email(&feedback, &test_settings()).is_none());

        let admin = feedback_admin_email(&feedback, &test_settings());
        assert!(admin.html.contains("Anonymous"));
    }

    #[test]
    fn test_feedback_without_email_gets_no_confirmation() {
        let mut feedback = sample_feedback();
        feedback.email = String::new();
        assert!(feedback_confirmation_email(&feedback, &test_settings()).is_none());
    }

    #[test]
    fn test_message_content_is_escaped() {
        let mut lead = sample_lead();
        lead.message = "<script>alert(1)</script>".to_string();
        let email = lead_admin_email(&lead, &test_settings());
        assert!(!email.html.contains("<script>"));
        assert!(email.html.contains("&lt;script&gt;"));
    }
}

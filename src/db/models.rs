//! Database Models - structs representing database tables (used by sqlx/serde).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Allowed lead status values. No transition rules are enforced; an admin
/// may set any member at any time.
pub const LEAD_STATUSES: &[&str] = &[
    "new",
    "contacted",
    "consulting",
    "confirmed",
    "completed",
    "cancelled",
];

/// Allowed lead priority values.
pub const LEAD_PRIORITIES: &[&str] = &["low", "medium", "high"];

/// Allowed lead source values.
pub const LEAD_SOURCES: &[&str] = &["website", "whatsapp", "phone", "referral"];

/// Allowed feedback type values.
pub const FEEDBACK_TYPES: &[&str] = &["compliment", "suggestion", "concern", "complaint", "other"];

/// Allowed feedback status values.
pub const FEEDBACK_STATUSES: &[&str] = &["new", "reviewed", "in-progress", "resolved"];

/// Sales enquiry submitted through the public contact form or entered
/// manually by an admin.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
    pub notes: Option<String>,
    pub estimated_cost: Option<String>,
    pub review_link: Option<String>,
    pub status: String,
    pub priority: String,
    pub source: String,
    pub submitted_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// Customer feedback, optionally anonymous. When `is_anonymous` is set the
/// identity columns hold "Anonymous"/""/"" regardless of what was submitted.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub id: Uuid,
    pub feedback_type: String,
    pub feedback: String,
    pub is_anonymous: bool,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub resolution: Option<String>,
    pub admin_notes: Option<String>,
    pub status: String,
    pub submitted_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// Blog post model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub image_url: String,
    pub gallery: Vec<String>,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub seo_keywords: Option<String>,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Testimonial model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Testimonial {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub role: Option<String>,
    pub quote: String,
    pub rating: i32,
    pub avatar_url: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Portfolio project model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioProject {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub image_url: String,
    pub gallery: Vec<String>,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub seo_keywords: Option<String>,
    pub display_order: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored SMTP configuration. The most recently updated active row drives
/// notification dispatch; with no active row all notification emails are
/// skipped.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmtpSettings {
    pub id: Uuid,
    pub host: String,
    pub port: i32,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub from_email: String,
    pub from_name: Option<String>,
    pub admin_email: String,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

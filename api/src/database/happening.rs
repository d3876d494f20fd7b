use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Moderation state of a happening. Only approved rows are visible to the
/// public listing.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum HappeningStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

super::text_enum!(HappeningStatus, {
    HappeningStatus::Pending => "pending",
    HappeningStatus::Approved => "approved",
    HappeningStatus::Rejected => "rejected",
});

#[derive(Debug, Clone, Default, sqlx::FromRow, serde::Serialize)]
pub struct Happening {
    /// The unique identifier for the happening.
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// When the happening starts.
    pub start_datetime: DateTime<Utc>,
    /// When the happening ends, if known.
    pub end_datetime: Option<DateTime<Utc>>,
    /// Free-form venue or address text.
    pub location: Option<String>,
    /// Where the happening was found, if it was scraped or referenced.
    pub source_url: Option<String>,
    /// The user that submitted the happening.
    pub submitter_user_id: Uuid,
    /// The moderation state.
    pub status: HappeningStatus,
    /// The extraction attempt this happening was created from, if any.
    pub scrape_log_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

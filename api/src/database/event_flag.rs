use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FlagStatus {
    #[default]
    Pending,
    Resolved,
    Rejected,
}

super::text_enum!(FlagStatus, {
    FlagStatus::Pending => "pending",
    FlagStatus::Resolved => "resolved",
    FlagStatus::Rejected => "rejected",
});

/// A user-submitted correction request against a happening.
#[derive(Debug, Clone, Default, sqlx::FromRow, serde::Serialize)]
pub struct EventFlag {
    pub id: Uuid,
    pub happening_id: Uuid,
    pub flagger_user_id: Uuid,
    /// What the flagger wants changed.
    pub changes_requested: String,
    pub status: FlagStatus,
    /// The curator that closed the flag.
    pub resolved_by_user_id: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A flag joined with the title of the happening it targets, for list views.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct EventFlagRow {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub flag: EventFlag,
    pub happening_title: String,
}

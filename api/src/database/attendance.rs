use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    #[default]
    Going,
    MaybeGoing,
}

super::text_enum!(AttendanceStatus, {
    AttendanceStatus::Going => "going",
    AttendanceStatus::MaybeGoing => "maybe_going",
});

/// One user's attendance marker on one happening.
#[derive(Debug, Clone, Default, sqlx::FromRow, serde::Serialize)]
pub struct Attendance {
    pub user_id: Uuid,
    pub happening_id: Uuid,
    pub status: AttendanceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

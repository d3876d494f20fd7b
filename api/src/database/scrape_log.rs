use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Audit record of one extraction attempt, success or failure.
#[derive(Debug, Clone, Default, sqlx::FromRow, serde::Serialize)]
pub struct ScrapeLog {
    pub id: Uuid,
    /// The user that requested the extraction.
    pub requested_by_user_id: Uuid,
    /// The url that was scraped.
    pub url_scraped: String,
    /// The custom instruction that matched the url, if any.
    pub custom_instruction_id_used: Option<Uuid>,
    /// Whether a headless browser render was requested.
    pub playwright_flag_used: bool,
    /// The extractor's response, verbatim. A JSON string when the response
    /// was not valid JSON.
    pub raw_llm_response: Option<serde_json::Value>,
    /// The event fields recognized in the response, if any.
    pub parsed_event_data: Option<serde_json::Value>,
    pub error_message: Option<String>,
    /// Set by the requester when the extraction produced garbage.
    pub is_reported_bad: bool,
    pub created_at: DateTime<Utc>,
}

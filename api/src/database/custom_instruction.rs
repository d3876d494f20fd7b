use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A stored extraction rule: which urls it applies to and how matching pages
/// should be fetched and interpreted.
#[derive(Debug, Clone, Default, sqlx::FromRow, serde::Serialize)]
pub struct CustomInstruction {
    pub id: Uuid,
    /// Whole-url wildcard pattern. `*` matches any run of characters, every
    /// other character matches literally.
    pub url_pattern: String,
    /// Free-text guidance forwarded to the extractor.
    pub instructions_text: Option<String>,
    /// Whether the extractor should render the page in a headless browser
    /// before extraction.
    pub use_playwright: bool,
    /// Higher priority rules win when multiple patterns match.
    pub priority: i32,
    /// Inactive rules are never selected.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CustomInstruction {
    pub fn matches_url(&self, url: &str) -> bool {
        pattern_matches(&self.url_pattern, url)
    }
}

/// Compile a wildcard pattern into an anchored regex.
pub fn compile_pattern(pattern: &str) -> Result<regex::Regex, regex::Error> {
    let expr = format!(
        "^{}$",
        pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*")
    );

    regex::Regex::new(&expr)
}

/// Whether the url matches the wildcard pattern. A pattern that fails to
/// compile never matches.
pub fn pattern_matches(pattern: &str, url: &str) -> bool {
    match compile_pattern(pattern) {
        Ok(regex) => regex.is_match(url),
        Err(err) => {
            tracing::warn!(pattern = pattern, error = %err, "skipping invalid url pattern");
            false
        }
    }
}

/// The first active instruction whose pattern matches the url. Callers pass
/// rows ordered by priority descending, so the first match is the winner.
pub fn select_instruction<'a>(
    instructions: &'a [CustomInstruction],
    url: &str,
) -> Option<&'a CustomInstruction> {
    instructions
        .iter()
        .filter(|instruction| instruction.is_active)
        .find(|instruction| instruction.matches_url(url))
}

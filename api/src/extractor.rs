use serde_json::Value;

use crate::database::CustomInstruction;
use crate::global::GlobalState;

/// The fields the extractor is expected to produce. A response carrying at
/// least one of them counts as a parsed event.
const EVENT_FIELDS: [&str; 5] = [
    "title",
    "description",
    "start_datetime",
    "end_datetime",
    "location",
];

#[derive(Debug, serde::Serialize)]
struct ExtractorRequest<'a> {
    url: &'a str,
    use_playwright: bool,
    custom_instructions_text: Option<&'a str>,
}

/// What one extraction attempt produced, exactly as it will be logged.
#[derive(Debug, Default)]
pub struct ExtractionOutcome {
    /// The extractor's response, verbatim. A JSON string when the body was
    /// not valid JSON, `None` when the request itself failed.
    pub raw_response: Option<Value>,
    /// The full response object, when it carried event fields.
    pub parsed_event: Option<Value>,
    pub error: Option<String>,
}

fn failed(error: String) -> ExtractionOutcome {
    ExtractionOutcome {
        error: Some(error),
        ..Default::default()
    }
}

fn has_event_fields(value: &Value) -> bool {
    EVENT_FIELDS.iter().any(|key| match value.get(key) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    })
}

/// Send one extraction request. Single attempt, no retries; every failure
/// mode collapses into an error string for the scrape log.
pub async fn extract(
    global: &GlobalState,
    url: &str,
    instruction: Option<&CustomInstruction>,
) -> ExtractionOutcome {
    let config = &global.config.extractor;

    let use_playwright = instruction.map(|i| i.use_playwright).unwrap_or(false);
    let custom_instructions_text = instruction.and_then(|i| i.instructions_text.as_deref());

    tracing::info!(
        url = url,
        playwright = use_playwright,
        instruction = ?instruction.map(|i| i.id),
        "requesting extraction"
    );

    let client = match reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.timeout))
        .build()
    {
        Ok(client) => client,
        Err(err) => return failed(format!("failed to build http client: {err}")),
    };

    let response = match client
        .post(&config.url)
        .json(&ExtractorRequest {
            url,
            use_playwright,
            custom_instructions_text,
        })
        .send()
        .await
    {
        Ok(response) => response,
        Err(err) => return failed(format!("extractor request failed: {err}")),
    };

    let status = response.status();

    // Read the body as text first so the raw payload survives even when it
    // is not the JSON we asked for.
    let text = match response.text().await {
        Ok(text) => text,
        Err(err) => return failed(format!("failed to read extractor response: {err}")),
    };

    let mut outcome = ExtractionOutcome::default();

    match serde_json::from_str::<Value>(&text) {
        Ok(value) => {
            if has_event_fields(&value) {
                outcome.parsed_event = Some(value.clone());
            } else if let Some(error) = value.get("error").and_then(Value::as_str) {
                let details = value.get("details").and_then(Value::as_str).unwrap_or_default();
                outcome.error = Some(format!("{error}: {details}"));
            }
            outcome.raw_response = Some(value);
        }
        Err(err) => {
            tracing::debug!(error = %err, "extractor response is not json");
            outcome.raw_response = Some(Value::String(text));
            outcome.error = Some(format!("failed to parse response: {status}"));
        }
    }

    if !status.is_success() && outcome.error.is_none() {
        outcome.error = Some(format!("extractor returned status {status}"));
    }

    outcome
}

use std::str::FromStr;

use anyhow::Context as _;
use tracing_subscriber::EnvFilter;

/// Output format for the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Default,
    Compact,
    Pretty,
    Json,
}

pub fn init(level: &str, mode: Mode) -> anyhow::Result<()> {
    let filter = EnvFilter::from_str(level).context("failed to parse log level")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(true)
        .with_line_number(true);

    match mode {
        Mode::Default => builder.try_init(),
        Mode::Compact => builder.compact().try_init(),
        Mode::Pretty => builder.pretty().try_init(),
        Mode::Json => builder.json().try_init(),
    }
    .map_err(|err| anyhow::anyhow!("failed to init logger: {err}"))?;

    Ok(())
}

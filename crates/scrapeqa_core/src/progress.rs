use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Starting,
    Fetching,
    Processing,
    Complete,
    /// One URL failed; the run continues with the next one.
    Error,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Complete)
    }
}

/// One push notification from the scrape pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub phase: Phase,
    #[serde(default)]
    pub current: u64,
    #[serde(default)]
    pub total: u64,
    #[serde(
        default,
        alias = "subject_url",
        alias = "url",
        skip_serializing_if = "Option::is_none"
    )]
    pub subject_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProgressEvent {
    /// Completion ratio in whole percent, rounded down.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return if self.phase == Phase::Complete { 100 } else { 0 };
        }
        let ratio = self.current.saturating_mul(100) / self.total;
        ratio.min(100) as u8
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgressParseError {
    #[error("malformed progress payload: {0}")]
    Json(String),
    #[error("progress current {current} exceeds total {total}")]
    CurrentExceedsTotal { current: u64, total: u64 },
}

pub fn parse_progress_event(payload: &str) -> Result<ProgressEvent, ProgressParseError> {
    let event: ProgressEvent =
        serde_json::from_str(payload).map_err(|err| ProgressParseError::Json(err.to_string()))?;
    if event.total > 0 && event.current > event.total {
        return Err(ProgressParseError::CurrentExceedsTotal {
            current: event.current,
            total: event.total,
        });
    }
    Ok(event)
}

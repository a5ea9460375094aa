use dog_watcher_core::BackupOutcome;
use serde::{Deserialize, Serialize};

pub const DEFAULT_EVENT_TAGS: [&str; 1] = ["env:datadog"];

const EVENT_TITLE: &str = "DataDog Dashboard Backup";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Success,
    Error,
    Info,
}

/// Body of a `POST events` request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    pub title: String,
    pub text: String,
    pub priority: String,
    pub tags: Vec<String>,
    pub alert_type: AlertType,
}

/// Builds the event reporting a run's outcome. `detail` is appended to the text.
pub fn build_event(outcome: &BackupOutcome, detail: Option<&str>, tags: &[String]) -> Event {
    let (alert_type, result) = match outcome {
        BackupOutcome::Success => (AlertType::Success, "succeeded."),
        BackupOutcome::Failure { .. } => (AlertType::Error, "failed."),
        BackupOutcome::Noop => (AlertType::Info, "was attempted."),
    };

    let mut text = format!("DataDog dashboard backup {result}");
    if let Some(detail) = detail.filter(|d| !d.is_empty()) {
        text.push(' ');
        text.push_str(detail);
    }

    Event {
        title: EVENT_TITLE.to_owned(),
        text,
        priority: "normal".to_owned(),
        tags: tags.to_vec(),
        alert_type,
    }
}

use std::path::{Path, PathBuf};

use dog_watcher_core::{BackupOutcome, BoardKind, ExportItem};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::fs;
use tracing::{debug, info};

use crate::client::{ApiClient, ExportError};
use crate::event::build_event;

/// Board detail requests allowed in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 8;

const MONITORS_DIR: &str = "monitors";
const MONITORS_FILE: &str = "monitors.json";
/// Current alert state; it changes constantly and would show up as a diff on every run.
const MONITOR_STATE_FIELD: &str = "overall_state";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub dash: usize,
    pub screen: usize,
    pub monitors: usize,
}

/// The remote half of a backup run.
#[async_trait::async_trait]
pub trait Exporter: Send + Sync {
    /// Write every collection under `output_dir`.
    async fn export_all(&self, output_dir: &Path) -> Result<ExportSummary, ExportError>;

    /// Report a run's outcome to the remote service.
    async fn notify(&self, outcome: &BackupOutcome, detail: Option<&str>) -> Result<(), ExportError>;
}

#[derive(Debug, Clone)]
pub struct RemoteExporter {
    client: ApiClient,
    concurrency: usize,
    event_tags: Vec<String>,
}

impl RemoteExporter {
    pub fn new(client: ApiClient, concurrency: usize, event_tags: Vec<String>) -> Self {
        Self {
            client,
            concurrency: concurrency.max(1),
            event_tags,
        }
    }

    /// Replace `output_dir/<kind>` with one file per board currently on the remote side.
    pub async fn fetch_collection(
        &self,
        kind: BoardKind,
        output_dir: &Path,
    ) -> Result<usize, ExportError> {
        let target = output_dir.join(kind.dir_name());
        clear_dir(&target).await?;

        let path = kind.api_path();
        let list = self.client.get(path).await?;
        let items = parse_items(&list, kind, path)?;
        debug!(%kind, count = items.len(), "listed boards");

        let requests: Vec<_> = items
            .iter()
            .map(|item| self.fetch_board(kind, item, &target))
            .collect();
        let mut fetches = stream::iter(requests).buffer_unordered(self.concurrency);

        let mut written = 0;
        while let Some(result) = fetches.next().await {
            result?;
            written += 1;
        }

        info!(%kind, written, "exported boards");
        Ok(written)
    }

    /// Replace `output_dir/monitors/monitors.json` with the current monitor list.
    pub async fn fetch_monitors(&self, output_dir: &Path) -> Result<usize, ExportError> {
        let target = output_dir.join(MONITORS_DIR);
        clear_dir(&target).await?;

        let path = "monitor";
        let mut monitors = match self.client.get(path).await? {
            Value::Array(monitors) => monitors,
            other => {
                return Err(ExportError::UnexpectedShape {
                    path: path.to_owned(),
                    detail: format!("expected an array, got {}", json_kind(&other)),
                })
            }
        };
        for monitor in &mut monitors {
            if let Some(fields) = monitor.as_object_mut() {
                fields.remove(MONITOR_STATE_FIELD);
            }
        }

        write_json(&target.join(MONITORS_FILE), &monitors).await?;
        info!(count = monitors.len(), "exported monitors");
        Ok(monitors.len())
    }

    async fn fetch_board(
        &self,
        kind: BoardKind,
        item: &ExportItem,
        target: &Path,
    ) -> Result<(), ExportError> {
        let board = self
            .client
            .get(&format!("{}/{}", kind.api_path(), item.id))
            .await?;
        write_json(&target.join(item.file_name()), &board).await?;
        debug!(%kind, id = %item.id, title = ?item.title, "got board");
        Ok(())
    }
}

#[async_trait::async_trait]
impl Exporter for RemoteExporter {
    async fn export_all(&self, output_dir: &Path) -> Result<ExportSummary, ExportError> {
        Ok(ExportSummary {
            dash: self.fetch_collection(BoardKind::Dash, output_dir).await?,
            screen: self.fetch_collection(BoardKind::Screen, output_dir).await?,
            monitors: self.fetch_monitors(output_dir).await?,
        })
    }

    async fn notify(&self, outcome: &BackupOutcome, detail: Option<&str>) -> Result<(), ExportError> {
        let event = build_event(outcome, detail, &self.event_tags);
        let payload = serde_json::to_value(&event).map_err(|source| ExportError::Encode {
            path: PathBuf::from("events"),
            source,
        })?;
        self.client.post("events", &payload).await?;
        debug!(alert_type = ?event.alert_type, "event sent");
        Ok(())
    }
}

fn parse_items(list: &Value, kind: BoardKind, path: &str) -> Result<Vec<ExportItem>, ExportError> {
    let field = kind.list_field();
    let raw = list
        .get(field)
        .ok_or_else(|| ExportError::UnexpectedShape {
            path: path.to_owned(),
            detail: format!("missing `{field}`"),
        })?;
    serde_json::from_value(raw.clone()).map_err(|e| ExportError::UnexpectedShape {
        path: path.to_owned(),
        detail: format!("`{field}`: {e}"),
    })
}

/// Make `dir` exist and be empty.
async fn clear_dir(dir: &Path) -> Result<(), ExportError> {
    let io_err = |source| ExportError::Io {
        path: dir.to_path_buf(),
        source,
    };
    fs::create_dir_all(dir).await.map_err(io_err)?;

    let mut entries = fs::read_dir(dir).await.map_err(io_err)?;
    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        let path = entry.path();
        let is_dir = entry
            .file_type()
            .await
            .map(|t| t.is_dir())
            .unwrap_or(false);
        let removed = if is_dir {
            fs::remove_dir_all(&path).await
        } else {
            fs::remove_file(&path).await
        };
        removed.map_err(|source| ExportError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "removed stale export");
    }
    Ok(())
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ExportError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|source| ExportError::Encode {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, bytes).await.map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

mod client;
mod event;
mod exporter;

pub use client::{ApiClient, ApiConfig, ExportError, DEFAULT_BASE_URL};
pub use event::{build_event, AlertType, Event, DEFAULT_EVENT_TAGS};
pub use exporter::{ExportSummary, Exporter, RemoteExporter, DEFAULT_CONCURRENCY};

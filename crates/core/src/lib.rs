pub mod backup;
pub mod item;
pub mod slug;

pub use backup::{BackupOutcome, RunFailed, Stage};
pub use item::{BoardKind, ExportItem, ItemId};
pub use slug::slug;

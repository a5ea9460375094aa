pub mod config;
pub mod coordinator;
pub mod schedule;

pub use config::{Config, ConfigError, Settings};
pub use coordinator::{BackupCoordinator, BackupSettings, COMMIT_MESSAGE};
pub use schedule::{scheduler_loop, BackupSchedule};

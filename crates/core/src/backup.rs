use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// States of a single backup run, in the order they are entered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Stage {
    Init,
    WorkspaceAcquired,
    Cloned,
    Exported,
    Committed,
    Pushed,
    Notified,
    Cleaned,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "init",
            Stage::WorkspaceAcquired => "workspace_acquired",
            Stage::Cloned => "cloned",
            Stage::Exported => "exported",
            Stage::Committed => "committed",
            Stage::Pushed => "pushed",
            Stage::Notified => "notified",
            Stage::Cleaned => "cleaned",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Classification of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum BackupOutcome {
    Success,
    /// The commit step found nothing to commit.
    Noop,
    /// `stage` is the state the run was in when the failing transition started.
    Failure { stage: Stage, reason: String },
}

/// Error handed to run callbacks when a backup fails.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("backup failed after stage {stage}: {reason}")]
pub struct RunFailed {
    pub stage: Stage,
    pub reason: String,
}

impl BackupOutcome {
    pub fn failure(stage: Stage, reason: impl Into<String>) -> Self {
        Self::Failure {
            stage,
            reason: reason.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, BackupOutcome::Failure { .. })
    }

    /// Success and Noop are not errors.
    pub fn into_result(self) -> Result<(), RunFailed> {
        match self {
            BackupOutcome::Success | BackupOutcome::Noop => Ok(()),
            BackupOutcome::Failure { stage, reason } => Err(RunFailed { stage, reason }),
        }
    }
}

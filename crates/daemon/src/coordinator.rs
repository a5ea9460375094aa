use std::path::{Path, PathBuf};

use dog_watcher_core::{BackupOutcome, RunFailed, Stage};
use dog_watcher_remote::Exporter;
use dog_watcher_vcs::{VcsError, VcsOutput, VersionControl};
use tempfile::TempDir;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

pub const COMMIT_MESSAGE: &str = "Automatically committed by dog-watcher";

const WORKSPACE_PREFIX: &str = "dog-watcher-work";

#[derive(Debug, Clone)]
pub struct BackupSettings {
    /// Clone URL of the repository the backups are committed to.
    pub repo: String,
    /// Branch to check out and push. `None` keeps whatever the clone selected.
    pub branch: Option<String>,
    pub send_event_on_noop: bool,
    /// Parent of the per-run scratch directories; the system temp dir when unset.
    pub work_root: Option<PathBuf>,
}

/// Why a run stopped before reaching [`Stage::Pushed`].
#[derive(Debug)]
enum Halt {
    Noop(String),
    Failed(String),
}

impl Halt {
    fn failed(err: impl std::fmt::Display) -> Self {
        Halt::Failed(err.to_string())
    }
}

/// Runs the backup pipeline: clone, export, commit and push, then notify and clean up.
pub struct BackupCoordinator<V, E> {
    vcs: V,
    exporter: E,
    settings: BackupSettings,
}

impl<V, E> BackupCoordinator<V, E>
where
    V: VersionControl,
    E: Exporter,
{
    pub fn new(vcs: V, exporter: E, settings: BackupSettings) -> Self {
        Self {
            vcs,
            exporter,
            settings,
        }
    }

    /// Perform one backup. The scratch directory is gone by the time this returns.
    pub async fn run(&self) -> BackupOutcome {
        let run_id = Uuid::new_v4();
        self.run_inner()
            .instrument(info_span!("backup", %run_id))
            .await
    }

    /// Perform one backup and hand its result to `callback`.
    pub async fn run_with<F>(&self, callback: F)
    where
        F: FnOnce(Result<(), RunFailed>),
    {
        callback(self.run().await.into_result());
    }

    async fn run_inner(&self) -> BackupOutcome {
        info!(stage = %Stage::Init, repo = %self.settings.repo, "starting backup");

        let workspace = match self.acquire_workspace() {
            Ok(workspace) => workspace,
            Err(e) => {
                let reason = format!("failed to create work dir: {e}");
                let outcome = BackupOutcome::failure(Stage::Init, reason.clone());
                self.report(&outcome, Some(&reason)).await;
                return outcome;
            }
        };
        debug!(path = %workspace.path().display(), "acquired work dir");

        let (outcome, detail) = match self.drive(workspace.path()).await {
            Ok(()) => (BackupOutcome::Success, None),
            Err((_, Halt::Noop(message))) => (BackupOutcome::Noop, Some(message)),
            Err((stage, Halt::Failed(reason))) => {
                (BackupOutcome::failure(stage, reason.clone()), Some(reason))
            }
        };

        self.report(&outcome, detail.as_deref()).await;
        self.cleanup(workspace);
        info!(stage = %Stage::Done, ?outcome, "backup finished");
        outcome
    }

    fn acquire_workspace(&self) -> std::io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORKSPACE_PREFIX);
        match &self.settings.work_root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
    }

    /// Walk the transitions from a fresh workspace up to a pushed commit.
    async fn drive(&self, work_dir: &Path) -> Result<(), (Stage, Halt)> {
        let mut stage = Stage::WorkspaceAcquired;
        while stage != Stage::Pushed {
            let next = self
                .advance(stage, work_dir)
                .await
                .map_err(|halt| (stage, halt))?;
            info!(from = %stage, to = %next, "stage complete");
            stage = next;
        }
        Ok(())
    }

    async fn advance(&self, stage: Stage, work_dir: &Path) -> Result<Stage, Halt> {
        match stage {
            Stage::WorkspaceAcquired => {
                self.clone_destination(work_dir).await?;
                Ok(Stage::Cloned)
            }
            Stage::Cloned => {
                let summary = self
                    .exporter
                    .export_all(work_dir)
                    .await
                    .map_err(Halt::failed)?;
                info!(
                    dash = summary.dash,
                    screen = summary.screen,
                    monitors = summary.monitors,
                    "export complete"
                );
                Ok(Stage::Exported)
            }
            Stage::Exported => {
                step(self.vcs.stage_all(work_dir).await)?;
                match self.vcs.commit(COMMIT_MESSAGE, work_dir).await {
                    Ok(VcsOutput::Completed(_)) => Ok(Stage::Committed),
                    Ok(VcsOutput::Noop { message, .. }) => Err(Halt::Noop(message)),
                    Err(e) => Err(Halt::failed(e)),
                }
            }
            Stage::Committed => {
                step(
                    self.vcs
                        .push(self.settings.branch.as_deref(), work_dir)
                        .await,
                )?;
                Ok(Stage::Pushed)
            }
            other => Err(Halt::Failed(format!("no transition out of stage {other}"))),
        }
    }

    async fn clone_destination(&self, work_dir: &Path) -> Result<(), Halt> {
        step(self.vcs.clone_into(&self.settings.repo, work_dir).await)?;

        let Some(branch) = self.settings.branch.as_deref() else {
            return Ok(());
        };
        let current = self
            .vcs
            .current_branch(work_dir)
            .await
            .map_err(Halt::failed)?;
        if current.as_deref() != Some(branch) {
            debug!(?current, branch, "checking out configured branch");
            step(self.vcs.checkout(branch, work_dir).await)?;
        }
        Ok(())
    }

    /// Log the classification and send the outcome event. Never changes the outcome.
    async fn report(&self, outcome: &BackupOutcome, detail: Option<&str>) {
        match outcome {
            BackupOutcome::Success => info!("backup succeeded"),
            BackupOutcome::Noop => info!("there was nothing new to commit"),
            BackupOutcome::Failure { stage, reason } => {
                error!(%stage, %reason, "there was an error during the backup attempt")
            }
        }

        if matches!(outcome, BackupOutcome::Noop) && !self.settings.send_event_on_noop {
            info!("no event was sent");
            return;
        }

        match self.exporter.notify(outcome, detail).await {
            Ok(()) => debug!(stage = %Stage::Notified, "event sent"),
            Err(e) => warn!(error = %e, "failed to send backup event"),
        }
    }

    fn cleanup(&self, workspace: TempDir) {
        let path = workspace.path().to_path_buf();
        match workspace.close() {
            Ok(()) => debug!(stage = %Stage::Cleaned, path = %path.display(), "removed work dir"),
            Err(e) => warn!(
                path = %path.display(),
                error = %e,
                "there was an error removing the work dir"
            ),
        }
    }
}

/// A no-op from any step other than commit is unexpected and fails the run.
fn step(result: Result<VcsOutput, VcsError>) -> Result<String, Halt> {
    match result {
        Ok(VcsOutput::Completed(output)) => Ok(output),
        Ok(VcsOutput::Noop { message, .. }) => Err(Halt::Failed(message)),
        Err(e) => Err(Halt::failed(e)),
    }
}

/// Default run callback: log the final result.
pub fn log_result(result: Result<(), RunFailed>) {
    match result {
        Ok(()) => debug!("backup complete"),
        Err(e) => error!(error = %e, "backup failed"),
    }
}

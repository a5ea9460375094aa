use std::path::Path;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VcsOutput {
    /// The command ran and exited successfully.
    Completed(String),
    /// The output matched a no-op indicator, whatever the exit status.
    Noop { message: String, output: String },
}

impl VcsOutput {
    pub fn output(&self) -> &str {
        match self {
            VcsOutput::Completed(output) => output,
            VcsOutput::Noop { output, .. } => output,
        }
    }
}

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`git {}` exited with {status}: {output}", args.join(" "))]
    Failed {
        args: Vec<String>,
        status: String,
        output: String,
    },
}

/// Version-control operations run against a working directory.
///
/// Implementors only provide [`VersionControl::run`]; the pipeline steps are built on top of it.
#[async_trait::async_trait]
pub trait VersionControl: Send + Sync {
    /// Run one subcommand with `work_dir` as the current directory.
    async fn run(&self, args: &[&str], work_dir: &Path) -> Result<VcsOutput, VcsError>;

    /// Clone `repo` into the (empty) `work_dir`.
    async fn clone_into(&self, repo: &str, work_dir: &Path) -> Result<VcsOutput, VcsError> {
        self.run(&["clone", repo, "."], work_dir).await
    }

    /// Name of the checked-out branch, `None` on a detached HEAD.
    async fn current_branch(&self, work_dir: &Path) -> Result<Option<String>, VcsError> {
        match self.run(&["symbolic-ref", "--short", "HEAD"], work_dir).await {
            Ok(out) => {
                let branch = out.output().trim();
                Ok((!branch.is_empty()).then(|| branch.to_owned()))
            }
            Err(VcsError::Failed { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn checkout(&self, branch: &str, work_dir: &Path) -> Result<VcsOutput, VcsError> {
        self.run(&["checkout", branch], work_dir).await
    }

    async fn stage_all(&self, work_dir: &Path) -> Result<VcsOutput, VcsError> {
        self.run(&["add", "--all", "."], work_dir).await
    }

    async fn commit(&self, message: &str, work_dir: &Path) -> Result<VcsOutput, VcsError> {
        self.run(&["commit", "-m", message], work_dir).await
    }

    /// Push to `origin`, targeting `branch` or the current HEAD when none is configured.
    async fn push(&self, branch: Option<&str>, work_dir: &Path) -> Result<VcsOutput, VcsError> {
        self.run(&["push", "origin", branch.unwrap_or("HEAD")], work_dir)
            .await
    }
}

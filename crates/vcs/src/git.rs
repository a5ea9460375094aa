use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use tokio::process::Command;
use tracing::{debug, error};

use crate::runner::{VcsError, VcsOutput, VersionControl};

/// Phrases git prints when a commit finds nothing staged.
pub const NOOP_INDICATORS: [&str; 2] = ["no changes added to commit", "nothing to commit"];

pub const DEFAULT_NOOP_MESSAGE: &str = "Git output indicates a noop.";

/// [`VersionControl`] backed by the `git` executable.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
    noop_message: String,
    identity: Option<(String, String)>,
}

impl Default for GitCli {
    fn default() -> Self {
        Self {
            program: PathBuf::from("git"),
            noop_message: DEFAULT_NOOP_MESSAGE.to_owned(),
            identity: None,
        }
    }
}

impl GitCli {
    pub fn new(noop_message: impl Into<String>) -> Self {
        Self {
            noop_message: noop_message.into(),
            ..Self::default()
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Author and committer used for backup commits.
    pub fn with_identity(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.identity = Some((name.into(), email.into()));
        self
    }

    fn classify(
        &self,
        args: &[&str],
        status: ExitStatus,
        output: String,
    ) -> Result<VcsOutput, VcsError> {
        if NOOP_INDICATORS.iter().any(|needle| output.contains(needle)) {
            return Ok(VcsOutput::Noop {
                message: self.noop_message.clone(),
                output,
            });
        }
        if !status.success() {
            return Err(VcsError::Failed {
                args: args.iter().map(|a| (*a).to_owned()).collect(),
                status: status.to_string(),
                output,
            });
        }
        Ok(VcsOutput::Completed(output))
    }
}

#[async_trait::async_trait]
impl VersionControl for GitCli {
    async fn run(&self, args: &[&str], work_dir: &Path) -> Result<VcsOutput, VcsError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args).current_dir(work_dir).kill_on_drop(true);
        if let Some((name, email)) = &self.identity {
            cmd.env("GIT_AUTHOR_NAME", name)
                .env("GIT_AUTHOR_EMAIL", email)
                .env("GIT_COMMITTER_NAME", name)
                .env("GIT_COMMITTER_EMAIL", email);
        }

        let out = cmd.output().await.map_err(|source| {
            error!(program = %self.program.display(), error = %source, "failed to spawn git");
            VcsError::Spawn {
                program: self.program.display().to_string(),
                source,
            }
        })?;

        let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&out.stderr));
        debug!(?args, status = %out.status, %output, "git finished");

        self.classify(args, out.status, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh() -> GitCli {
        GitCli::new("nothing new").with_program("sh")
    }

    #[tokio::test]
    async fn captures_stdout_and_stderr() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let out = sh()
            .run(&["-c", "echo out; echo err >&2"], tmp.path())
            .await
            .expect("run");
        assert_eq!(out, VcsOutput::Completed("out\nerr\n".to_owned()));
    }

    #[tokio::test]
    async fn runs_in_the_given_directory() {
        let tmp = tempfile::tempdir().expect("tempdir");
        std::fs::write(tmp.path().join("marker"), "").expect("write");
        let out = sh().run(&["-c", "ls"], tmp.path()).await.expect("run");
        assert!(out.output().contains("marker"));
    }

    #[tokio::test]
    async fn noop_indicator_wins_over_exit_status() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let out = sh()
            .run(
                &["-c", "echo 'nothing to commit, working tree clean'; exit 1"],
                tmp.path(),
            )
            .await
            .expect("noop is not an error");
        match out {
            VcsOutput::Noop { message, output } => {
                assert_eq!(message, "nothing new");
                assert!(output.contains("working tree clean"));
            }
            other => panic!("expected noop, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn noop_indicator_on_stderr_is_detected() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let out = sh()
            .run(&["-c", "echo 'no changes added to commit' >&2; exit 1"], tmp.path())
            .await
            .expect("run");
        assert!(matches!(out, VcsOutput::Noop { .. }));
    }

    #[tokio::test]
    async fn non_zero_exit_is_a_failure_with_output() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let err = sh()
            .run(&["-c", "echo 'fatal: repository not found' >&2; exit 128"], tmp.path())
            .await
            .unwrap_err();
        match err {
            VcsError::Failed { output, args, .. } => {
                assert!(output.contains("repository not found"));
                assert_eq!(args[0], "-c");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_executable_is_a_spawn_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let git = GitCli::default().with_program("/nonexistent/dog-watcher-git");
        let err = git.run(&["status"], tmp.path()).await.unwrap_err();
        assert!(matches!(err, VcsError::Spawn { .. }));
    }

    #[tokio::test]
    async fn push_defaults_to_head() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let echo = GitCli::default().with_program("echo");
        let out = echo.push(None, tmp.path()).await.expect("run");
        assert_eq!(out.output(), "push origin HEAD\n");
        let out = echo.push(Some("backups"), tmp.path()).await.expect("run");
        assert_eq!(out.output(), "push origin backups\n");
    }
}

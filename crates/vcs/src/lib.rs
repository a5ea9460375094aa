mod git;
pub mod runner;

pub use git::{GitCli, NOOP_INDICATORS, DEFAULT_NOOP_MESSAGE};
pub use runner::{VcsError, VcsOutput, VersionControl};

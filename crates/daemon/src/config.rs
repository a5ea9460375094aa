use std::path::{Path, PathBuf};
use std::time::Duration;

use dog_watcher_remote::{ApiConfig, DEFAULT_BASE_URL, DEFAULT_CONCURRENCY, DEFAULT_EVENT_TAGS};
use dog_watcher_vcs::DEFAULT_NOOP_MESSAGE;
use serde::Deserialize;
use thiserror::Error;

use crate::coordinator::BackupSettings;
use crate::schedule::BackupSchedule;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("you must provide remoteApiKey and remoteAppKey")]
    MissingKeys,
    #[error("you must provide a destinationRepo")]
    MissingRepo,
    #[error("there was a problem parsing the backup interval [{expr}]: {reason}")]
    InvalidSchedule { expr: String, reason: String },
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub remote_api_key: Option<String>,
    pub remote_app_key: Option<String>,
    pub remote_api_base_url: Option<String>,
    pub destination_repo: Option<String>,
    pub destination_branch: Option<String>,
    pub backup_interval_cron_expression: Option<String>,
    pub send_event_on_noop: Option<BoolLike>,
    pub noop_event_message: Option<String>,
    pub event_tags: Option<Vec<String>>,
    pub export_concurrency: Option<usize>,
    pub request_timeout_secs: Option<u64>,
    pub work_root: Option<PathBuf>,
    pub commit_author_name: Option<String>,
    pub commit_author_email: Option<String>,
}

/// Accepts `true` as well as `"true"`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum BoolLike {
    Bool(bool),
    Text(String),
}

impl BoolLike {
    pub fn as_bool(&self) -> bool {
        match self {
            BoolLike::Bool(b) => *b,
            BoolLike::Text(s) => s.trim().eq_ignore_ascii_case("true"),
        }
    }
}

/// Validated configuration, ready to build the pipeline from.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api: ApiConfig,
    pub backup: BackupSettings,
    pub schedule: Option<BackupSchedule>,
    pub noop_message: String,
    pub event_tags: Vec<String>,
    pub export_concurrency: usize,
    pub commit_identity: Option<(String, String)>,
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

impl Config {
    /// Overlay `DOG_WATCHER_*` variables looked up through `lookup`.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let overlay = |key: &str, current: Option<String>| lookup(key).or(current);
        self.remote_api_key = overlay("DOG_WATCHER_API_KEY", self.remote_api_key);
        self.remote_app_key = overlay("DOG_WATCHER_APP_KEY", self.remote_app_key);
        self.destination_repo = overlay("DOG_WATCHER_REPO", self.destination_repo);
        self.destination_branch = overlay("DOG_WATCHER_BRANCH", self.destination_branch);
        self.backup_interval_cron_expression =
            overlay("DOG_WATCHER_SCHEDULE", self.backup_interval_cron_expression);
        self
    }

    pub fn validate(self) -> Result<Settings, ConfigError> {
        let (Some(api_key), Some(app_key)) = (
            non_empty(self.remote_api_key),
            non_empty(self.remote_app_key),
        ) else {
            return Err(ConfigError::MissingKeys);
        };
        let repo = non_empty(self.destination_repo).ok_or(ConfigError::MissingRepo)?;

        let schedule = non_empty(self.backup_interval_cron_expression)
            .map(|expr| BackupSchedule::parse(&expr))
            .transpose()?;

        let api = ApiConfig {
            api_key,
            app_key,
            base_url: non_empty(self.remote_api_base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
            timeout: Duration::from_secs(self.request_timeout_secs.unwrap_or(60)),
        };

        let backup = BackupSettings {
            repo,
            branch: non_empty(self.destination_branch),
            send_event_on_noop: self
                .send_event_on_noop
                .as_ref()
                .is_some_and(BoolLike::as_bool),
            work_root: self.work_root,
        };

        let commit_identity = match (
            non_empty(self.commit_author_name),
            non_empty(self.commit_author_email),
        ) {
            (Some(name), Some(email)) => Some((name, email)),
            _ => None,
        };

        Ok(Settings {
            api,
            backup,
            schedule,
            noop_message: non_empty(self.noop_event_message)
                .unwrap_or_else(|| DEFAULT_NOOP_MESSAGE.to_owned()),
            event_tags: self
                .event_tags
                .unwrap_or_else(|| DEFAULT_EVENT_TAGS.iter().map(|t| (*t).to_owned()).collect()),
            export_concurrency: self.export_concurrency.unwrap_or(DEFAULT_CONCURRENCY),
            commit_identity,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

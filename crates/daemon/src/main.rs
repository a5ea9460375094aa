use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use dog_watcher_daemon::config::{self, Settings};
use dog_watcher_daemon::coordinator::log_result;
use dog_watcher_daemon::{scheduler_loop, BackupCoordinator};
use dog_watcher_remote::{ApiClient, RemoteExporter};
use dog_watcher_vcs::GitCli;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let (settings, mode) = match parse_args(env::args(), |key| env::var(key).ok()) {
        Ok(parsed) => parsed,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    let coordinator = build_coordinator(&settings)?;

    match (mode.as_deref(), &settings.schedule) {
        (Some("run-once"), _) | (None, None) => {
            info!("running a one-time backup");
            coordinator.run_with(log_result).await;
        }
        (None, Some(schedule)) => {
            info!(schedule = schedule.expression(), "scheduling backups");
            scheduler_loop(&coordinator, schedule).await;
        }
        (Some(other), _) => bail!("unknown command: {other}"),
    }
    Ok(())
}

/// `LOG_LEVEL` is read once here; it accepts a level or a full filter directive.
fn init_tracing() {
    let level = env::var("LOG_LEVEL")
        .map(|v| v.to_lowercase())
        .unwrap_or_else(|_| "info".to_owned());
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Parse CLI args and load the settings they point at, returning them with the optional
/// subcommand. `lookup` resolves the `DOG_WATCHER_*` overrides.
fn parse_args<I>(
    args: I,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(Settings, Option<String>)>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter().skip(1);
    let mut config_path = PathBuf::from(DEFAULT_CONFIG_PATH);
    let mut mode: Option<String> = None;

    while let Some(arg) = args.next() {
        if arg == "--config" {
            config_path = args
                .next()
                .map(PathBuf::from)
                .context("--config requires a path argument")?;
        } else {
            mode = Some(arg);
        }
    }

    info!(path = ?config_path, "loading config file");
    let settings = config::load_config(&config_path)?
        .with_overrides(lookup)
        .validate()?;
    Ok((settings, mode))
}

fn build_coordinator(settings: &Settings) -> Result<BackupCoordinator<GitCli, RemoteExporter>> {
    let mut git = GitCli::new(settings.noop_message.clone());
    if let Some((name, email)) = &settings.commit_identity {
        git = git.with_identity(name.clone(), email.clone());
    }

    let client = ApiClient::new(settings.api.clone()).context("building API client")?;
    let exporter = RemoteExporter::new(
        client,
        settings.export_concurrency,
        settings.event_tags.clone(),
    );

    Ok(BackupCoordinator::new(git, exporter, settings.backup.clone()))
}

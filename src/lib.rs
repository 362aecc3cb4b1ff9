mod cli;
pub mod credentials;
pub mod game_log;
pub mod settings;
pub mod sinks;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

pub use cli::{Cli, Commands};

use credentials::SharedCredential;
use game_log::{
    inspect_log_file, start_log_watch, Collaborators, IdentitySource, LogScanIdentity,
    ParserRules, SessionConfig,
};
use settings::TrackerSettings;
use sinks::{JsonLinesKillSink, SinkSet, TracingSink};

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let settings = load_settings(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Inspect { file, handle, geid }) => inspect(&settings, &file, handle, geid),
        Some(Commands::Watch { log, handle }) => watch(settings, log.as_deref(), handle),
        None => watch(settings, None, None),
    }
}

fn load_settings(config_path: Option<&Path>) -> Result<TrackerSettings> {
    if let Some(path) = config_path {
        if !path.is_file() {
            anyhow::bail!("settings file not found: {}", path.display());
        }
    }

    let settings = TrackerSettings::load_from(config_path).context("failed to load settings")?;
    tracing::debug!(log_path = %settings.log_path.display(), "Loaded settings");
    Ok(settings)
}

fn watch(mut settings: TrackerSettings, log: Option<&Path>, handle: Option<String>) -> Result<()> {
    if let Some(log) = log {
        settings.log_path = log.to_path_buf();
    }
    if handle.is_some() {
        settings.player_handle = handle;
    }

    let rules = ParserRules::from_settings(&settings).context("invalid exclusion rules")?;
    let identity = LogScanIdentity::new(&settings.log_path)
        .with_overrides(settings.player_handle.clone(), settings.player_geid.clone());

    let mut sink = SinkSet::new().with(TracingSink);
    if let Some(kill_log_path) = &settings.kill_log_path {
        sink.push(Box::new(JsonLinesKillSink::new(kill_log_path)));
    }

    let collaborators = Collaborators {
        credentials: Arc::new(SharedCredential::new(settings.submission_key.clone())),
        identity: Arc::new(identity),
        sink: Box::new(sink),
    };
    let config = SessionConfig::from_settings(&settings);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(async move {
        let mut log_watch = start_log_watch(config, rules, collaborators)
            .context("failed to start watching the game log")?;

        let result = tokio::select! {
            result = log_watch.stopped() => result,
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl-C")?;
                tracing::info!("Stopping kill tracking");
                log_watch.stop().await
            }
        };
        let state = result.context("game log watcher failed")?;

        tracing::info!(
            kills = state.stats.kill_total,
            deaths = state.stats.death_total,
            max_killstreak = state.stats.max_killstreak,
            kd = %state.stats.compute_kd(),
            "Session finished"
        );
        Ok::<(), anyhow::Error>(())
    })
}

fn inspect(
    settings: &TrackerSettings,
    file: &Path,
    handle: Option<String>,
    geid: Option<String>,
) -> Result<()> {
    let rules = ParserRules::from_settings(settings).context("invalid exclusion rules")?;
    let identity = LogScanIdentity::new(file)
        .with_overrides(
            handle.or_else(|| settings.player_handle.clone()),
            geid.or_else(|| settings.player_geid.clone()),
        )
        .resolve();

    let report = inspect_log_file(file, &identity, &rules)
        .with_context(|| format!("failed to inspect {}", file.display()))?;
    let serialized =
        serde_json::to_string_pretty(&report).context("failed to serialize inspect report")?;
    println!("{serialized}");
    Ok(())
}

use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, watch};

use super::dispatch::{process_line, LineContext, ParserRules};
use super::error::MonitorError;
use super::identity::IdentitySource;
use super::kill_line::describe_kill_event;
use super::model::{
    Emission, KillEvent, KillOutcome, ParserState, PlayerIdentity, DEFAULT_IDENTITY_RETRY,
    DEFAULT_POLL_INTERVAL, DEFAULT_STARTUP_CREDENTIAL_RETRY, DEFAULT_STEADY_CREDENTIAL_RETRY,
};
use super::tailer::LogTailer;
use crate::credentials::CredentialSource;
use crate::settings::TrackerSettings;
use crate::sinks::EventSink;

/// Timing and display options for one monitoring session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub log_path: PathBuf,
    pub poll_interval: Duration,
    pub startup_credential_retry: Duration,
    pub steady_credential_retry: Duration,
    pub identity_retry: Duration,
    pub reset_occupancy_after_replay: bool,
    pub weapon_labels: BTreeMap<String, String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("Game.log"),
            poll_interval: DEFAULT_POLL_INTERVAL,
            startup_credential_retry: DEFAULT_STARTUP_CREDENTIAL_RETRY,
            steady_credential_retry: DEFAULT_STEADY_CREDENTIAL_RETRY,
            identity_retry: DEFAULT_IDENTITY_RETRY,
            reset_occupancy_after_replay: false,
            weapon_labels: BTreeMap::new(),
        }
    }
}

impl SessionConfig {
    pub fn from_settings(settings: &TrackerSettings) -> Self {
        Self {
            log_path: settings.log_path.clone(),
            poll_interval: settings.poll_interval(),
            startup_credential_retry: settings.startup_credential_retry(),
            steady_credential_retry: settings.steady_credential_retry(),
            identity_retry: settings.identity_retry(),
            reset_occupancy_after_replay: settings.reset_occupancy_after_replay,
            weapon_labels: settings.weapon_labels.clone(),
        }
    }
}

/// External collaborators the worker consults and reports to.
pub struct Collaborators {
    pub credentials: Arc<dyn CredentialSource>,
    pub identity: Arc<dyn IdentitySource>,
    pub sink: Box<dyn EventSink>,
}

pub(crate) struct MonitorSession {
    config: SessionConfig,
    rules: ParserRules,
    collaborators: Collaborators,
    active: watch::Receiver<bool>,
    state: ParserState,
    identity: PlayerIdentity,
    last_identity_attempt: Option<Instant>,
    notifications: Option<mpsc::UnboundedReceiver<()>>,
    _watcher: Option<RecommendedWatcher>,
}

impl MonitorSession {
    pub(crate) fn new(
        config: SessionConfig,
        rules: ParserRules,
        collaborators: Collaborators,
        active: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config,
            rules,
            collaborators,
            active,
            state: ParserState::new(),
            identity: PlayerIdentity::default(),
            last_identity_attempt: None,
            notifications: None,
            _watcher: None,
        }
    }

    /// Runs until the active flag drops or the log cannot be opened.
    /// Returns the final parser state.
    pub(crate) async fn run(mut self) -> Result<ParserState, MonitorError> {
        let mut tailer = LogTailer::open(&self.config.log_path)?;
        self.watch_log_directory();

        if !self.wait_for_startup_credential().await {
            tracing::info!("Game log monitoring stopped before a submission key was available");
            return Ok(self.state);
        }

        self.resolve_identity();
        self.replay_history(&mut tailer);
        tracing::info!(
            path = %tailer.path().display(),
            handle = self.identity.handle().unwrap_or("unresolved"),
            "Kill tracking started"
        );

        while self.is_active() {
            if !self.collaborators.credentials.has_valid_key() {
                tracing::error!(
                    error = %MonitorError::CredentialUnavailable,
                    "Kill tracking is not active"
                );
                self.pause(self.config.steady_credential_retry).await;
                continue;
            }

            if self.identity.handle().is_none() {
                self.retry_identity();
            }

            match tailer.poll_line() {
                Ok(Some(line)) => self.handle_live_line(&line),
                Ok(None) => {
                    self.wait(self.config.poll_interval).await;
                }
                Err(error) => {
                    tracing::warn!(error = %error, "Failed to read game log, retrying");
                    self.wait(self.config.poll_interval).await;
                }
            }
        }

        tracing::info!("Game log monitoring has stopped");
        Ok(self.state)
    }

    fn is_active(&self) -> bool {
        is_active(&self.active)
    }

    /// Sleeps for up to `duration`, waking early on log changes or when the
    /// active flag changes. Returns whether monitoring is still active.
    async fn wait(&mut self, duration: Duration) -> bool {
        if !self.is_active() {
            return false;
        }

        match self.notifications.as_mut() {
            Some(notifications) => {
                tokio::select! {
                    _ = tokio::time::sleep(duration) => {}
                    Some(()) = notifications.recv() => {
                        while notifications.try_recv().is_ok() {}
                    }
                    _ = self.active.changed() => {}
                }
            }
            None => {
                tokio::select! {
                    _ = tokio::time::sleep(duration) => {}
                    _ = self.active.changed() => {}
                }
            }
        }

        self.is_active()
    }

    /// Sleeps for the full `duration` unless the active flag changes. Log
    /// writes do not cut it short, so retry intervals hold while the game
    /// is busy writing.
    async fn pause(&mut self, duration: Duration) -> bool {
        if !self.is_active() {
            return false;
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.active.changed() => {}
        }

        self.is_active()
    }

    async fn wait_for_startup_credential(&mut self) -> bool {
        if self.collaborators.credentials.has_valid_key() {
            return true;
        }

        tracing::warn!("Waiting for a submission key before reading the game log");
        while self.is_active() {
            if self.collaborators.credentials.has_valid_key() {
                tracing::debug!("Submission key received");
                return true;
            }
            self.pause(self.config.startup_credential_retry).await;
        }

        false
    }

    fn resolve_identity(&mut self) {
        self.last_identity_attempt = Some(Instant::now());
        let resolved = self.collaborators.identity.resolve();

        match resolved.handle() {
            Some(handle) => tracing::info!(handle = %handle, "Resolved player handle"),
            None => tracing::warn!(
                error = %MonitorError::IdentityUnresolved("handle"),
                "Kills will not be attributed until the handle is found"
            ),
        }
        if resolved.global_entity_id().is_none() {
            tracing::warn!(
                error = %MonitorError::IdentityUnresolved("global entity id"),
                "Spawned vehicles will not be tracked"
            );
        }

        self.identity = resolved;
    }

    fn retry_identity(&mut self) {
        let retry_due = self
            .last_identity_attempt
            .map(|attempt| attempt.elapsed() >= self.config.identity_retry)
            .unwrap_or(true);
        if !retry_due {
            return;
        }

        tracing::error!("Player handle has not been found yet, retrying");
        self.resolve_identity();
    }

    fn replay_history(&mut self, tailer: &mut LogTailer) {
        tracing::info!("Loading existing game log, kills found there are not reported");

        let context = LineContext {
            identity: &self.identity,
            rules: &self.rules,
            emission: Emission::Replay,
        };
        let credentials = &self.collaborators.credentials;
        let active = &self.active;
        let state = &mut self.state;
        let mut stopped_early = false;

        let replayed = tailer.drain_existing(|line| {
            if !is_active(active) {
                stopped_early = true;
                return ControlFlow::Break(());
            }
            if !credentials.has_valid_key() {
                tracing::error!("Submission key became invalid, stopped loading the existing game log");
                stopped_early = true;
                return ControlFlow::Break(());
            }
            process_line(line, state, &context);
            ControlFlow::Continue(())
        });

        match replayed {
            Ok(lines) => tracing::debug!(lines, "Existing game log replayed"),
            Err(error) => tracing::warn!(error = %error, "Failed to replay existing game log"),
        }

        // The rest of the old content is history; never treat it as live.
        if stopped_early {
            match tailer.drain_existing(|_| ControlFlow::Continue(())) {
                Ok(skipped) => tracing::debug!(skipped, "Skipped remaining existing game log lines"),
                Err(error) => tracing::warn!(error = %error, "Failed to skip existing game log"),
            }
        }

        if self.config.reset_occupancy_after_replay {
            self.state.occupancy.exit();
        }

        let sink = &mut self.collaborators.sink;
        sink.update_vehicle(&self.state.occupancy.zone);
        sink.update_stats(&self.state.stats.labels(&self.state.occupancy.zone));
    }

    fn handle_live_line(&mut self, line: &str) {
        let context = LineContext {
            identity: &self.identity,
            rules: &self.rules,
            emission: Emission::Live,
        };
        let outcome = process_line(line, &mut self.state, &context);

        if outcome.occupancy_changed {
            self.collaborators
                .sink
                .update_vehicle(&self.state.occupancy.zone);
        }

        if let Some(event) = outcome.kill {
            self.report_kill(&event);
        }
    }

    fn report_kill(&mut self, event: &KillEvent) {
        if !event.outcome.is_reportable() {
            tracing::debug!(outcome = event.outcome.as_str(), "Not reporting kill line");
            return;
        }

        tracing::info!("{}", describe_kill_event(event, &self.config.weapon_labels));

        let sink = &mut self.collaborators.sink;
        if event.outcome == KillOutcome::Killer {
            sink.play_kill_cue();
        }
        sink.update_stats(&self.state.stats.labels(&self.state.occupancy.zone));
        sink.submit_kill(event);
    }

    fn watch_log_directory(&mut self) {
        let (sender, receiver) = mpsc::unbounded_channel::<()>();
        self.notifications = Some(receiver);

        let log_path = self.config.log_path.clone();
        let watcher = notify::recommended_watcher(move |result: notify::Result<Event>| match result {
            Ok(event) => {
                if is_relevant_notification(&event, &log_path) && sender.send(()).is_err() {
                    tracing::debug!("Game log notification receiver dropped");
                }
            }
            Err(error) => tracing::warn!("Game log watcher error: {error}"),
        });

        let mut watcher = match watcher {
            Ok(watcher) => watcher,
            Err(error) => {
                tracing::warn!(error = %error, "File notifications unavailable, polling only");
                return;
            }
        };

        let watch_directory = watch_directory(&self.config.log_path);
        if let Err(error) = watcher.watch(&watch_directory, RecursiveMode::NonRecursive) {
            tracing::warn!(
                path = %watch_directory.display(),
                error = %error,
                "Failed to watch game log directory, polling only"
            );
            return;
        }

        self._watcher = Some(watcher);
    }
}

fn is_active(active: &watch::Receiver<bool>) -> bool {
    *active.borrow() && active.has_changed().is_ok()
}

fn watch_directory(log_path: &Path) -> PathBuf {
    match log_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn is_relevant_notification(event: &Event, log_path: &Path) -> bool {
    let relevant_kind = matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_));
    if !relevant_kind {
        return false;
    }

    let Some(log_file_name) = log_path.file_name() else {
        return false;
    };

    event.paths.iter().any(|path| {
        path == log_path
            || path
                .file_name()
                .map(|file_name| file_name == log_file_name)
                .unwrap_or(false)
    })
}

pub mod classifier;
pub mod dispatch;
pub mod error;
pub mod exclusion;
pub mod identity;
pub mod inspect;
pub mod kill_line;
pub mod model;
pub mod occupancy;
mod session;
pub mod stats;
pub mod tailer;

use tokio::sync::watch;
use tokio::task::JoinHandle;

pub use classifier::{classify, LineTag};
pub use dispatch::{process_line, LineContext, LineOutcome, ParserRules};
pub use error::MonitorError;
pub use exclusion::ExclusionRules;
pub use identity::{FixedIdentity, IdentitySource, LogScanIdentity};
pub use inspect::{inspect_log_file, InspectReport};
pub use model::{Emission, KillEvent, KillOutcome, Occupancy, ParserState, PlayerIdentity};
pub use session::{Collaborators, SessionConfig};
pub use stats::{SessionStats, StatsLabels};
pub use tailer::LogTailer;

use session::MonitorSession;

/// Handle to a running monitoring worker. Dropping it stops the worker.
pub struct LogWatch {
    active: watch::Sender<bool>,
    handle: Option<JoinHandle<Result<ParserState, MonitorError>>>,
}

impl LogWatch {
    /// Resolves when the worker ends on its own, without asking it to stop.
    pub async fn stopped(&mut self) -> Result<ParserState, MonitorError> {
        let Some(handle) = self.handle.as_mut() else {
            return Err(MonitorError::Worker("worker already joined".to_string()));
        };

        let result = match handle.await {
            Ok(result) => result,
            Err(error) => Err(MonitorError::Worker(error.to_string())),
        };
        self.handle = None;
        result
    }

    /// Clears the active flag and waits for the worker to finish.
    pub async fn stop(&mut self) -> Result<ParserState, MonitorError> {
        self.active.send_replace(false);
        self.stopped().await
    }
}

/// Spawns the monitoring worker on the current tokio runtime.
pub fn start_log_watch(
    config: SessionConfig,
    rules: ParserRules,
    collaborators: Collaborators,
) -> Result<LogWatch, MonitorError> {
    std::fs::metadata(&config.log_path).map_err(|source| MonitorError::FileAccess {
        path: config.log_path.clone(),
        source,
    })?;

    let (active, receiver) = watch::channel(true);
    let log_path = config.log_path.clone();
    let session = MonitorSession::new(config, rules, collaborators, receiver);

    let handle = tokio::spawn(async move {
        let result = session.run().await;
        if let Err(error) = &result {
            tracing::error!(path = %log_path.display(), "Game log watcher stopped: {error}");
        }
        result
    });

    Ok(LogWatch {
        active,
        handle: Some(handle),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::SharedCredential;
    use crate::settings::TrackerSettings;
    use crate::sinks::TracingSink;
    use std::sync::Arc;
    use std::time::Duration;

    fn collaborators() -> Collaborators {
        Collaborators {
            credentials: Arc::new(SharedCredential::new(Some("key".to_string()))),
            identity: Arc::new(FixedIdentity::default()),
            sink: Box::new(TracingSink),
        }
    }

    #[tokio::test]
    async fn start_fails_for_missing_log() {
        let directory = tempfile::tempdir().unwrap();
        let config = SessionConfig {
            log_path: directory.path().join("missing.log"),
            ..SessionConfig::default()
        };

        let result = start_log_watch(config, ParserRules::default(), collaborators());
        assert!(matches!(result, Err(MonitorError::FileAccess { .. })));
    }

    #[tokio::test]
    async fn stop_returns_final_state() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("Game.log");
        std::fs::write(
            &path,
            "<2025-01-05T20:00:00.000Z> [Notice] <Context Establisher Done> establisher=\"CReplicationModel\" runningTime=12.3 map=\"megamap\" gamerules=\"SC_Default\" sessionId=\"abc\"\n",
        )
        .unwrap();

        let settings = TrackerSettings {
            log_path: path,
            poll_interval_ms: 10,
            ..TrackerSettings::default()
        };
        let rules = ParserRules::from_settings(&settings).unwrap();
        let mut watch =
            start_log_watch(SessionConfig::from_settings(&settings), rules, collaborators())
                .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let state = tokio::time::timeout(Duration::from_secs(1), watch.stop())
            .await
            .expect("worker did not stop")
            .unwrap();

        assert!(state.is_in_lobby());
        assert!(matches!(
            watch.stopped().await,
            Err(MonitorError::Worker(_))
        ));
    }
}

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Live game log kill, death and vehicle tracker.
///
/// Follows the game client's log, keeps session kill/death stats and reports
/// kills as they happen.
#[derive(Debug, Parser)]
#[command(name = "killtracker", version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a TOML settings file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Follow the game log until interrupted (default).
    Watch {
        /// Game log to follow, overriding the configured path.
        #[arg(long)]
        log: Option<PathBuf>,

        /// Player handle, skipping the login line lookup.
        #[arg(long)]
        handle: Option<String>,
    },

    /// Parse a whole log offline and print a JSON report.
    Inspect {
        /// Log file to inspect.
        file: PathBuf,

        #[arg(long)]
        handle: Option<String>,

        /// Player global entity id.
        #[arg(long)]
        geid: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_watch_overrides() {
        let cli = Cli::parse_from([
            "killtracker",
            "--verbose",
            "watch",
            "--log",
            "/tmp/Game.log",
            "--handle",
            "PilotOne",
        ]);

        assert!(cli.verbose);
        match cli.command {
            Some(Commands::Watch { log, handle }) => {
                assert_eq!(log, Some(PathBuf::from("/tmp/Game.log")));
                assert_eq!(handle.as_deref(), Some("PilotOne"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_inspect_with_global_config() {
        let cli = Cli::parse_from(["killtracker", "inspect", "Game.log", "-c", "tracker.toml"]);

        assert_eq!(cli.config, Some(PathBuf::from("tracker.toml")));
        assert!(matches!(cli.command, Some(Commands::Inspect { .. })));
    }

    #[test]
    fn no_subcommand_means_watch() {
        let cli = Cli::parse_from(["killtracker"]);
        assert!(cli.command.is_none());
    }
}

use std::fmt;
use std::path::PathBuf;

/// Domain errors crossing the supervisor/orchestrator boundary.
///
/// These are all recoverable: the orchestrator logs them and retries on
/// the next state transition. Only configuration loading (handled with
/// eyre in the config module) is fatal, and only at startup.
#[derive(Debug)]
pub enum Error {
    /// Writing or renaming the generated configuration failed.
    ConfigWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Spawning the idle daemon (or the systemd restart helper) failed.
    SpawnFailed {
        command: String,
        source: std::io::Error,
    },

    /// The systemd restart helper ran but reported failure.
    RestartFailed { unit: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ConfigWrite { path, source } => {
                write!(f, "failed to write {}: {source}", path.display())
            }
            Error::SpawnFailed { command, source } => {
                write!(f, "failed to spawn `{command}`: {source}")
            }
            Error::RestartFailed { unit } => {
                write!(f, "systemctl --user restart {unit} reported failure")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ConfigWrite { source, .. } | Error::SpawnFailed { source, .. } => Some(source),
            Error::RestartFailed { .. } => None,
        }
    }
}

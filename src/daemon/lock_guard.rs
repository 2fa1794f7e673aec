use std::io;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use eyre::{Result, eyre};

use crate::iinfo;

/// Result of an exclusive lock-command run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    /// The command ran to completion with this exit code.
    Ran(i32),
    /// Another lock command is live; nothing was launched. The desired
    /// effect (a locked session) is already in progress.
    AlreadyRunning,
}

/// Exclusive ownership of the "one lock-command instance" resource.
///
/// The lock is a bound unix socket in the runtime dir: it cannot outlive
/// its process, so a crashed or killed lock command never wedges future
/// attempts. A leftover socket path from a hard kill is detected by a
/// connect probe and rebound.
pub struct LockGuard {
    _listener: UnixListener,
    path: PathBuf,
}

impl LockGuard {
    /// Non-blocking acquire. `Ok(None)` means another holder is live.
    pub fn try_acquire() -> Result<Option<Self>> {
        Self::try_acquire_at(&default_lock_path()?)
    }

    pub fn try_acquire_at(path: &Path) -> Result<Option<Self>> {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        match UnixListener::bind(path) {
            Ok(listener) => Ok(Some(Self {
                _listener: listener,
                path: path.to_path_buf(),
            })),
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                match UnixStream::connect(path) {
                    // Someone answers: a lock command is genuinely live.
                    Ok(_) => Ok(None),
                    // Stale socket from a dead process.
                    Err(_) => {
                        let _ = std::fs::remove_file(path);
                        let listener = UnixListener::bind(path).map_err(|e| {
                            eyre!("failed to bind lock socket {}: {e}", path.display())
                        })?;
                        Ok(Some(Self {
                            _listener: listener,
                            path: path.to_path_buf(),
                        }))
                    }
                }
            }
            Err(e) => Err(eyre!("failed to bind lock socket {}: {e}", path.display())),
        }
    }

    /// Acquire the lock and run `command` synchronously under it. Busy
    /// acquisition is a reported no-op, not an error; the guard is
    /// released on every exit path once the command finishes.
    pub fn run_exclusive(command: &str) -> Result<LockOutcome> {
        let Some(guard) = Self::try_acquire()? else {
            return Ok(LockOutcome::AlreadyRunning);
        };

        iinfo!("lock", "running lock command: {command}");

        let status = std::process::Command::new("sh")
            .arg("-lc")
            .arg(command)
            .status()
            .map_err(|e| eyre!("failed to launch lock command `{command}`: {e}"))?;

        drop(guard);
        Ok(LockOutcome::Ran(status.code().unwrap_or(1)))
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn default_lock_path() -> Result<PathBuf> {
    let runtime = std::env::var_os("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .ok_or_else(|| eyre!("XDG_RUNTIME_DIR is not set (cannot create lock socket)"))?;
    Ok(runtime.join("idlewatch").join("lock-command.sock"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_busy_until_release() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("lock.sock");

        let first = LockGuard::try_acquire_at(&path).unwrap();
        assert!(first.is_some());

        let second = LockGuard::try_acquire_at(&path).unwrap();
        assert!(second.is_none());

        drop(first);

        let third = LockGuard::try_acquire_at(&path).unwrap();
        assert!(third.is_some());
    }

    #[test]
    fn stale_socket_is_reclaimed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("lock.sock");

        // Simulate a hard-killed holder: the socket file stays on disk
        // but nothing listens behind it.
        let listener = UnixListener::bind(&path).unwrap();
        drop(listener);
        assert!(path.exists());

        let acquired = LockGuard::try_acquire_at(&path).unwrap();
        assert!(acquired.is_some());
    }
}

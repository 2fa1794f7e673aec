use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};

use crate::config::ActionProfile;
use crate::core::error::Error;
use crate::core::render;
use crate::iinfo;
use crate::iwarn;

/// How long a stopping idle daemon gets before SIGKILL.
const STOP_GRACE: Duration = Duration::from_secs(2);

/// Seam for restarting the external idle daemon, so the orchestrator
/// logic can be exercised without spawning processes.
pub trait IdleRestarter {
    fn restart(&mut self, config_path: &Path) -> impl Future<Output = Result<(), Error>> + Send;
    fn shutdown(&mut self) -> impl Future<Output = ()> + Send;
}

/// Outcome of an `apply` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Config written and the idle daemon restarted.
    Restarted,
    /// Rendered config was byte-identical to what is already live.
    Unchanged,
}

/// Owns the generated configuration file and the idle daemon's process
/// lifecycle. Nothing else writes that file or touches that process.
pub struct Supervisor<R> {
    restarter: R,
    config_path: PathBuf,
    lock_command: String,
    wrapper_exe: String,
    last_checksum: Option<blake3::Hash>,
}

impl<R: IdleRestarter> Supervisor<R> {
    pub fn new(restarter: R, config_path: PathBuf, lock_command: String) -> Self {
        let wrapper_exe = std::env::current_exe()
            .ok()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());

        Self {
            restarter,
            config_path,
            lock_command,
            wrapper_exe,
            last_checksum: None,
        }
    }

    /// Render the profile, swap the config file atomically and restart
    /// the idle daemon. A rendered config whose checksum matches the
    /// live one is a no-op: two states sharing a profile must not cause
    /// a spurious restart.
    pub async fn apply(&mut self, profile: &ActionProfile) -> Result<Applied, Error> {
        let rendered = render::render(profile, &self.lock_command, &self.wrapper_exe);
        let checksum = blake3::hash(rendered.as_bytes());

        if self.last_checksum == Some(checksum) {
            return Ok(Applied::Unchanged);
        }

        self.write_atomic(rendered.as_bytes())?;
        self.restarter.restart(&self.config_path).await?;

        // Only a successful restart commits the checksum; a failure
        // leaves it stale so the next transition retries in full.
        self.last_checksum = Some(checksum);
        Ok(Applied::Restarted)
    }

    pub async fn shutdown(&mut self) {
        self.restarter.shutdown().await;
    }

    /// Write-new then rename-over-old, so readers only ever see a
    /// complete config (old or new).
    fn write_atomic(&self, contents: &[u8]) -> Result<(), Error> {
        let io = |source| Error::ConfigWrite {
            path: self.config_path.clone(),
            source,
        };

        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).map_err(io)?;
        }

        let mut tmp = self.config_path.clone().into_os_string();
        tmp.push(".new");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, contents).map_err(io)?;
        std::fs::rename(&tmp, &self.config_path).map_err(io)?;
        Ok(())
    }
}

/// Directly supervised hypridle child process.
pub struct ChildRestarter {
    command: String,
    child: Option<Child>,
}

impl ChildRestarter {
    pub fn new(command: String) -> Self {
        Self {
            command,
            child: None,
        }
    }

    async fn stop_child(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        // Graceful first: SIGTERM, bounded wait, then SIGKILL.
        if let Some(pid) = child.id() {
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGTERM);
            }
        }

        match tokio::time::timeout(STOP_GRACE, child.wait()).await {
            Ok(_) => {}
            Err(_) => {
                iwarn!("supervisor", "idle daemon ignored SIGTERM, killing");
                let _ = child.kill().await;
                let _ = child.wait().await;
            }
        }
    }
}

impl IdleRestarter for ChildRestarter {
    async fn restart(&mut self, config_path: &Path) -> Result<(), Error> {
        self.stop_child().await;

        // exec so the signal path reaches hypridle, not the shell.
        let invocation = format!(
            "exec {} --config '{}'",
            self.command,
            config_path.display()
        );

        let child = Command::new("sh")
            .arg("-lc")
            .arg(&invocation)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| Error::SpawnFailed {
                command: self.command.clone(),
                source,
            })?;

        iinfo!("supervisor", "started {} (pid {:?})", self.command, child.id());
        self.child = Some(child);
        Ok(())
    }

    async fn shutdown(&mut self) {
        self.stop_child().await;
    }
}

/// Restart through a user systemd unit instead of owning the process.
/// The unit keeps running across our shutdown.
pub struct SystemdRestarter {
    unit: String,
}

impl SystemdRestarter {
    pub fn new(unit: String) -> Self {
        Self { unit }
    }

    /// Check the unit is enabled and enable it if not, so the first
    /// restart does not fail against a unit that was never set up.
    /// Failures here are logged, not fatal; the unit may still be
    /// startable by hand.
    pub fn ensure_unit_enabled(unit: &str) {
        let output = std::process::Command::new("systemctl")
            .args(["--user", "is-enabled", unit])
            .output();

        let output = match output {
            Ok(o) => o,
            Err(e) => {
                iwarn!("supervisor", "cannot query {unit}: {e}");
                return;
            }
        };

        if !unit_needs_enable(&String::from_utf8_lossy(&output.stdout)) {
            return;
        }

        iinfo!("supervisor", "{unit} is not enabled, enabling it now");
        let status = std::process::Command::new("systemctl")
            .args(["--user", "enable", "--now", unit])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(s) if s.success() => iinfo!("supervisor", "{unit} enabled"),
            _ => iwarn!("supervisor", "failed to enable {unit}"),
        }
    }
}

fn unit_needs_enable(is_enabled_output: &str) -> bool {
    is_enabled_output.trim() != "enabled"
}

impl IdleRestarter for SystemdRestarter {
    async fn restart(&mut self, _config_path: &Path) -> Result<(), Error> {
        let status = Command::new("systemctl")
            .args(["--user", "restart", &self.unit])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|source| Error::SpawnFailed {
                command: format!("systemctl --user restart {}", self.unit),
                source,
            })?;

        if !status.success() {
            return Err(Error::RestartFailed {
                unit: self.unit.clone(),
            });
        }

        iinfo!("supervisor", "restarted unit {}", self.unit);
        Ok(())
    }

    async fn shutdown(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enabled_unit_needs_nothing() {
        assert!(!unit_needs_enable("enabled\n"));
    }

    #[test]
    fn disabled_or_unknown_unit_needs_enable() {
        assert!(unit_needs_enable("disabled\n"));
        assert!(unit_needs_enable(""));
        assert!(unit_needs_enable("not-found\n"));
    }
}

mod lock_guard;
mod run;
mod supervisor;


pub use lock_guard::{LockGuard, LockOutcome};
pub use supervisor::{Applied, ChildRestarter, IdleRestarter, Supervisor, SystemdRestarter};

use crate::config::Settings;
use crate::core::classify;
use crate::core::events::{PowerReading, PowerState};
use crate::idebug;
use crate::ierror;
use crate::iinfo;

/// The monitor daemon: settings, the last classified state and the
/// supervisor owning the generated config + idle daemon process. All
/// mutation happens here, one reading at a time.
pub struct Daemon<R> {
    settings: Settings,
    supervisor: Supervisor<R>,
    current_power_state: Option<PowerState>,
}

impl<R: IdleRestarter> Daemon<R> {
    pub fn new(settings: Settings, restarter: R) -> Self {
        let supervisor = Supervisor::new(
            restarter,
            settings.hypridle_config_path.clone(),
            settings.lock_command.clone(),
        );

        Self {
            settings,
            supervisor,
            current_power_state: None,
        }
    }

    /// Classify one reading and, if the state changed, regenerate the
    /// config and restart the idle daemon. Returns the newly applied
    /// state when a transition actually went through.
    ///
    /// Supervisor failures are logged and swallowed: the stale checksum
    /// makes the next reading for this state retry the full apply.
    pub async fn handle_reading(&mut self, reading: PowerReading) -> Option<PowerState> {
        let new_state = classify::classify(reading, self.settings.thresholds);

        if self.current_power_state == Some(new_state) {
            idebug!("daemon", "reading {:?} -> {} (unchanged)", reading, new_state);
            return None;
        }

        iinfo!(
            "daemon",
            "power state changed: {} -> {}",
            self.current_power_state
                .map(|s| s.to_string())
                .unwrap_or_else(|| "startup".to_string()),
            new_state
        );

        let profile = self.settings.profile_for(new_state).clone();

        match self.supervisor.apply(&profile).await {
            Ok(Applied::Restarted) => {
                self.current_power_state = Some(new_state);
                Some(new_state)
            }
            Ok(Applied::Unchanged) => {
                idebug!("daemon", "rendered config unchanged, no restart");
                self.current_power_state = Some(new_state);
                Some(new_state)
            }
            Err(e) => {
                // Recoverable: retried on the next state-change event
                // instead of busy-looping on a persistent failure.
                ierror!("daemon", "apply failed: {e}");
                None
            }
        }
    }

    pub async fn shutdown(&mut self) {
        iinfo!("daemon", "shutting down, stopping idle daemon");
        self.supervisor.shutdown().await;
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[cfg(test)]
    pub fn current_power_state(&self) -> Option<PowerState> {
        self.current_power_state
    }
}

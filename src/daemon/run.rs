use tokio::sync::{mpsc, watch};

use crate::core::events::DaemonMsg;
use crate::core::utils;
use crate::daemon::{Daemon, IdleRestarter};
use crate::idebug;
use crate::iinfo;

impl<R: IdleRestarter> Daemon<R> {
    /// Long-running monitor loop. Applies the initial state once, then
    /// processes debounced readings until shutdown is requested. One
    /// reading is handled to completion before the next is accepted.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        iinfo!("daemon", "daemon starting");

        let (tx, mut rx) = mpsc::channel::<DaemonMsg>(64);

        tokio::spawn(crate::services::power::run_monitor(
            tx,
            self.settings().debounce_ms,
            self.settings().poll_interval_secs,
            shutdown.clone(),
        ));

        // The generated config must exist before the first event.
        let initial = utils::read_power_reading();
        if let Some(state) = self.handle_reading(initial).await {
            self.notify_transition(state);
        }

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        iinfo!("daemon", "daemon stopping (shutdown requested)");
                        break;
                    }
                }

                maybe = rx.recv() => {
                    let Some(msg) = maybe else {
                        iinfo!("daemon", "daemon stopping (monitor channel closed)");
                        break;
                    };

                    match msg {
                        DaemonMsg::Reading { reading, now_ms } => {
                            idebug!("daemon", "reading at {now_ms}: {reading:?}");
                            if let Some(state) = self.handle_reading(reading).await {
                                self.notify_transition(state);
                            }
                        }
                    }
                }
            }
        }

        self.shutdown().await;
    }

    fn notify_transition(&self, state: crate::core::events::PowerState) {
        if !self.settings().enable_notifications {
            return;
        }

        let message = format!("Power state changed to {state}");
        let timeout = self.settings().notification_timeout_ms;

        let _ = utils::run_shell_command_silent(&format!(
            "notify-send -a Idlewatch -t {timeout} '{}'",
            utils::escape_single_quotes(&message)
        ));
    }
}

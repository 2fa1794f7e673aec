use std::io;
use std::path::PathBuf;

use eyre::Result;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::watch;

use crate::cli::Args;
use crate::daemon::{ChildRestarter, Daemon, SystemdRestarter};
use crate::iinfo;
use crate::iwarn;

pub async fn run(args: Args) -> Result<()> {
    // single-instance
    let _instance_lock = crate::app::platform::acquire_single_instance_lock().map_err(|e| {
        eprintln!("{e}");
        io::Error::new(io::ErrorKind::AlreadyExists, e)
    })?;

    iinfo!("app", "idlewatch starting");

    let config_path: PathBuf = match args.config.as_deref() {
        Some(p) => p.to_path_buf(),
        None => crate::config::resolve_default_config_path()?,
    };

    // Configuration problems are the one fatal startup case: running
    // with undefined action profiles is worse than not running.
    let settings = crate::config::load_from_path(&config_path)?;
    iinfo!("app", "configuration loaded from {}", config_path.display());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_signal_watcher(shutdown_tx);

    match settings.systemd_unit.clone() {
        Some(unit) => {
            iinfo!("app", "supervising via systemd unit {unit}");
            SystemdRestarter::ensure_unit_enabled(&unit);
            let mut daemon = Daemon::new(settings, SystemdRestarter::new(unit));
            daemon.run(shutdown_rx).await;
        }
        None => {
            let restarter = ChildRestarter::new(settings.hypridle_command.clone());
            let mut daemon = Daemon::new(settings, restarter);
            daemon.run(shutdown_rx).await;
        }
    }

    iinfo!("app", "idlewatch stopped");
    Ok(())
}

fn spawn_signal_watcher(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let mut term = match signal(SignalKind::terminate()) {
            Ok(s) => Some(s),
            Err(e) => {
                iwarn!("app", "cannot watch SIGTERM: {e}");
                None
            }
        };

        match term.as_mut() {
            Some(term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        iinfo!("app", "received Ctrl+C, shutting down");
                    }
                    _ = term.recv() => {
                        iinfo!("app", "received SIGTERM, shutting down");
                    }
                }
            }
            None => {
                let _ = tokio::signal::ctrl_c().await;
                iinfo!("app", "received Ctrl+C, shutting down");
            }
        }

        let _ = shutdown_tx.send(true);
    });
}

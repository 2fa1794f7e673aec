use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use zbus::{Connection, MatchRule, MessageStream};

use crate::core::events::{DaemonMsg, PowerReading};
use crate::core::utils;
use crate::idebug;
use crate::iinfo;
use crate::iwarn;

/// Fallback poll cycles between attempts to resubscribe to the bus.
const POLLS_PER_RESUBSCRIBE: u32 = 4;

/// When no debounce deadline is pending the timer is parked far away.
const PARK: Duration = Duration::from_secs(86400);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MonitorExit {
    StreamEnded,
    ChannelClosed,
    Shutdown,
}

/// Power-event monitor: subscribes to UPower property-change signals on
/// the system bus, debounces bursts and emits one fresh sysfs reading
/// per quiescent window. If the bus is unavailable it degrades to
/// periodic polling and keeps trying to resubscribe.
pub async fn run_monitor(
    tx: mpsc::Sender<DaemonMsg>,
    debounce_ms: u64,
    poll_interval_secs: u64,
    mut shutdown: watch::Receiver<bool>,
) {
    let debounce = Duration::from_millis(debounce_ms);
    let poll_interval = Duration::from_secs(poll_interval_secs);

    loop {
        match subscribe().await {
            Ok(stream) => {
                iinfo!("power", "subscribed to UPower property changes");

                let mut raw = stream.map(|_| ());
                let exit = debounce_readings(
                    &mut raw,
                    &tx,
                    debounce,
                    utils::read_power_reading,
                    &mut shutdown,
                )
                .await;

                match exit {
                    MonitorExit::StreamEnded => {
                        iwarn!("power", "event stream ended, falling back to polling");
                    }
                    MonitorExit::ChannelClosed | MonitorExit::Shutdown => return,
                }
            }
            Err(e) => {
                iwarn!("power", "UPower subscription failed ({e}), polling instead");
            }
        }

        // Coarse poll until the event source comes back. Responsiveness
        // degrades; the daemon does not.
        for _ in 0..POLLS_PER_RESUBSCRIBE {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
                _ = tokio::time::sleep(poll_interval) => {
                    let reading = utils::read_power_reading();
                    idebug!("power", "poll: {reading:?}");
                    if tx
                        .send(DaemonMsg::Reading { reading, now_ms: utils::now_ms() })
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
            }
        }
    }
}

async fn subscribe() -> zbus::Result<MessageStream> {
    let conn = Connection::system().await?;

    let rule = MatchRule::builder()
        .msg_type(zbus::message::Type::Signal)
        .interface("org.freedesktop.DBus.Properties")?
        .member("PropertiesChanged")?
        .path_namespace("/org/freedesktop/UPower")?
        .build();

    MessageStream::for_match_rule(rule, &conn, Some(32)).await
}

/// Collapse a bursty raw notification stream into quiescent readings.
///
/// Each raw notification resets the debounce deadline; only once the
/// source has been quiet for the full window is a single fresh reading
/// taken and emitted. A plug-in event that fans out into several
/// notifications therefore causes exactly one downstream apply.
pub(crate) async fn debounce_readings<S, F>(
    raw: &mut S,
    tx: &mpsc::Sender<DaemonMsg>,
    debounce: Duration,
    mut read_reading: F,
    shutdown: &mut watch::Receiver<bool>,
) -> MonitorExit
where
    S: futures::Stream<Item = ()> + Unpin,
    F: FnMut() -> PowerReading,
{
    let mut deadline: Option<Instant> = None;

    loop {
        let timer = tokio::time::sleep_until(deadline.unwrap_or_else(|| Instant::now() + PARK));

        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return MonitorExit::Shutdown;
                }
            }

            maybe = raw.next() => {
                match maybe {
                    Some(()) => {
                        idebug!("power", "raw power event, debouncing");
                        deadline = Some(Instant::now() + debounce);
                    }
                    None => return MonitorExit::StreamEnded,
                }
            }

            _ = timer, if deadline.is_some() => {
                deadline = None;
                let reading = read_reading();
                idebug!("power", "quiescent, emitting {reading:?}");
                if tx
                    .send(DaemonMsg::Reading { reading, now_ms: utils::now_ms() })
                    .await
                    .is_err()
                {
                    return MonitorExit::ChannelClosed;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn reading(on_ac: bool, pct: u8) -> PowerReading {
        PowerReading {
            on_ac,
            battery_percent: Some(pct),
        }
    }

    async fn drain(rx: &mut mpsc::Receiver<DaemonMsg>) -> Vec<PowerReading> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            let DaemonMsg::Reading { reading, .. } = msg;
            out.push(reading);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn burst_collapses_to_one_reading_of_the_last_value() {
        let (raw_tx, raw_rx) = futures::channel::mpsc::unbounded::<()>();
        let (tx, mut rx) = mpsc::channel::<DaemonMsg>(16);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let source = Arc::new(Mutex::new(reading(true, 80)));

        let loop_source = source.clone();
        let handle = tokio::spawn(async move {
            let mut raw = raw_rx;
            let mut shutdown = shutdown_rx;
            debounce_readings(
                &mut raw,
                &tx,
                Duration::from_millis(500),
                move || *loop_source.lock().unwrap(),
                &mut shutdown,
            )
            .await
        });

        // A burst of five notifications inside the window, with the
        // underlying facts changing as the burst goes.
        for pct in [80u8, 79, 78, 77, 60] {
            *source.lock().unwrap() = reading(false, pct);
            raw_tx.unbounded_send(()).unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        // Quiescence: let the debounce window elapse.
        tokio::time::sleep(Duration::from_millis(600)).await;

        let emitted = drain(&mut rx).await;
        assert_eq!(emitted, vec![reading(false, 60)]);

        drop(raw_tx);
        assert_eq!(handle.await.unwrap(), MonitorExit::StreamEnded);
    }

    #[tokio::test(start_paused = true)]
    async fn no_emission_before_quiescence() {
        let (raw_tx, raw_rx) = futures::channel::mpsc::unbounded::<()>();
        let (tx, mut rx) = mpsc::channel::<DaemonMsg>(16);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(async move {
            let mut raw = raw_rx;
            let mut shutdown = shutdown_rx;
            debounce_readings(
                &mut raw,
                &tx,
                Duration::from_millis(500),
                || reading(true, 100),
                &mut shutdown,
            )
            .await
        });

        // Keep the source noisy: the timer must keep resetting.
        for _ in 0..10 {
            raw_tx.unbounded_send(()).unwrap();
            tokio::time::sleep(Duration::from_millis(300)).await;
        }

        assert!(drain(&mut rx).await.is_empty());

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(drain(&mut rx).await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_the_wait() {
        let (_raw_tx, raw_rx) = futures::channel::mpsc::unbounded::<()>();
        let (tx, _rx) = mpsc::channel::<DaemonMsg>(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut raw = raw_rx;
            let mut shutdown = shutdown_rx;
            debounce_readings(
                &mut raw,
                &tx,
                Duration::from_millis(500),
                || reading(true, 100),
                &mut shutdown,
            )
            .await
        });

        shutdown_tx.send(true).unwrap();
        assert_eq!(handle.await.unwrap(), MonitorExit::Shutdown);
    }
}

//! Connectivity monitor.
//!
//! Periodically probes backend reachability and publishes transitions
//! through a watch channel, so subscribers see an ordered, de-duplicated
//! stream (never two consecutive readings with the same value). Offline
//! transitions publish immediately; online transitions are debounced so
//! a flapping link cannot trigger reconciliation storms.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

/// Minimal reachability seam. Production probes the backend's `/health`
/// endpoint; tests use scripted fakes.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn probe(&self) -> bool;
}

/// HTTP reachability probe against the backend health endpoint
#[derive(Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    health_url: String,
}

impl HttpProbe {
    pub fn new(health_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            health_url: health_url.into(),
        })
    }
}

#[async_trait]
impl ReachabilityProbe for HttpProbe {
    async fn probe(&self) -> bool {
        match self.client.get(&self.health_url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

/// Monitor timing knobs
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    /// How often to probe
    pub poll_interval: Duration,
    /// How long reachability must hold before an online transition fires
    pub online_debounce: Duration,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            online_debounce: Duration::from_secs(3),
        }
    }
}

/// Read side of the monitor, cheap to clone and share
#[derive(Debug, Clone)]
pub struct ConnectivityHandle {
    rx: watch::Receiver<bool>,
    // Present only for fixed handles, to keep the channel open
    _tx: Option<std::sync::Arc<watch::Sender<bool>>>,
}

impl ConnectivityHandle {
    /// Current reachability reading
    pub fn is_online(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait for the next transition and return the new reading.
    ///
    /// Returns `None` once the monitor has shut down.
    pub async fn changed(&mut self) -> Option<bool> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }

    /// A handle pinned to a fixed state, for offline-only flows and tests
    pub fn fixed(online: bool) -> Self {
        let (tx, rx) = watch::channel(online);
        Self {
            rx,
            _tx: Some(std::sync::Arc::new(tx)),
        }
    }

    pub(crate) const fn from_receiver(rx: watch::Receiver<bool>) -> Self {
        Self { rx, _tx: None }
    }
}

/// Owns the probe loop and the publishing side of the channel
pub struct ConnectivityMonitor<P> {
    probe: P,
    options: MonitorOptions,
    tx: watch::Sender<bool>,
}

impl<P: ReachabilityProbe> ConnectivityMonitor<P> {
    /// Create a monitor, probing once so the first reading is real
    /// rather than an assumed default.
    pub async fn start(probe: P, options: MonitorOptions) -> Self {
        let initial = probe.probe().await;
        tracing::info!(online = initial, "connectivity monitor started");
        let (tx, _rx) = watch::channel(initial);
        Self { probe, options, tx }
    }

    /// Subscribe to the current state and future transitions
    pub fn handle(&self) -> ConnectivityHandle {
        ConnectivityHandle::from_receiver(self.tx.subscribe())
    }

    /// Probe loop. Runs until every [`ConnectivityHandle`] is dropped.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.options.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut reachable_since: Option<Instant> = None;

        loop {
            ticker.tick().await;
            if self.tx.receiver_count() == 0 {
                tracing::debug!("all connectivity handles dropped, stopping monitor");
                return;
            }

            let reachable = self.probe.probe().await;
            let published = *self.tx.borrow();

            if !reachable {
                reachable_since = None;
                if published {
                    tracing::warn!("connectivity lost");
                    self.tx.send_replace(false);
                }
            } else if published {
                reachable_since = None;
            } else {
                let since = *reachable_since.get_or_insert_with(Instant::now);
                if since.elapsed() >= self.options.online_debounce {
                    tracing::info!("connectivity restored");
                    self.tx.send_replace(true);
                    reachable_since = None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Probe that replays a scripted sequence, repeating the last value
    struct ScriptedProbe {
        readings: Mutex<VecDeque<bool>>,
        after: bool,
    }

    impl ScriptedProbe {
        fn new(readings: &[bool], after: bool) -> Self {
            Self {
                readings: Mutex::new(readings.iter().copied().collect()),
                after,
            }
        }
    }

    #[async_trait]
    impl ReachabilityProbe for ScriptedProbe {
        async fn probe(&self) -> bool {
            self.readings
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(self.after)
        }
    }

    fn options(poll_ms: u64, debounce_ms: u64) -> MonitorOptions {
        MonitorOptions {
            poll_interval: Duration::from_millis(poll_ms),
            online_debounce: Duration::from_millis(debounce_ms),
        }
    }

    #[tokio::test]
    async fn start_probes_once_for_the_first_reading() {
        let monitor =
            ConnectivityMonitor::start(ScriptedProbe::new(&[true], false), options(50, 0)).await;
        assert!(monitor.handle().is_online());

        let monitor =
            ConnectivityMonitor::start(ScriptedProbe::new(&[false], true), options(50, 0)).await;
        assert!(!monitor.handle().is_online());
    }

    #[tokio::test(start_paused = true)]
    async fn offline_transition_fires_immediately() {
        let probe = ScriptedProbe::new(&[true, false], false);
        let monitor = ConnectivityMonitor::start(probe, options(100, 5_000)).await;
        let mut handle = monitor.handle();
        tokio::spawn(monitor.run());

        assert_eq!(handle.changed().await, Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn online_transition_waits_for_debounce() {
        let probe = ScriptedProbe::new(&[false], true);
        let monitor = ConnectivityMonitor::start(probe, options(1_000, 3_000)).await;
        let handle = monitor.handle();
        tokio::spawn(monitor.run());

        // Reachable from the first poll, but the debounce window has not
        // elapsed yet
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert!(!handle.is_online());

        tokio::time::sleep(Duration::from_millis(3_000)).await;
        assert!(handle.is_online());
    }

    #[tokio::test(start_paused = true)]
    async fn flapping_link_does_not_emit_online() {
        // Alternates every poll; never stable long enough for the debounce
        let probe = ScriptedProbe::new(
            &[false, true, false, true, false, true, false, true, false],
            false,
        );
        let monitor = ConnectivityMonitor::start(probe, options(1_000, 2_500)).await;
        let handle = monitor.handle();
        tokio::spawn(monitor.run());

        tokio::time::sleep(Duration::from_millis(9_000)).await;
        assert!(!handle.is_online());
    }

    #[tokio::test(start_paused = true)]
    async fn consecutive_duplicate_events_are_never_emitted() {
        let probe = ScriptedProbe::new(&[false, true, true, true, true, false], false);
        let monitor = ConnectivityMonitor::start(probe, options(1_000, 0)).await;
        let mut handle = monitor.handle();
        tokio::spawn(monitor.run());

        let mut events = Vec::new();
        for _ in 0..2 {
            if let Some(state) = handle.changed().await {
                events.push(state);
            }
        }
        assert_eq!(events, vec![true, false]);
    }
}

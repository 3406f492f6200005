//! Connectivity tracking: platform signals, HTTP probes, and the SYNCING
//! refinement held while a sweep or pull runs.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use paykeep_core::errors::TransportError;
use paykeep_core::models::{ConnectionStatus, HttpRequest};
use paykeep_core::traits::HttpTransport;
use paykeep_observability::tracing_setup::events;

use crate::events::{EventBus, SyncEvent};

#[derive(Debug)]
struct MonitorState {
    platform_online: bool,
    syncing: usize,
}

impl MonitorState {
    fn status(&self) -> ConnectionStatus {
        if !self.platform_online {
            ConnectionStatus::Offline
        } else if self.syncing > 0 {
            ConnectionStatus::Syncing
        } else {
            ConnectionStatus::Online
        }
    }
}

/// Tracks ONLINE / OFFLINE / SYNCING and publishes every transition on
/// the event bus and a watch channel.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    state: Mutex<MonitorState>,
    status_tx: watch::Sender<ConnectionStatus>,
    events: EventBus,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool, events: EventBus) -> Arc<Self> {
        let state = MonitorState {
            platform_online: initially_online,
            syncing: 0,
        };
        let (status_tx, _) = watch::channel(state.status());
        Arc::new(Self {
            state: Mutex::new(state),
            status_tx,
            events,
        })
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status_tx.borrow()
    }

    /// True for ONLINE and SYNCING.
    pub fn is_online(&self) -> bool {
        self.status().is_online()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    /// Platform online/offline notification.
    pub fn set_platform_online(&self, online: bool) {
        self.update(|state| state.platform_online = online);
    }

    /// Ask the server directly. Any HTTP response means online; a
    /// network failure or timeout means offline. A request that could
    /// not be built says nothing about connectivity.
    pub async fn probe(&self, transport: &dyn HttpTransport, url: &str) -> ConnectionStatus {
        match transport.send(HttpRequest::get(url)).await {
            Ok(_) => self.set_platform_online(true),
            Err(TransportError::Network { .. } | TransportError::Timeout { .. }) => {
                self.set_platform_online(false)
            }
            Err(e) => tracing::warn!(error = %e, url = %url, "connectivity probe not sent"),
        }
        self.status()
    }

    /// Enter SYNCING until the returned guard is dropped. Guards nest.
    pub fn begin_syncing(self: &Arc<Self>) -> SyncingGuard {
        self.update(|state| state.syncing += 1);
        SyncingGuard {
            monitor: Arc::clone(self),
        }
    }

    fn update(&self, f: impl FnOnce(&mut MonitorState)) {
        let (before, after) = {
            let mut state = match self.state.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let before = state.status();
            f(&mut state);
            let after = state.status();
            if before != after {
                self.status_tx.send_replace(after);
            }
            (before, after)
        };
        if before != after {
            events::connection_changed(&before.to_string(), &after.to_string());
            self.events
                .emit(SyncEvent::ConnectionChanged { status: after });
        }
    }
}

/// Holds the monitor in SYNCING.
#[derive(Debug)]
pub struct SyncingGuard {
    monitor: Arc<ConnectivityMonitor>,
}

impl Drop for SyncingGuard {
    fn drop(&mut self) {
        self.monitor
            .update(|state| state.syncing = state.syncing.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syncing_guards_nest() {
        let monitor = ConnectivityMonitor::new(true, EventBus::default());
        let outer = monitor.begin_syncing();
        let inner = monitor.begin_syncing();
        assert_eq!(monitor.status(), ConnectionStatus::Syncing);
        drop(inner);
        assert_eq!(monitor.status(), ConnectionStatus::Syncing);
        drop(outer);
        assert_eq!(monitor.status(), ConnectionStatus::Online);
    }

    #[test]
    fn offline_wins_over_syncing() {
        let monitor = ConnectivityMonitor::new(true, EventBus::default());
        let _guard = monitor.begin_syncing();
        monitor.set_platform_online(false);
        assert_eq!(monitor.status(), ConnectionStatus::Offline);
        assert!(!monitor.is_online());
        monitor.set_platform_online(true);
        assert_eq!(monitor.status(), ConnectionStatus::Syncing);
        assert!(monitor.is_online());
    }

    #[test]
    fn transitions_are_published_once() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let monitor = ConnectivityMonitor::new(true, bus);
        let mut watch_rx = monitor.subscribe();

        monitor.set_platform_online(false);
        monitor.set_platform_online(false);
        monitor.set_platform_online(true);

        assert_eq!(
            rx.try_recv().unwrap(),
            SyncEvent::ConnectionChanged { status: ConnectionStatus::Offline }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            SyncEvent::ConnectionChanged { status: ConnectionStatus::Online }
        );
        assert!(rx.try_recv().is_err());
        assert!(watch_rx.has_changed().unwrap());
        assert_eq!(*watch_rx.borrow_and_update(), ConnectionStatus::Online);
    }
}

//! Online/offline detection.
//!
//! Mirrors the platform model of an "active network" with a capability
//! snapshot. The repository asks synchronously before every remote call, so
//! implementations must answer from cached state and never touch the network.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// The network the host currently routes through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkHandle {
    pub name: String,
}

impl NetworkHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// What the active network is able to do right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetworkCapabilities {
    /// The network claims to reach the internet.
    pub internet: bool,
    /// Reachability of the internet has actually been confirmed.
    pub validated: bool,
}

pub trait Connectivity: Send + Sync {
    fn active_network(&self) -> Option<NetworkHandle>;

    fn capabilities(&self, network: &NetworkHandle) -> Option<NetworkCapabilities>;
}

/// True only when there is an active network whose capabilities are known
/// and include both `internet` and `validated`.
pub fn is_online(connectivity: &dyn Connectivity) -> bool {
    let Some(network) = connectivity.active_network() else {
        return false;
    };
    let Some(caps) = connectivity.capabilities(&network) else {
        return false;
    };
    caps.internet && caps.validated
}

const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);
const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(30);

/// Result of the most recent probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSnapshot {
    pub network: NetworkHandle,
    pub capabilities: NetworkCapabilities,
}

/// Host connectivity derived from the API endpoint: the network is "active"
/// when the API host resolves, and "validated" when a TCP connection to it
/// succeeds within the probe timeout.
///
/// Queries read the last published snapshot. Until the first probe
/// completes there is no active network.
#[derive(Debug)]
pub struct ProbeConnectivity {
    host: String,
    port: u16,
    timeout: Duration,
    interval: Duration,
    snapshot: watch::Sender<Option<NetworkSnapshot>>,
}

impl ProbeConnectivity {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let (snapshot, _) = watch::channel(None);
        Self {
            host: host.into(),
            port,
            timeout: DEFAULT_PROBE_TIMEOUT,
            interval: DEFAULT_PROBE_INTERVAL,
            snapshot,
        }
    }

    /// Build a probe for the host of an API base URL. Returns `None` when
    /// the URL has no host.
    pub fn from_base_url(base_url: &str) -> Option<Self> {
        let url = reqwest::Url::parse(base_url).ok()?;
        let host = url.host_str()?.to_string();
        let port = url.port_or_known_default()?;
        Some(Self::new(host, port))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<NetworkSnapshot>> {
        self.snapshot.subscribe()
    }

    /// Probe the API host once and publish the result. Returns whether the
    /// host is now considered online.
    pub async fn refresh(&self) -> bool {
        let snapshot = self.probe().await;
        let online = snapshot
            .as_ref()
            .is_some_and(|s| s.capabilities.internet && s.capabilities.validated);
        self.snapshot.send_replace(snapshot);
        online
    }

    async fn probe(&self) -> Option<NetworkSnapshot> {
        let addrs: Vec<_> = match tokio::net::lookup_host((self.host.as_str(), self.port)).await {
            Ok(addrs) => addrs.collect(),
            Err(e) => {
                debug!(host = %self.host, error = %e, "API host does not resolve");
                return None;
            }
        };
        if addrs.is_empty() {
            return None;
        }

        let mut validated = false;
        for addr in addrs {
            if let Ok(Ok(_)) = tokio::time::timeout(self.timeout, TcpStream::connect(addr)).await {
                validated = true;
                break;
            }
        }

        let network = NetworkHandle::new(format!("{}:{}", self.host, self.port));
        debug!(network = %network.name, validated, "Probed API host");
        Some(NetworkSnapshot {
            network,
            capabilities: NetworkCapabilities {
                internet: true,
                validated,
            },
        })
    }

    /// Re-probe every interval in the background. The task ends once the
    /// last `Arc` to this probe is dropped.
    pub fn start_monitor(self: &Arc<Self>) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        let interval = self.interval;
        tokio::spawn(async move {
            loop {
                let Some(probe) = weak.upgrade() else {
                    break;
                };
                probe.refresh().await;
                drop(probe);
                tokio::time::sleep(interval).await;
            }
            debug!("Connectivity monitor stopped");
        })
    }
}

impl Connectivity for ProbeConnectivity {
    fn active_network(&self) -> Option<NetworkHandle> {
        self.snapshot.borrow().as_ref().map(|s| s.network.clone())
    }

    fn capabilities(&self, network: &NetworkHandle) -> Option<NetworkCapabilities> {
        self.snapshot
            .borrow()
            .as_ref()
            .filter(|s| s.network == *network)
            .map(|s| s.capabilities)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::FakeConnectivity;
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::net::TcpListener;

    fn fake(network: bool, caps: bool, internet: bool, validated: bool) -> FakeConnectivity {
        FakeConnectivity {
            has_network: AtomicBool::new(network),
            has_capabilities: AtomicBool::new(caps),
            internet: AtomicBool::new(internet),
            validated: AtomicBool::new(validated),
        }
    }

    #[test]
    fn test_missing_network_or_capabilities_is_offline() {
        assert!(!is_online(&fake(false, false, true, true)));
        assert!(!is_online(&fake(false, true, true, true)));
        assert!(!is_online(&fake(true, false, true, true)));
        assert!(is_online(&fake(true, true, true, true)));
    }

    #[test]
    fn test_both_capability_flags_required() {
        assert!(!is_online(&fake(true, true, false, false)));
        assert!(!is_online(&fake(true, true, true, false)));
        assert!(!is_online(&fake(true, true, false, true)));
        assert!(is_online(&fake(true, true, true, true)));
    }

    #[test]
    fn test_fake_can_flip() {
        let connectivity = FakeConnectivity::offline();
        assert!(!is_online(&connectivity));
        connectivity.set_online(true);
        assert!(is_online(&connectivity));
        connectivity.validated.store(false, Ordering::SeqCst);
        assert!(!is_online(&connectivity));
    }

    #[test]
    fn test_probe_from_base_url() {
        let probe = ProbeConnectivity::from_base_url("https://api.example.com/v1").unwrap();
        assert_eq!(probe.host, "api.example.com");
        assert_eq!(probe.port, 443);

        let probe = ProbeConnectivity::from_base_url("http://localhost:8080").unwrap();
        assert_eq!(probe.port, 8080);

        assert!(ProbeConnectivity::from_base_url("not a url").is_none());
    }

    #[test]
    fn test_probe_offline_until_first_refresh() {
        let probe = ProbeConnectivity::new("127.0.0.1", 9);
        assert!(probe.active_network().is_none());
        assert!(!is_online(&probe));
    }

    #[tokio::test]
    async fn test_probe_validates_listening_host() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let probe = ProbeConnectivity::new("127.0.0.1", port);
        assert!(probe.refresh().await);
        assert!(is_online(&probe));

        drop(listener);
        let probe = probe.with_timeout(Duration::from_millis(200));
        assert!(!probe.refresh().await);
        let network = probe.active_network().unwrap();
        assert_eq!(
            probe.capabilities(&network),
            Some(NetworkCapabilities {
                internet: true,
                validated: false
            })
        );
        assert_eq!(probe.capabilities(&NetworkHandle::new("elsewhere")), None);
    }

    #[tokio::test]
    async fn test_monitor_tracks_host_going_away() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let probe = Arc::new(
            ProbeConnectivity::new("127.0.0.1", port)
                .with_timeout(Duration::from_millis(200))
                .with_interval(Duration::from_millis(20)),
        );
        let mut rx = probe.subscribe();
        let monitor = probe.start_monitor();

        tokio::time::timeout(Duration::from_secs(2), async {
            while !is_online(probe.as_ref()) {
                rx.changed().await.unwrap();
            }
        })
        .await
        .unwrap();

        drop(listener);
        tokio::time::timeout(Duration::from_secs(2), async {
            while is_online(probe.as_ref()) {
                rx.changed().await.unwrap();
            }
        })
        .await
        .unwrap();

        drop(rx);
        drop(probe);
        tokio::time::timeout(Duration::from_secs(2), monitor)
            .await
            .unwrap()
            .unwrap();
    }
}

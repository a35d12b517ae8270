//! The connection probe: the listening port and public IP reported to
//! trackers.
//!
//! A TCP listener is bound on the first free port of the usual ephemeral
//! range and held for the whole session so the port stays plausible. The
//! public address is read from a shuffled list of plain-text IP providers and
//! refreshed on a slow loop; when every provider fails the last known address
//! is reused, falling back to loopback.
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use rand::seq::SliceRandom;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const PORT_RANGE_START: u16 = 49152;
pub const PORT_RANGE_END: u16 = 65534;

/// How often the public IP is re-resolved.
pub const IP_REFRESH_INTERVAL: Duration = Duration::from_secs(90 * 60);

const IP_PROVIDERS: &[&str] = &[
    "http://whatismyip.akamai.com",
    "http://ipecho.net/plain",
    "http://ip.tyk.nu/",
    "http://l2.io/ip",
    "http://ident.me/",
    "http://icanhazip.com/",
    "https://api.ipify.org",
    "https://ipinfo.io/ip",
    "https://checkip.amazonaws.com",
];

const IP_PROVIDER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36";

#[derive(thiserror::Error, Debug)]
pub enum ConnectionError {
    #[error("no available port for the emulated client")]
    NoAvailablePort,
}

/// Holds the listening socket and the last resolved public address.
pub struct ConnectionProbe {
    listener: RwLock<Option<TcpListener>>,
    port: AtomicU16,
    ip_address: RwLock<IpAddr>,
    http_client: reqwest::Client,
}

impl Default for ConnectionProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionProbe {
    #[must_use]
    pub fn new() -> Self {
        Self {
            listener: RwLock::new(None),
            port: AtomicU16::new(0),
            ip_address: RwLock::new(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            http_client: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .timeout(Duration::from_secs(10))
                .build()
                .expect("the probe http client should build"),
        }
    }

    /// Binds the listening port and resolves the initial public address.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::NoAvailablePort`] when the whole port range
    /// is taken.
    pub async fn start(&self) -> Result<(), ConnectionError> {
        let listener = self.bind_to_port().await?;
        let port = listener
            .local_addr()
            .map_err(|_| ConnectionError::NoAvailablePort)?
            .port();

        *self.listener.write().expect("the listener lock is poisoned") = Some(listener);
        self.port.store(port, Ordering::SeqCst);
        tracing::info!("Listening for incoming peer connections on port {port}");

        self.refresh_ip().await;
        tracing::info!("IP reported to trackers will be: {}", self.reported_ip());

        Ok(())
    }

    /// Re-resolves the public address, keeping the previous one on failure.
    pub async fn refresh_ip(&self) {
        let resolved = self.try_fetch_from_providers().await;

        match resolved {
            Some(ip) => {
                tracing::info!("Successfully fetched public IP address: {ip}");
                *self.ip_address.write().expect("the ip lock is poisoned") = ip;
            }
            None => {
                tracing::warn!(
                    "Failed to fetch the public IP address, reusing the last known address: {}",
                    self.reported_ip()
                );
            }
        }
    }

    /// The address trackers are told about.
    #[must_use]
    pub fn reported_ip(&self) -> IpAddr {
        *self.ip_address.read().expect("the ip lock is poisoned")
    }

    /// The listening port trackers are told about. Zero before [`Self::start`].
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port.load(Ordering::SeqCst)
    }

    pub fn close(&self) {
        tracing::debug!("Closing the connection probe");
        self.listener.write().expect("the listener lock is poisoned").take();
    }

    async fn try_fetch_from_providers(&self) -> Option<IpAddr> {
        let mut providers: Vec<&str> = IP_PROVIDERS.to_vec();
        providers.shuffle(&mut rand::rng());

        for provider in providers {
            tracing::info!("Fetching ip from {provider}");
            match self.read_ip_from_provider(provider).await {
                Ok(ip) => return Some(ip),
                Err(reason) => tracing::warn!("Failed to fetch IP from {provider}: {reason}"),
            }
        }

        None
    }

    async fn read_ip_from_provider(&self, provider_url: &str) -> Result<IpAddr, String> {
        let response = self
            .http_client
            .get(provider_url)
            .header("user-agent", IP_PROVIDER_USER_AGENT)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let body = response.text().await.map_err(|e| e.to_string())?;

        body.trim().parse::<IpAddr>().map_err(|e| e.to_string())
    }

    async fn bind_to_port(&self) -> Result<TcpListener, ConnectionError> {
        for port in PORT_RANGE_START..=PORT_RANGE_END {
            let address = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
            match TcpListener::bind(address).await {
                Ok(listener) => return Ok(listener),
                Err(e) => {
                    tracing::debug!("Could not bind to port {port}: {e}, trying next port...");
                }
            }
        }

        Err(ConnectionError::NoAvailablePort)
    }
}

/// Keeps the reported public address fresh.
#[must_use]
pub fn start_ip_refresh_job(probe: Arc<ConnectionProbe>, cancellation_token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;

                () = cancellation_token.cancelled() => {
                    tracing::info!("Received cancellation request, shutting down the IP refresh loop.");
                    break;
                }

                () = tokio::time::sleep(IP_REFRESH_INTERVAL) => {
                    probe.refresh_ip().await;
                }
            }
        }
    })
}

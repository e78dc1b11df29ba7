use std::{path::PathBuf, time::Duration};

use size::Size;

use crate::core::PeerId;

/// Session configuration. All policy constants live here rather than being
/// baked into the components that apply them.
#[derive(Clone, Debug)]
pub struct Config {
    // Identity and network settings
    /// Unique identifier for this client in the swarm
    pub client_id: PeerId,
    /// Directory downloaded files are placed under
    pub download_path: PathBuf,
    /// Port number to listen on for incoming connections
    pub port: u16,
    /// Maximum number of simultaneously connected peers
    pub max_connections: usize,
    /// Timeout for establishing new connections and handshakes
    pub connect_timeout: Duration,
    /// How long a failed peer address is kept in reconnect cooldown
    pub failed_peer_cooldown: Duration,

    // Scheduler settings
    /// Maximum number of concurrent block requests per peer
    pub max_concurrent_requests_per_peer: usize,
    /// Size of data blocks for piece transfers
    pub block_size: Size,

    // Choker settings
    /// Interval between choking algorithm runs
    pub choking_interval: Duration,
    /// Number of peers unchoked for their download rate
    pub top_peers_to_unchoke: usize,
    /// Number of choking cycles between optimistic unchoking attempts
    pub optimistic_choking_cycle: usize,

    // Data integrity settings
    /// Number of failed piece verifications before a contributing peer is banned
    pub corruption_limit: u32,

    // Sweeper settings
    /// Interval between sweeps for idle peers and abandoned blocks
    pub sweep_interval: Duration,
    /// Time after which an idle peer is disconnected
    pub idle_peer_timeout: Duration,
    /// Time after which a block request is considered abandoned
    pub block_timeout: Duration,

    // Event system settings
    /// Interval between keep-alive messages
    pub keep_alive_interval: Duration,
    /// Interval between statistics updates
    pub update_stats_interval: Duration,
    /// Size of the event queue buffer
    pub events_buffer: usize,
    /// Size of the channel buffer for peer communication
    pub channel_buffer: usize,
}

impl Config {
    pub fn new(download_path: PathBuf) -> Self {
        let keep_alive_interval = Duration::from_secs(120);
        Self {
            client_id: PeerId::random(),
            download_path,
            port: 6881,
            max_connections: 50,
            connect_timeout: Duration::from_secs(10),
            failed_peer_cooldown: Duration::from_secs(60),
            max_concurrent_requests_per_peer: 5,
            block_size: Size::from_kibibytes(16),
            choking_interval: Duration::from_secs(10),
            top_peers_to_unchoke: 3,
            optimistic_choking_cycle: 3,
            corruption_limit: 3,
            sweep_interval: Duration::from_secs(5),
            idle_peer_timeout: keep_alive_interval * 2,
            block_timeout: Duration::from_secs(30),
            keep_alive_interval,
            update_stats_interval: Duration::from_secs(1),
            events_buffer: 128,
            channel_buffer: 16,
        }
    }
}

#[allow(dead_code)]
impl Config {
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_keep_alive_interval(mut self, interval: Duration) -> Self {
        self.keep_alive_interval = interval;
        self
    }

    pub fn with_unchoking_interval(mut self, interval: Duration) -> Self {
        self.choking_interval = interval;
        self
    }

    pub fn with_optimistic_unchoking_cycle(mut self, n: usize) -> Self {
        self.optimistic_choking_cycle = n;
        self
    }

    pub fn with_block_size(mut self, size: Size) -> Self {
        self.block_size = size;
        self
    }

    pub fn with_max_concurrent_requests_per_peer(mut self, n: usize) -> Self {
        self.max_concurrent_requests_per_peer = n;
        self
    }

    pub fn with_max_connections(mut self, n: usize) -> Self {
        self.max_connections = n;
        self
    }

    pub fn with_corruption_limit(mut self, n: u32) -> Self {
        self.corruption_limit = n;
        self
    }

    pub fn with_idle_peer_timeout(mut self, timeout: Duration) -> Self {
        self.idle_peer_timeout = timeout;
        self
    }
}

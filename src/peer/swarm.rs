use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::time::Duration;

use tokio::time::Instant;

use crate::client::Config;

/// Connection-policy bookkeeping for the set of known peer addresses.
///
/// Tracks which addresses are connected, which recently failed (and are in a
/// cooldown before reconnection), which are banned for serving corrupt data,
/// and whether a connected peer has sent its first message yet (the bitfield
/// is only legal as the very first one).
pub struct Swarm {
    max_connections: usize,
    failed_cooldown: Duration,
    corruption_limit: u32,
    connected: HashSet<SocketAddr>,
    greeted: HashSet<SocketAddr>,
    recently_failed: HashMap<SocketAddr, Instant>,
    corruption: HashMap<SocketAddr, u32>,
    banned: HashSet<SocketAddr>,
}

impl Swarm {
    pub fn new(config: &Config) -> Self {
        Self {
            max_connections: config.max_connections,
            failed_cooldown: config.failed_peer_cooldown,
            corruption_limit: config.corruption_limit,
            connected: HashSet::new(),
            greeted: HashSet::new(),
            recently_failed: HashMap::new(),
            corruption: HashMap::new(),
            banned: HashSet::new(),
        }
    }

    /// Whether a new connection to `addr` should be opened or accepted.
    pub fn can_connect(&self, addr: &SocketAddr, now: Instant) -> bool {
        if self.connected.contains(addr) || self.banned.contains(addr) {
            return false;
        }
        if self.connected.len() >= self.max_connections {
            return false;
        }
        match self.recently_failed.get(addr) {
            Some(failed_at) => *failed_at + self.failed_cooldown <= now,
            None => true,
        }
    }

    pub fn connected(&mut self, addr: SocketAddr) {
        self.connected.insert(addr);
    }

    pub fn is_connected(&self, addr: &SocketAddr) -> bool {
        self.connected.contains(addr)
    }

    pub fn connections(&self) -> usize {
        self.connected.len()
    }

    /// Records a connection teardown. Failed connections put the address in
    /// cooldown so it is not immediately retried.
    pub fn disconnected(&mut self, addr: &SocketAddr, failed: bool, now: Instant) {
        self.connected.remove(addr);
        self.greeted.remove(addr);
        if failed {
            self.recently_failed.insert(*addr, now);
        }
    }

    /// Returns `true` the first time a message from `addr` is seen since it
    /// connected.
    pub fn first_message(&mut self, addr: SocketAddr) -> bool {
        self.greeted.insert(addr)
    }

    /// Bumps the peer's corruption score. Returns `true` when the score
    /// reaches the configured limit, banning the address.
    pub fn record_corruption(&mut self, addr: SocketAddr) -> bool {
        let score = self.corruption.entry(addr).or_insert(0);
        *score += 1;
        if *score >= self.corruption_limit {
            self.banned.insert(addr);
            return true;
        }
        false
    }

    pub fn is_banned(&self, addr: &SocketAddr) -> bool {
        self.banned.contains(addr)
    }
}

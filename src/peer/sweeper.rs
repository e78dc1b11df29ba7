use std::{cmp::Reverse, net::SocketAddr, time::Duration};

use priority_queue::PriorityQueue;
use tokio::time::Instant;

use crate::message::Block;

/// Tracks peer activity and in-flight block requests so that idle peers can
/// be disconnected and stuck requests reassigned.
pub struct Sweeper {
    /// Duration after which a peer with no activity is considered idle
    idle_peer_timeout: Duration,
    /// Duration after which a block request is considered abandoned
    block_timeout: Duration,
    /// Last activity timestamp for each peer, least recent first
    peer_activity: PriorityQueue<SocketAddr, Reverse<Instant>>,
    /// Request timestamp for each block in flight, least recent first
    blocks_in_flight: PriorityQueue<(SocketAddr, Block), Reverse<Instant>>,
}

impl Sweeper {
    pub fn new(idle_peer_timeout: Duration, block_timeout: Duration) -> Self {
        Self {
            idle_peer_timeout,
            block_timeout,
            peer_activity: PriorityQueue::new(),
            blocks_in_flight: PriorityQueue::new(),
        }
    }

    pub fn update_peer_activity(&mut self, addr: SocketAddr, instant: Instant) {
        self.peer_activity.push_decrease(addr, Reverse(instant));
    }

    pub fn block_requested(&mut self, addr: SocketAddr, block: Block, instant: Instant) {
        self.blocks_in_flight.push((addr, block), Reverse(instant));
    }

    pub fn block_downloaded(&mut self, addr: SocketAddr, block: Block) {
        self.blocks_in_flight
            .remove(&(addr, block))
            .expect("block not found");
    }

    pub fn sweep(&mut self, now: Instant) -> SweepResult {
        let mut peers = Vec::new();
        while let Some(addr) = self.pop_idle_peer(now) {
            peers.push(addr);
        }
        let mut blocks = Vec::new();
        while let Some(block) = self.pop_abandoned_block(now) {
            blocks.push(block);
        }
        SweepResult { peers, blocks }
    }

    pub fn peer_disconnected(&mut self, addr: &SocketAddr) {
        self.peer_activity.remove(addr);
        self.blocks_in_flight
            .retain_mut(|(other, _), _| other != addr);
    }

    fn pop_idle_peer(&mut self, now: Instant) -> Option<SocketAddr> {
        self.peer_activity
            .pop_if(|_, Reverse(last_activity)| *last_activity + self.idle_peer_timeout <= now)
            .map(|(addr, _)| addr)
    }

    fn pop_abandoned_block(&mut self, now: Instant) -> Option<(SocketAddr, Block)> {
        self.blocks_in_flight
            .pop_if(|_, Reverse(block_request_time)| {
                *block_request_time + self.block_timeout <= now
            })
            .map(|(block, _)| block)
    }
}

pub struct SweepResult {
    pub peers: Vec<SocketAddr>,
    pub blocks: Vec<(SocketAddr, Block)>,
}

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::net::SocketAddr;

use rand::seq::IteratorRandom;

use crate::core::TransferRate;

/// Runs the choking algorithm: every pass unchokes the top peers by observed
/// download rate, and periodically one additional random "optimistic" peer so
/// that faster peers can be discovered.
pub struct Choker {
    interested: HashSet<SocketAddr>,
    unchoked: HashSet<SocketAddr>,
    transfer_rates: HashMap<SocketAddr, TransferRate>,
    top_peers: usize,
    optimistic_cycle: usize,
    runs: usize,
}

impl Choker {
    pub fn new(top_peers: usize, optimistic_cycle: usize) -> Self {
        Self {
            interested: HashSet::new(),
            unchoked: HashSet::new(),
            transfer_rates: HashMap::new(),
            top_peers,
            optimistic_cycle,
            runs: 0,
        }
    }

    pub fn peer_interested(&mut self, addr: SocketAddr) {
        self.interested.insert(addr);
    }

    pub fn peer_not_interested(&mut self, addr: &SocketAddr) {
        self.interested.remove(addr);
    }

    pub fn update_peer_transfer_rate(&mut self, addr: SocketAddr, rate: TransferRate) {
        *self.transfer_rates.entry(addr).or_default() += rate;
    }

    pub fn is_unchoked(&self, addr: &SocketAddr) -> bool {
        self.unchoked.contains(addr)
    }

    pub fn peer_disconnected(&mut self, addr: &SocketAddr) {
        self.interested.remove(addr);
        self.unchoked.remove(addr);
        self.transfer_rates.remove(addr);
    }

    pub fn run(&mut self) -> ChokeDecision {
        let optimistic = self.runs % self.optimistic_cycle == 0;
        self.runs += 1;
        let decision = choke(
            &self.interested,
            &self.unchoked,
            &self.transfer_rates,
            self.top_peers,
            optimistic,
        );
        for addr in &decision.peers_to_choke {
            self.unchoked.remove(addr);
        }
        self.unchoked.extend(decision.peers_to_unchoke.iter().copied());
        decision
    }
}

pub struct ChokeDecision {
    pub peers_to_choke: HashSet<SocketAddr>,
    pub peers_to_unchoke: HashSet<SocketAddr>,
}

fn choke(
    interested: &HashSet<SocketAddr>,
    unchoked: &HashSet<SocketAddr>,
    transfer_rates: &HashMap<SocketAddr, TransferRate>,
    top_peers: usize,
    optimistic: bool,
) -> ChokeDecision {
    let mut heap = BinaryHeap::with_capacity(top_peers + 1);
    for peer in interested {
        let transfer_rate = transfer_rates.get(peer).unwrap_or(&TransferRate::EMPTY);
        heap.push(Reverse(PeerByTransferRate(*peer, *transfer_rate)));
        if heap.len() > top_peers {
            heap.pop();
        }
    }

    let mut peers_to_choke = unchoked.clone();
    let mut peers_to_unchoke = HashSet::with_capacity(top_peers + 1);
    for Reverse(PeerByTransferRate(peer, _)) in heap {
        peers_to_choke.remove(&peer);
        peers_to_unchoke.insert(peer);
    }

    if optimistic {
        let mut rng = rand::rng();
        let random_peer = interested
            .iter()
            .filter(|&peer| !peers_to_unchoke.contains(peer))
            .choose(&mut rng);
        if let Some(peer) = random_peer {
            peers_to_choke.remove(peer);
            peers_to_unchoke.insert(*peer);
        }
    }

    ChokeDecision {
        peers_to_choke,
        peers_to_unchoke,
    }
}

struct PeerByTransferRate(SocketAddr, TransferRate);

impl Eq for PeerByTransferRate {}

impl PartialEq for PeerByTransferRate {
    fn eq(&self, other: &Self) -> bool {
        self.1.eq(&other.1)
    }
}

impl Ord for PeerByTransferRate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.1.cmp(&other.1)
    }
}

impl PartialOrd for PeerByTransferRate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use size::Size;

    use super::*;

    const SEC: Duration = Duration::from_secs(1);
    const TOP_PEERS: usize = 3;

    #[test]
    fn less_than_3_interested_peers() {
        let peer1 = "127.0.0.1:6881".parse().unwrap();
        let peer2 = "127.0.0.2:6881".parse().unwrap();

        let interested = HashSet::from([peer1, peer2]);
        let unchoked = HashSet::new();
        let transfer_rate = HashMap::from([
            (peer1, TransferRate(Size::from_kibibytes(10), SEC)),
            (peer2, TransferRate(Size::from_kibibytes(10), SEC)),
        ]);
        let decision = choke(&interested, &unchoked, &transfer_rate, TOP_PEERS, false);

        assert_eq!(decision.peers_to_unchoke, HashSet::from([peer1, peer2]));
        assert!(decision.peers_to_choke.is_empty());
    }

    #[test]
    fn select_top_peers_to_unchoke_by_transfer_rate() {
        let peer1 = "127.0.0.1:6881".parse().unwrap();
        let peer2 = "127.0.0.2:6881".parse().unwrap(); // Too slow
        let peer3 = "127.0.0.3:6881".parse().unwrap();
        let peer4 = "127.0.0.4:6881".parse().unwrap();
        let peer5 = "127.0.0.5:6881".parse().unwrap(); // Not interested

        let interested = HashSet::from([peer1, peer2, peer3, peer4]);
        let unchoked = HashSet::new();
        let transfer_rate = HashMap::from([
            (peer1, TransferRate(Size::from_kibibytes(20), SEC)),
            (peer2, TransferRate(Size::from_kibibytes(10), SEC)),
            (peer3, TransferRate(Size::from_kibibytes(30), SEC)),
            (peer4, TransferRate(Size::from_kibibytes(40), SEC)),
            (peer5, TransferRate(Size::from_kibibytes(50), SEC)),
        ]);
        let decision = choke(&interested, &unchoked, &transfer_rate, TOP_PEERS, false);

        assert_eq!(
            decision.peers_to_unchoke,
            HashSet::from([peer1, peer3, peer4])
        );
        assert!(decision.peers_to_choke.is_empty());
    }

    #[test]
    fn rechoke_previously_unchoked_peers_if_not_selected() {
        let peer1 = "127.0.0.1:6881".parse().unwrap();
        let peer2 = "127.0.0.2:6881".parse().unwrap(); // Too slow
        let peer3 = "127.0.0.3:6881".parse().unwrap();
        let peer4 = "127.0.0.4:6881".parse().unwrap();
        let peer5 = "127.0.0.5:6881".parse().unwrap(); // Not interested

        let interested = HashSet::from([peer1, peer2, peer3, peer4]);
        let unchoked = HashSet::from([peer1, peer2, peer5]);
        let transfer_rate = HashMap::from([
            (peer1, TransferRate(Size::from_kibibytes(20), SEC)),
            (peer2, TransferRate(Size::from_kibibytes(10), SEC)),
            (peer3, TransferRate(Size::from_kibibytes(30), SEC)),
            (peer4, TransferRate(Size::from_kibibytes(40), SEC)),
            (peer5, TransferRate(Size::from_kibibytes(50), SEC)),
        ]);
        let decision = choke(&interested, &unchoked, &transfer_rate, TOP_PEERS, false);

        assert_eq!(decision.peers_to_choke, HashSet::from([peer2, peer5]));
    }

    #[test]
    fn optimistically_unchoke_randomly_selected_peer() {
        let peer1 = "127.0.0.1:6881".parse().unwrap();
        let peer2 = "127.0.0.2:6881".parse().unwrap(); // Too slow
        let peer3 = "127.0.0.3:6881".parse().unwrap();
        let peer4 = "127.0.0.4:6881".parse().unwrap();

        let interested = HashSet::from([peer1, peer2, peer3, peer4]);
        let unchoked = HashSet::new();
        let transfer_rate = HashMap::from([
            (peer1, TransferRate(Size::from_kibibytes(20), SEC)),
            (peer2, TransferRate(Size::from_kibibytes(10), SEC)),
            (peer3, TransferRate(Size::from_kibibytes(30), SEC)),
            (peer4, TransferRate(Size::from_kibibytes(40), SEC)),
        ]);
        let decision = choke(&interested, &unchoked, &transfer_rate, TOP_PEERS, true);

        // The slowest peer rides along thanks to the optimistic slot
        assert_eq!(
            decision.peers_to_unchoke,
            HashSet::from([peer1, peer2, peer3, peer4])
        );
    }

    #[test]
    fn optimistic_unchoke_runs_once_per_cycle() {
        let peer1: SocketAddr = "127.0.0.1:6881".parse().unwrap();
        let peer2: SocketAddr = "127.0.0.2:6881".parse().unwrap();

        // One top slot, cycle of 2
        let mut choker = Choker::new(1, 2);
        choker.peer_interested(peer1);
        choker.peer_interested(peer2);
        choker.update_peer_transfer_rate(peer1, TransferRate(Size::from_kibibytes(10), SEC));

        // First run is optimistic: both peers end up unchoked
        let decision = choker.run();
        assert_eq!(decision.peers_to_unchoke, HashSet::from([peer1, peer2]));

        // Second run is not: only the top peer stays unchoked
        let decision = choker.run();
        assert_eq!(decision.peers_to_unchoke, HashSet::from([peer1]));
        assert_eq!(decision.peers_to_choke, HashSet::from([peer2]));
        assert!(choker.is_unchoked(&peer1));
        assert!(!choker.is_unchoked(&peer2));
    }
}

mod active_pieces;
mod available_pieces;
mod blocks;
mod piece_state;

use std::{
    collections::{HashMap, HashSet},
    net::SocketAddr,
    sync::Arc,
};

use bit_set::BitSet;

use crate::client::Download;
use crate::message::Block;
use active_pieces::*;
use available_pieces::*;
use piece_state::PieceState;

pub use blocks::Blocks;

/// Decides which blocks to request from which peer.
///
/// The scheduler only keeps track of pieces the client still doesn't have.
/// Each missing piece is in one of three states:
/// - *orphan*: no connected peer has announced it,
/// - *available*: announced by at least one peer, not yet being downloaded,
/// - *active*: selected for download, its blocks assigned on demand.
///
/// Available pieces are picked rarest-first; active pieces are drained before
/// new pieces are started so partially downloaded pieces complete quickly.
pub struct Scheduler {
    download: Arc<Download>,

    /// Maintains state for connected peers
    peers: HashMap<SocketAddr, Peer>,

    /// Pieces that no peer has announced to have yet (with Have / Bitfield messages)
    orphan_pieces: BitSet,

    /// Pieces that are known to be available from at least one peer
    available_pieces: AvailablePieces,

    /// Pieces that are currently selected for download
    active_pieces: ActivePieces,
}

impl Scheduler {
    pub fn new(download: Arc<Download>, has_pieces: &BitSet) -> Self {
        let total_pieces = download.torrent.info.total_pieces();
        let missing_pieces = (0..total_pieces).filter(|piece| !has_pieces.contains(*piece));
        let orphan_pieces = BitSet::from_iter(missing_pieces);
        Self {
            download,
            peers: HashMap::new(),
            orphan_pieces,
            available_pieces: AvailablePieces::new(),
            active_pieces: ActivePieces::new(),
        }
    }

    pub fn peer_choked(&mut self, addr: SocketAddr) {
        let peer = self.peers.entry(addr).or_default();
        peer.choking = true;
        for block in peer.assigned_blocks.drain() {
            let piece = self.active_pieces.get_mut(&block.piece);
            piece.unassign(block);
        }
    }

    pub fn peer_unchoked(&mut self, addr: SocketAddr) -> Vec<Block> {
        let peer = self.peers.entry(addr).or_default();
        if !peer.choking {
            // Client was already unchoked, do nothing
            return Vec::new();
        }
        peer.choking = false;
        self.try_assign(&addr)
    }

    /// Whether `block` was assigned to `addr` and is awaiting its data.
    pub fn block_in_flight(&self, addr: &SocketAddr, block: &Block) -> bool {
        self.peers
            .get(addr)
            .is_some_and(|peer| peer.assigned_blocks.contains(block))
    }

    pub fn block_downloaded(&mut self, addr: &SocketAddr, block: &Block) -> Vec<Block> {
        let peer = self.peers.get_mut(addr).expect("invalid peer");
        assert!(
            peer.assigned_blocks.remove(block),
            "peer should have the block assigned"
        );

        // The piece stays active until it is verified; a fully downloaded
        // piece simply has no blocks left to assign.
        let piece = self.active_pieces.get_mut(&block.piece);
        piece.block_downloaded();

        self.try_assign(addr)
    }

    /// Returns an abandoned block to the assignable pool and tops up the
    /// peer's pipeline.
    pub fn release(&mut self, addr: &SocketAddr, block: Block) -> Vec<Block> {
        self.active_pieces.get_mut(&block.piece).unassign(block);

        if let Some(peer) = self.peers.get_mut(addr) {
            assert!(
                peer.assigned_blocks.remove(&block),
                "peer should have the block assigned"
            );
            return self.try_assign(addr);
        }

        Vec::new()
    }

    /// Makes a piece that failed verification downloadable again and hands
    /// its blocks to idle unchoked peers.
    pub fn invalidate(&mut self, piece: usize) -> Vec<(SocketAddr, Block)> {
        if !self.active_pieces.contains(&piece) {
            return Vec::new();
        }
        let state = self.active_pieces.get_mut(&piece);
        state.reset(&self.download);
        let addrs: Vec<SocketAddr> = state.iter_peers().copied().collect();

        let mut requests = Vec::new();
        for addr in addrs {
            for block in self.try_assign(&addr) {
                requests.push((addr, block));
            }
        }
        requests
    }

    pub fn peer_has_piece(&mut self, addr: SocketAddr, piece: usize) -> PeerPieceResponse {
        if self.orphan_pieces.remove(piece) {
            self.available_pieces
                .insert(AvailablePiece::new(piece, addr));
        } else if self.available_pieces.contains(piece) {
            self.available_pieces.peer_has_piece(piece, addr);
        } else if self.active_pieces.contains(&piece) {
            self.active_pieces.get_mut(&piece).peer_has_piece(addr);
        } else {
            // Ignore if client already has piece
            return PeerPieceResponse::NoAction;
        }

        let peer = self.peers.entry(addr).or_default();
        peer.has_pieces.insert(piece);

        // Express interest the first time the peer has a piece we want
        let express_interest = !peer.am_interested;
        peer.am_interested = true;
        if peer.choking {
            return if express_interest {
                PeerPieceResponse::ExpressInterest
            } else {
                PeerPieceResponse::NoAction
            };
        }

        let blocks = self.try_assign(&addr);
        match (express_interest, blocks.is_empty()) {
            (true, _) => PeerPieceResponse::ExpressInterestAndRequest(blocks),
            (false, false) => PeerPieceResponse::RequestBlocks(blocks),
            (false, true) => PeerPieceResponse::NoAction,
        }
    }

    /// Retires a verified piece. Returns the peers that are no longer
    /// interesting (don't have any piece we still want).
    pub fn client_has_piece(&mut self, piece: usize) -> HashSet<SocketAddr> {
        let state = self.active_pieces.remove(&piece);
        let mut not_interesting = HashSet::new();
        for addr in state.into_peers() {
            let peer = self.peers.get_mut(&addr).expect("invalid peer");
            peer.has_pieces.remove(piece);
            if peer.has_pieces.is_empty() && peer.am_interested {
                peer.am_interested = false;
                not_interesting.insert(addr);
            }
        }
        not_interesting
    }

    pub fn peer_disconnected(&mut self, addr: &SocketAddr) {
        let Some(mut peer) = self.peers.remove(addr) else {
            return;
        };

        // Unassign all blocks assigned to peer
        for block in peer.assigned_blocks.drain() {
            let piece = self.active_pieces.get_mut(&block.piece);
            piece.unassign(block);
        }

        // Remove peer association from its pieces
        for piece in &peer.has_pieces {
            if self.available_pieces.contains(piece) {
                if self.available_pieces.peer_disconnected(piece, addr) == PieceState::Orphan {
                    self.orphan_pieces.insert(piece);
                }
            } else if self.active_pieces.contains(&piece) {
                // An active piece keeps its partial progress even with no
                // remaining holders; a future Have resumes it.
                self.active_pieces.get_mut(&piece).peer_disconnected(addr);
            } else {
                panic!("peer piece must be either active or available");
            }
        }
    }

    fn try_assign(&mut self, addr: &SocketAddr) -> Vec<Block> {
        let peer = self.peers.get_mut(addr).expect("invalid peer");
        if peer.choking {
            return Vec::new();
        }

        let max_blocks = self.download.config.max_concurrent_requests_per_peer;
        let mut blocks_to_request = max_blocks.saturating_sub(peer.assigned_blocks.len());
        let mut blocks = Vec::with_capacity(blocks_to_request);

        // Check if there's an active piece to assign from
        for piece in self.active_pieces.peer_pieces(addr) {
            let assigned = piece.try_assign_n(blocks_to_request, &mut blocks);
            blocks_to_request -= assigned;
            if blocks_to_request == 0 {
                break;
            }
        }

        // Assign remaining blocks from available pieces the peer has
        while blocks_to_request > 0 {
            if let Some(available_piece) = self.available_pieces.take_next(addr) {
                let mut active_piece = ActivePiece::new(available_piece, &self.download);
                let assigned = active_piece.try_assign_n(blocks_to_request, &mut blocks);
                self.active_pieces.insert(active_piece.index, active_piece);
                blocks_to_request -= assigned;
            } else {
                break;
            }
        }

        let peer = self.peers.get_mut(addr).expect("invalid peer");
        peer.assigned_blocks.extend(&blocks);

        blocks
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum PeerPieceResponse {
    NoAction,
    ExpressInterest,
    ExpressInterestAndRequest(Vec<Block>),
    RequestBlocks(Vec<Block>),
}

// -------------------------------------------------------------------------------------------------

#[derive(Debug)]
struct Peer {
    /// If the peer is choking the client
    choking: bool,
    /// If we told the peer we're interested
    am_interested: bool,
    /// Blocks assigned to be downloaded from the peer
    assigned_blocks: HashSet<Block>,
    /// Pieces the peer has and client doesn't
    has_pieces: BitSet,
}

impl Default for Peer {
    fn default() -> Self {
        Self {
            choking: true,
            am_interested: false,
            assigned_blocks: HashSet::new(),
            has_pieces: BitSet::new(),
        }
    }
}

// -------------------------------------------------------------------------------------------------

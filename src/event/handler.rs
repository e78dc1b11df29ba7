use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;

use bit_set::BitSet;
use log::warn;
use size::Size;
use tokio::net::TcpStream;
use tokio::time::Instant;

use crate::client::Download;
use crate::command::Command;
use crate::event::Event;
use crate::message::{Block, Message};
use crate::peer::choke::Choker;
use crate::peer::stats::GlobalStats;
use crate::peer::swarm::Swarm;
use crate::peer::sweeper::Sweeper;
use crate::scheduler::{PeerPieceResponse, Scheduler};

/// The session's brain: a pure state machine mapping events to commands.
///
/// Because every event goes through here sequentially, all shared download
/// state (rarity counters, piece completion, per-peer records) is mutated
/// from a single task and needs no further synchronization. The handler
/// owns:
/// - the `Choker` for choking/unchoking decisions,
/// - the `Scheduler` for piece selection and block assignment,
/// - the `Sweeper` for idle-peer and stuck-request timeouts,
/// - the `Swarm` for connection policy (ceiling, cooldown, bans),
/// - global statistics and the set of pieces this client has.
pub struct EventHandler {
    choker: Choker,
    scheduler: Scheduler,
    sweeper: Sweeper,
    swarm: Swarm,
    stats: GlobalStats,
    has_pieces: BitSet,

    /// Which peers supplied blocks for each in-flight piece; consulted when
    /// a piece fails verification to score corruption.
    piece_contributors: HashMap<usize, HashSet<SocketAddr>>,

    download: Arc<Download>,
}

impl EventHandler {
    pub fn new(download: Arc<Download>, has_pieces: BitSet) -> Self {
        let config = &download.config;
        let stats = GlobalStats::new(download.torrent.info.pieces.len(), has_pieces.len());
        let choker = Choker::new(config.top_peers_to_unchoke, config.optimistic_choking_cycle);
        let scheduler = Scheduler::new(Arc::clone(&download), &has_pieces);
        let sweeper = Sweeper::new(config.idle_peer_timeout, config.block_timeout);
        let swarm = Swarm::new(config);
        Self {
            choker,
            scheduler,
            sweeper,
            swarm,
            stats,
            has_pieces,
            piece_contributors: HashMap::new(),
            download,
        }
    }

    pub fn handle(&mut self, event: Event) -> Vec<Command> {
        let now = Instant::now();
        match event {
            Event::KeepAliveTicked => vec![Command::Broadcast(Message::KeepAlive)],
            Event::StatsTicked => vec![Command::UpdateStats(self.stats.clone())],

            Event::ChokeTicked => {
                let decision = self.choker.run();
                let choke = decision
                    .peers_to_choke
                    .into_iter()
                    .map(|addr| Command::Send(addr, Message::Choke));
                let unchoke = decision
                    .peers_to_unchoke
                    .into_iter()
                    .map(|addr| Command::Send(addr, Message::Unchoke));
                choke.chain(unchoke).collect()
            }

            Event::SweepTicked(instant) => {
                let result = self.sweeper.sweep(instant);
                let mut commands = Vec::with_capacity(result.peers.len());
                for addr in result.peers {
                    warn!("peer {} has been idle for too long", &addr);
                    commands.push(self.disconnect(addr, true));
                }
                for (addr, block) in result.blocks {
                    warn!("block request timed out: {} - {:?}", &addr, &block);
                    for next_block in self.scheduler.release(&addr, block) {
                        commands.push(self.request(addr, next_block, now));
                    }
                }
                commands
            }

            Event::MessageReceived(addr, message) => {
                self.sweeper.update_peer_activity(addr, now);
                let first_message = self.swarm.first_message(addr);
                if matches!(message, Message::Bitfield(_)) && !first_message {
                    // Only valid directly after the handshake
                    warn!("{} sent a bitfield mid-session", addr);
                    return vec![self.disconnect(addr, false)];
                }
                self.handle_message(addr, message, now)
            }

            Event::StatsUpdated(addr, stats) => {
                self.choker.update_peer_transfer_rate(addr, stats.download);
                self.stats.upload_rate += stats.upload;
                self.stats.download_rate += stats.download;
                Vec::new()
            }

            Event::PieceCompleted(piece) => {
                self.stats.completed_pieces += 1;
                self.has_pieces.insert(piece);
                let piece_size = self.download.torrent.info.piece_size(piece);
                self.stats.downloaded += Size::from_bytes(piece_size);
                self.piece_contributors.remove(&piece);

                let mut commands = vec![Command::Broadcast(Message::Have(piece))];
                for not_interesting in self.scheduler.client_has_piece(piece) {
                    commands.push(Command::Send(not_interesting, Message::NotInterested));
                }
                if self.stats.download_complete() {
                    commands.push(Command::UpdateStats(self.stats.clone()));
                }
                commands
            }

            Event::PieceVerificationFailed(piece) => {
                let mut commands = Vec::new();
                for addr in self.piece_contributors.remove(&piece).unwrap_or_default() {
                    if self.swarm.record_corruption(addr) {
                        warn!("{} repeatedly supplied corrupt data, banning", addr);
                        commands.push(self.disconnect(addr, false));
                    }
                }
                for (addr, block) in self.scheduler.invalidate(piece) {
                    commands.push(self.request(addr, block, now));
                }
                commands
            }

            Event::PeersDiscovered(addrs) => {
                let mut commands = Vec::new();
                for addr in addrs {
                    if self.swarm.can_connect(&addr, now) {
                        commands.extend(self.establish_connection(addr, None));
                    }
                }
                commands
            }

            Event::ConnectionRequested(addr) => {
                if !self.swarm.can_connect(&addr, now) {
                    return Vec::new();
                }
                self.establish_connection(addr, None)
            }

            Event::ConnectionAccepted(addr, socket) => {
                if !self.swarm.can_connect(&addr, now) {
                    // Dropping the socket refuses the peer
                    return Vec::new();
                }
                self.establish_connection(addr, Some(socket))
            }

            Event::Disconnected(addr, error) => {
                let failed = error.is_some_and(|err| err.is_connection_failure());
                vec![self.disconnect(addr, failed)]
            }

            Event::StorageFailed(error) => vec![Command::Fail(error)],

            Event::ShutdownRequested => vec![Command::Shutdown],
        }
    }

    fn establish_connection(
        &mut self,
        addr: SocketAddr,
        socket: Option<TcpStream>,
    ) -> Vec<Command> {
        self.swarm.connected(addr);
        self.stats.connected_peers += 1;
        let mut commands = Vec::with_capacity(2);
        commands.push(Command::EstablishConnection(addr, socket));
        if !self.has_pieces.is_empty() {
            let pieces = self.has_pieces.clone();
            commands.push(Command::Send(addr, Message::Bitfield(pieces)));
        }
        commands
    }

    fn request(&mut self, addr: SocketAddr, block: Block, now: Instant) -> Command {
        self.sweeper.block_requested(addr, block, now);
        Command::Send(addr, Message::Request(block))
    }

    /// Tears down all per-peer bookkeeping. `failed` puts the address in
    /// reconnect cooldown.
    fn disconnect(&mut self, addr: SocketAddr, failed: bool) -> Command {
        if self.swarm.is_connected(&addr) {
            self.choker.peer_disconnected(&addr);
            self.scheduler.peer_disconnected(&addr);
            self.sweeper.peer_disconnected(&addr);
            self.swarm.disconnected(&addr, failed, Instant::now());
            self.stats.connected_peers -= 1;
        }
        Command::RemovePeer(addr)
    }

    fn have(&mut self, addr: SocketAddr, piece: usize, now: Instant) -> Vec<Command> {
        match self.scheduler.peer_has_piece(addr, piece) {
            PeerPieceResponse::NoAction => Vec::new(),
            PeerPieceResponse::ExpressInterest => vec![Command::Send(addr, Message::Interested)],
            PeerPieceResponse::ExpressInterestAndRequest(blocks) => {
                let mut commands = Vec::with_capacity(blocks.len() + 1);
                commands.push(Command::Send(addr, Message::Interested));
                for block in blocks {
                    commands.push(self.request(addr, block, now));
                }
                commands
            }
            PeerPieceResponse::RequestBlocks(blocks) => blocks
                .into_iter()
                .map(|block| self.request(addr, block, now))
                .collect(),
        }
    }

    fn handle_message(&mut self, addr: SocketAddr, message: Message, now: Instant) -> Vec<Command> {
        match message {
            Message::KeepAlive => Vec::new(),

            Message::Choke => {
                self.scheduler.peer_choked(addr);
                Vec::new()
            }

            Message::Unchoke => self
                .scheduler
                .peer_unchoked(addr)
                .into_iter()
                .map(|block| self.request(addr, block, now))
                .collect(),

            Message::Interested => {
                self.choker.peer_interested(addr);
                Vec::new()
            }

            Message::NotInterested => {
                self.choker.peer_not_interested(&addr);
                Vec::new()
            }

            Message::Have(piece) => self.have(addr, piece, now),

            Message::Bitfield(pieces) => pieces
                .iter()
                .flat_map(|piece| self.have(addr, piece, now))
                .collect(),

            Message::Request(block) => {
                if !self.choker.is_unchoked(&addr) {
                    warn!("{} requested block while being choked", addr);
                    return Vec::new();
                }
                if !self.has_pieces.contains(block.piece) {
                    warn!("{} requested piece which is not available", addr);
                    return Vec::new();
                }
                self.stats.uploaded += Size::from_bytes(block.length);
                vec![Command::Upload(addr, block)]
            }

            Message::Piece(block_data) => {
                let block = Block::from(&block_data);
                if !self.scheduler.block_in_flight(&addr, &block) {
                    // Wasted bandwidth, not an error
                    warn!("{} sent block {:?} which was not requested", &addr, &block);
                    return Vec::new();
                }
                self.sweeper.block_downloaded(addr, block);
                self.piece_contributors
                    .entry(block.piece)
                    .or_default()
                    .insert(addr);
                let mut commands = vec![Command::IntegrateBlock(block_data)];
                for next_block in self.scheduler.block_downloaded(&addr, &block) {
                    commands.push(self.request(addr, next_block, now));
                }
                commands
            }

            Message::Cancel(_) | Message::Port(_) => {
                // Uploads are served immediately, there is nothing to cancel,
                // and DHT ports are not our business
                Vec::new()
            }
        }
    }
}

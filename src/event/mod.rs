mod handler;

use std::net::SocketAddr;

use tokio::{net::TcpStream, time::Instant};

use crate::message::Message;
use crate::peer::connection::PeerError;
use crate::peer::stats::PeerStats;

pub use handler::*;

/// Everything that can happen to the session. Events from timers, peer
/// connections, the tracker, and storage all funnel into one channel and are
/// handled by the `EventHandler`, one at a time.
#[derive(Debug)]
pub enum Event {
    /// Periodic tick to send keep-alive messages to peers
    KeepAliveTicked,
    /// Periodic tick to run the choking algorithm
    ChokeTicked,
    /// Periodic tick to publish global statistics
    StatsTicked,
    /// Periodic tick to sweep for idle peers and abandoned blocks, with current timestamp
    SweepTicked(Instant),
    /// Received a wire protocol message from a peer
    MessageReceived(SocketAddr, Message),
    /// Received updated transfer statistics for a peer
    StatsUpdated(SocketAddr, PeerStats),
    /// A piece was downloaded, verified and persisted
    PieceCompleted(usize),
    /// A downloaded piece failed hash verification
    PieceVerificationFailed(usize),
    /// The tracker returned candidate peer addresses
    PeersDiscovered(Vec<SocketAddr>),
    /// Initiate a connection to a specific peer
    ConnectionRequested(SocketAddr),
    /// Accept an incoming connection from a peer
    ConnectionAccepted(SocketAddr, TcpStream),
    /// A peer connection was terminated, gracefully or with an error
    Disconnected(SocketAddr, Option<PeerError>),
    /// The storage backend failed; the session cannot continue
    StorageFailed(String),
    /// Shut down the entire session
    ShutdownRequested,
}

mod config;
mod notification;
mod timers;

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use anyhow::Result;
use bit_set::BitSet;
use log::{info, warn};
use tokio::net::TcpListener;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinHandle;

use crate::command::{CommandExecutor, ExecutionResult};
use crate::event::{Event, EventHandler};
use crate::scheduler::Blocks;
use crate::storage::Storage;
use crate::torrent::Torrent;

pub use config::Config;
pub use notification::Notification;

use timers::Timers;

/// Represents an active download of a torrent
///
/// Contains the torrent metadata and configuration settings needed to manage
/// the download process.
#[derive(Debug)]
pub struct Download {
    /// The torrent being downloaded, containing metadata about pieces and files
    pub torrent: Torrent,
    /// Configuration settings for the download like block sizes and timeouts
    pub config: Config,
}

impl Download {
    /// The blocks making up a piece, in transfer order.
    pub fn blocks(&self, piece: usize) -> Blocks {
        let info = &self.torrent.info;
        Blocks::new(
            info.piece_size,
            info.total_size(),
            self.config.block_size.bytes() as usize,
            piece,
        )
    }
}

/// Handle to a running torrent session.
///
/// A session is one event-loop task plus one task per peer connection and
/// one for the tracker. All download state is owned by the event loop;
/// everything else communicates with it over the event channel.
pub struct Client {
    events: Sender<Event>,
    local_addr: SocketAddr,
    join_handle: JoinHandle<()>,
}

impl Client {
    /// Binds the listening socket and spawns the session.
    ///
    /// `has_pieces` carries the pieces already verified on storage (see
    /// `storage::scan_storage`), so interrupted downloads resume instead of
    /// starting over.
    pub async fn spawn(
        mut download: Download,
        storage: Arc<dyn Storage>,
        has_pieces: BitSet,
    ) -> Result<(Self, Receiver<Notification>)> {
        let listener =
            TcpListener::bind((Ipv4Addr::UNSPECIFIED, download.config.port)).await?;
        let local_addr = listener.local_addr()?;
        // Announce the port we actually got (relevant when configured as 0)
        download.config.port = local_addr.port();
        let download = Arc::new(download);

        let (events_tx, events_rx) = mpsc::channel(download.config.events_buffer);
        let (notifications_tx, notifications_rx) = mpsc::channel(32);

        let handler = EventHandler::new(Arc::clone(&download), has_pieces);
        let executor = CommandExecutor::new(
            Arc::clone(&download),
            storage,
            events_tx.clone(),
            notifications_tx,
        );

        info!("listening on {}", local_addr);
        let join_handle = tokio::spawn(run(download, listener, handler, executor, events_rx));
        let client = Self {
            events: events_tx,
            local_addr,
            join_handle,
        };
        Ok((client, notifications_rx))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Asks the session to connect to a specific peer, outside of tracker
    /// discovery.
    pub async fn add_peer(&self, addr: SocketAddr) -> Result<()> {
        self.events.send(Event::ConnectionRequested(addr)).await?;
        Ok(())
    }

    /// Stops the session: cancels all connections, says goodbye to the
    /// tracker, and returns once everything wound down.
    pub async fn shutdown(self) -> Result<()> {
        if self.events.send(Event::ShutdownRequested).await.is_err() {
            warn!("session already stopped");
        }
        self.join_handle.await?;
        Ok(())
    }
}

async fn run(
    download: Arc<Download>,
    listener: TcpListener,
    mut handler: EventHandler,
    mut executor: CommandExecutor,
    mut events_rx: Receiver<Event>,
) {
    let mut timers = Timers::new(&download.config);
    'session: loop {
        let event = tokio::select! {
            event = timers.tick() => event,
            Some(event) = events_rx.recv() => event,
            Ok((socket, addr)) = listener.accept() => Event::ConnectionAccepted(addr, socket),
        };
        for command in handler.handle(event) {
            if executor.execute(command).await == ExecutionResult::Stop {
                break 'session;
            }
        }
    }
    executor.shutdown().await;
}

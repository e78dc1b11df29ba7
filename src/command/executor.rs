use std::sync::Arc;

use log::warn;
use tokio::sync::Mutex;
use tokio::sync::mpsc::Sender;

use crate::client::{Download, Notification};
use crate::command::Command;
use crate::event::Event;
use crate::peer::connection_manager::ConnectionManager;
use crate::storage::{FileReader, FileWriter, Storage};
use crate::tracker::Tracker;

/// Performs the I/O side of the session: peer connections, storage reads
/// and writes, tracker announces, and user-facing notifications.
pub struct CommandExecutor {
    /// Active peer connections
    connection_manager: ConnectionManager,
    /// Reader for serving verified data to peers
    reader: Arc<FileReader>,
    /// Writer integrating downloaded blocks into verified pieces
    writer: Arc<Mutex<FileWriter>>,
    /// Tracker connection for peer discovery and stats reporting
    tracker: Tracker,
    /// Channel for feeding storage outcomes back into the event loop
    events: Sender<Event>,
    /// Channel for notifications about download progress
    notifications: Sender<Notification>,
}

impl CommandExecutor {
    pub fn new(
        download: Arc<Download>,
        storage: Arc<dyn Storage>,
        events: Sender<Event>,
        notifications: Sender<Notification>,
    ) -> Self {
        let reader = Arc::new(FileReader::new(
            Arc::clone(&download),
            Arc::clone(&storage),
        ));
        let writer = Arc::new(Mutex::new(FileWriter::new(
            Arc::clone(&download),
            storage,
            events.clone(),
        )));
        let tracker = Tracker::spawn(Arc::clone(&download), events.clone());
        let connection_manager = ConnectionManager::new(download, events.clone());
        Self {
            connection_manager,
            reader,
            writer,
            tracker,
            events,
            notifications,
        }
    }

    pub async fn execute(&mut self, command: Command) -> ExecutionResult {
        match command {
            Command::EstablishConnection(addr, socket) => {
                self.connection_manager.start(addr, socket)
            }

            Command::Send(addr, message) => self.connection_manager.send(&addr, message).await,

            Command::Broadcast(message) => self.connection_manager.broadcast(message).await,

            Command::RemovePeer(addr) => self.connection_manager.remove(&addr),

            Command::Upload(addr, block) => {
                // The peer may be gone by the time the upload was scheduled
                if let Some(tx) = self.connection_manager.peer_tx(&addr) {
                    let reader = Arc::clone(&self.reader);
                    tokio::spawn(async move {
                        if let Err(err) = reader.read(block, tx).await {
                            warn!("failed to read block {:?}: {}", block, err);
                        }
                    });
                }
            }

            Command::IntegrateBlock(block_data) => {
                let writer = Arc::clone(&self.writer);
                let events = self.events.clone();
                tokio::spawn(async move {
                    if let Err(err) = writer.lock().await.write(block_data).await {
                        // Persistence is broken, the session must stop
                        let _ = events.send(Event::StorageFailed(err.to_string())).await;
                    }
                });
            }

            Command::UpdateStats(stats) => {
                self.tracker.update_progress(stats.downloaded, stats.uploaded);
                self.send_notification(if stats.download_complete() {
                    Notification::DownloadComplete
                } else {
                    Notification::Stats(stats)
                });
            }

            Command::Fail(error) => {
                self.send_notification(Notification::Failed(error));
                return ExecutionResult::Stop;
            }

            Command::Shutdown => {
                self.send_notification(Notification::ShuttingDown);
                return ExecutionResult::Stop;
            }
        }
        ExecutionResult::Continue
    }

    pub async fn shutdown(self) {
        if let Err(err) = self.tracker.shutdown().await {
            warn!("error encountered while shutting down tracker: {:?}", err);
        }
        self.connection_manager.shutdown().await;
    }

    fn send_notification(&self, notification: Notification) {
        if let Err(err) = self.notifications.try_send(notification) {
            warn!("failed sending notification: {:?}", err);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionResult {
    Continue,
    Stop,
}

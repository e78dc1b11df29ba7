mod request;
mod response;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use log::{info, warn};
use size::Size;
use tokio::sync::mpsc::Sender;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::bencoding::Parser;
use crate::client::Download;
use crate::event::Event;

pub use request::{AnnounceEvent, TrackerRequest};
pub use response::TrackerResponse;

/// Delay before retrying a failed announce; doubled per consecutive failure.
const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(15);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy)]
struct Progress {
    downloaded: Size,
    uploaded: Size,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            downloaded: Size::from_bytes(0),
            uploaded: Size::from_bytes(0),
        }
    }
}

/// Background task announcing the client's state to the tracker: `started`
/// at spawn, periodic re-announces at the tracker-specified interval,
/// `completed` once everything is downloaded, `stopped` on shutdown.
/// Discovered peers are fed into the event loop. Announce failures are
/// never fatal; the next attempt is delayed with exponential backoff.
pub struct Tracker {
    progress: watch::Sender<Progress>,
    cancellation_token: CancellationToken,
    join_handle: JoinHandle<()>,
}

impl Tracker {
    pub fn spawn(download: Arc<Download>, events: Sender<Event>) -> Self {
        let (progress, progress_rx) = watch::channel(Progress::default());
        let cancellation_token = CancellationToken::new();
        let token_clone = cancellation_token.clone();
        let join_handle = tokio::spawn(run(download, events, progress_rx, token_clone));
        Self {
            progress,
            cancellation_token,
            join_handle,
        }
    }

    pub fn update_progress(&self, downloaded: Size, uploaded: Size) {
        self.progress.send_replace(Progress {
            downloaded,
            uploaded,
        });
    }

    pub async fn shutdown(self) -> Result<()> {
        self.cancellation_token.cancel();
        self.join_handle.await?;
        Ok(())
    }
}

async fn run(
    download: Arc<Download>,
    events: Sender<Event>,
    progress: watch::Receiver<Progress>,
    cancellation_token: CancellationToken,
) {
    let mut started_sent = false;
    let mut completed_sent = false;
    let mut retry_delay = INITIAL_RETRY_DELAY;

    loop {
        let snapshot = *progress.borrow();
        let left = left_bytes(&download, &snapshot);
        let event = if !started_sent {
            Some(AnnounceEvent::Started)
        } else if !completed_sent && left == 0 {
            Some(AnnounceEvent::Completed)
        } else {
            None
        };

        let delay = match announce(&download, snapshot, event).await {
            Ok(response) => {
                match event {
                    Some(AnnounceEvent::Started) => started_sent = true,
                    Some(AnnounceEvent::Completed) => completed_sent = true,
                    _ => (),
                }
                retry_delay = INITIAL_RETRY_DELAY;
                info!(
                    "tracker returned {} peers, next announce in {:?}",
                    response.peers.len(),
                    response.interval
                );
                let peers = response.peer_addrs();
                if !peers.is_empty() && events.send(Event::PeersDiscovered(peers)).await.is_err() {
                    // Session is gone
                    return;
                }
                response.interval
            }
            Err(err) => {
                warn!("announce failed: {}, retrying in {:?}", err, retry_delay);
                let delay = retry_delay;
                retry_delay = (retry_delay * 2).min(MAX_RETRY_DELAY);
                delay
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(delay) => (),
            _ = cancellation_token.cancelled() => break,
        }
    }

    // Courtesy goodbye; ignore failures, we're leaving anyway
    let snapshot = *progress.borrow();
    if started_sent {
        if let Err(err) = announce(&download, snapshot, Some(AnnounceEvent::Stopped)).await {
            warn!("failed to send stopped event: {}", err);
        }
    }
}

fn left_bytes(download: &Download, progress: &Progress) -> i64 {
    let total = download.torrent.info.total_size() as i64;
    (total - progress.downloaded.bytes()).max(0)
}

async fn announce(
    download: &Download,
    progress: Progress,
    event: Option<AnnounceEvent>,
) -> Result<TrackerResponse> {
    let request = TrackerRequest {
        announce: download.torrent.announce.clone(),
        info_hash: download.torrent.info.info_hash.clone(),
        peer_id: download.config.client_id.clone(),
        port: download.config.port,
        uploaded: progress.uploaded,
        downloaded: progress.downloaded,
        left: Size::from_bytes(left_bytes(download, &progress)),
        event,
    };
    let mut response = reqwest::get(Url::from(request)).await?;
    if !response.status().is_success() {
        return Err(anyhow!("tracker returned status {}", response.status()));
    }
    let value = {
        let mut parser = Parser::new();
        while let Some(chunk) = response.chunk().await? {
            parser.write_all(&chunk)?;
        }
        parser.result()?
    };
    TrackerResponse::try_from(value)
}

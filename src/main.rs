use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use log::{error, info};

use crate::client::{Client, Config, Download, Notification};
use crate::storage::{FsStorage, scan_storage};
use crate::torrent::Torrent;

mod bencoding;
mod client;
mod codec;
mod command;
mod core;
mod crypto;
mod event;
mod message;
mod peer;
mod scheduler;
mod storage;
mod torrent;
mod tracker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let path = args
        .next()
        .context("usage: riptide <torrent-file> [download-dir]")?;
    let download_dir = args.next().map(PathBuf::from).unwrap_or_default();

    let torrent = Torrent::load(&path).await?;
    info!(
        "loaded torrent with {} pieces, {} bytes total",
        torrent.info.total_pieces(),
        torrent.info.total_size()
    );

    let config = Config::new(download_dir);
    let storage = Arc::new(FsStorage::new(config.download_path.clone(), &torrent.info));
    let has_pieces = scan_storage(&torrent.info, storage.as_ref()).await;

    let download = Download { torrent, config };
    let (client, mut notifications) = Client::spawn(download, storage, has_pieces).await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, shutting down...");
                break;
            }
            notification = notifications.recv() => match notification {
                Some(Notification::Stats(stats)) => {
                    info!(
                        "{:.1}% complete ({}/{} pieces), {} peers connected",
                        stats.completed(),
                        stats.completed_pieces,
                        stats.total_pieces,
                        stats.connected_peers,
                    );
                }
                Some(Notification::DownloadComplete) => {
                    info!("download complete, seeding until interrupted");
                }
                Some(Notification::Failed(err)) => {
                    error!("download failed: {}", err);
                    break;
                }
                Some(Notification::ShuttingDown) | None => break,
            }
        }
    }

    client.shutdown().await?;
    Ok(())
}

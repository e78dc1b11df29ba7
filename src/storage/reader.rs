use std::sync::Arc;

use tokio::sync::mpsc::Sender;

use crate::client::Download;
use crate::message::{Block, BlockData, Message};
use crate::storage::Storage;

/// Serves block uploads by reading verified data back from storage.
pub struct FileReader {
    download: Arc<Download>,
    storage: Arc<dyn Storage>,
}

impl FileReader {
    pub fn new(download: Arc<Download>, storage: Arc<dyn Storage>) -> Self {
        Self { download, storage }
    }

    pub async fn read(&self, block: Block, tx: Sender<Message>) -> anyhow::Result<()> {
        let offset = block.global_offset(self.download.torrent.info.piece_size);
        let data = self.storage.read_at(offset as u64, block.length).await?;
        let message = Message::Piece(BlockData {
            piece: block.piece,
            offset: block.offset,
            data,
        });
        tx.send(message).await?;
        Ok(())
    }
}

use std::sync::Arc;

use log::warn;
use tokio::sync::mpsc::Sender;

use crate::client::Download;
use crate::event::Event;
use crate::message::BlockData;
use crate::storage::{Joiner, Status, Storage};

/// Integrates downloaded blocks: buffers them per piece, verifies completed
/// pieces, and persists verified data. The piece-completed event is only
/// emitted after the bytes were handed to storage.
pub struct FileWriter {
    joiner: Joiner,
    storage: Arc<dyn Storage>,
    tx: Sender<Event>,
}

impl FileWriter {
    pub fn new(download: Arc<Download>, storage: Arc<dyn Storage>, tx: Sender<Event>) -> Self {
        let joiner = Joiner::new(&download);
        Self {
            joiner,
            storage,
            tx,
        }
    }

    pub async fn write(&mut self, block_data: BlockData) -> anyhow::Result<()> {
        let piece = block_data.piece;
        match self.joiner.add(block_data) {
            Status::Incomplete => (), // Nothing to do, wait for next block
            Status::Invalid => {
                warn!("piece {} sha1 mismatch", piece);
                self.tx.send(Event::PieceVerificationFailed(piece)).await?;
            }
            Status::Complete { offset, data } => {
                self.storage.write_at(offset, &data).await?;
                self.tx.send(Event::PieceCompleted(piece)).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use size::Size;

    use crate::client::tests::{test_config, test_torrent_with_data};
    use crate::storage::MemoryStorage;

    use super::*;

    fn test_writer() -> (
        FileWriter,
        Arc<MemoryStorage>,
        tokio::sync::mpsc::Receiver<Event>,
        Vec<Vec<u8>>,
    ) {
        let (torrent, pieces) = test_torrent_with_data();
        let total_size = torrent.info.total_size();
        let config = test_config("/tmp").with_block_size(Size::from_bytes(8));
        let download = Arc::new(Download { torrent, config });
        let storage = Arc::new(MemoryStorage::new(total_size));
        let (tx, rx) = tokio::sync::mpsc::channel(8);
        let writer = FileWriter::new(download, Arc::clone(&storage) as Arc<dyn Storage>, tx);
        (writer, storage, rx, pieces)
    }

    #[tokio::test]
    async fn verified_piece_is_persisted_once() {
        let (mut writer, storage, mut rx, pieces) = test_writer();

        for (i, block) in pieces[0].chunks(8).enumerate() {
            writer
                .write(BlockData {
                    piece: 0,
                    offset: i * 8,
                    data: block.to_vec(),
                })
                .await
                .unwrap();
        }

        // Exactly one write, covering the piece's byte range, and the
        // completion event observed only after it
        assert_eq!(storage.writes(), vec![(0, 32)]);
        assert_eq!(&storage.snapshot()[0..32], &pieces[0][..]);
        assert!(matches!(rx.recv().await, Some(Event::PieceCompleted(0))));
    }

    #[tokio::test]
    async fn corrupt_piece_is_discarded() {
        let (mut writer, storage, mut rx, pieces) = test_writer();

        let blocks = pieces[0].chunks(8).count();
        for i in 0..blocks {
            writer
                .write(BlockData {
                    piece: 0,
                    offset: i * 8,
                    data: vec![0xFF; 8],
                })
                .await
                .unwrap();
        }

        assert!(storage.writes().is_empty());
        assert!(matches!(
            rx.recv().await,
            Some(Event::PieceVerificationFailed(0))
        ));
    }
}

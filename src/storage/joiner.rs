use crate::client::Download;
use crate::crypto::Sha1;
use crate::message::BlockData;

/// Buffers blocks until their piece is complete, then verifies the piece
/// against its recorded digest.
pub struct Joiner {
    block_size: usize,
    pieces: Vec<PieceState>,
}

impl Joiner {
    pub fn new(download: &Download) -> Self {
        let info = &download.torrent.info;
        let mut pieces = Vec::with_capacity(info.total_pieces());
        for (piece, sha1) in info.pieces.iter().enumerate() {
            let offset = info.piece_offset(piece) as u64;
            pieces.push(PieceState::new(piece, offset, sha1.clone(), download));
        }
        Self {
            block_size: download.config.block_size.bytes() as usize,
            pieces,
        }
    }

    pub fn add(&mut self, block_data: BlockData) -> Status {
        assert_eq!(block_data.offset % self.block_size, 0, "invalid offset");
        let piece = self
            .pieces
            .get_mut(block_data.piece)
            .expect("invalid piece");
        let block = block_data.offset / self.block_size;
        piece.add(block, block_data.data)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Status {
    Incomplete,
    Invalid,
    Complete { offset: u64, data: Vec<u8> },
}

struct PieceState {
    size: usize,
    offset: u64,
    sha1: Sha1,
    verified: bool,
    data: Vec<Option<Vec<u8>>>,
}

impl PieceState {
    fn new(piece: usize, offset: u64, sha1: Sha1, download: &Download) -> Self {
        let blocks = download.blocks(piece).len();
        Self {
            size: download.torrent.info.piece_size(piece),
            offset,
            sha1,
            verified: false,
            data: vec![None; blocks],
        }
    }

    fn add(&mut self, block: usize, data: Vec<u8>) -> Status {
        if self.verified {
            // Blocks for a verified piece carry nothing new
            return Status::Incomplete;
        }
        let block_data = self.data.get_mut(block).expect("invalid block index");
        *block_data = Some(data);

        if self.data.iter().any(|block_data| block_data.is_none()) {
            return Status::Incomplete;
        }

        // All blocks arrived: assemble and verify. Taking the buffers out
        // means a failed verification leaves the piece empty.
        let mut piece_data = Vec::with_capacity(self.size);
        for block_data in self.data.iter_mut() {
            let block_data = block_data.take().expect("complete piece");
            piece_data.extend(block_data);
        }

        if self.sha1 == Sha1::digest(&piece_data) {
            self.verified = true;
            Status::Complete {
                offset: self.offset,
                data: piece_data,
            }
        } else {
            Status::Invalid
        }
    }
}

#[cfg(test)]
mod tests {
    use size::Size;

    use crate::client::tests::{test_config, test_torrent_with_data};

    use super::*;

    fn test_download() -> (Download, Vec<Vec<u8>>) {
        let (torrent, pieces) = test_torrent_with_data();
        let config = test_config("/tmp").with_block_size(Size::from_bytes(8));
        (Download { torrent, config }, pieces)
    }

    #[test]
    fn piece_incomplete_until_all_blocks_arrive() {
        let (download, pieces) = test_download();
        let mut joiner = Joiner::new(&download);

        assert_eq!(
            joiner.add(BlockData {
                piece: 0,
                offset: 0,
                data: pieces[0][0..8].to_vec(),
            }),
            Status::Incomplete
        );
    }

    #[test]
    fn piece_complete_and_verified() {
        let (download, pieces) = test_download();
        let mut joiner = Joiner::new(&download);

        let blocks: Vec<_> = pieces[0].chunks(8).collect();
        for (i, block) in blocks.iter().enumerate().take(blocks.len() - 1) {
            assert_eq!(
                joiner.add(BlockData {
                    piece: 0,
                    offset: i * 8,
                    data: block.to_vec(),
                }),
                Status::Incomplete
            );
        }

        let last = blocks.len() - 1;
        assert_eq!(
            joiner.add(BlockData {
                piece: 0,
                offset: last * 8,
                data: blocks[last].to_vec(),
            }),
            Status::Complete {
                offset: 0,
                data: pieces[0].clone(),
            }
        );
    }

    #[test]
    fn piece_complete_but_invalid() {
        let (download, pieces) = test_download();
        let mut joiner = Joiner::new(&download);

        let blocks = pieces[0].chunks(8).count();
        for i in 0..blocks - 1 {
            joiner.add(BlockData {
                piece: 0,
                offset: i * 8,
                data: vec![0xFF; 8],
            });
        }

        assert_eq!(
            joiner.add(BlockData {
                piece: 0,
                offset: (blocks - 1) * 8,
                data: vec![0xFF; 8],
            }),
            Status::Invalid
        );
    }

    #[test]
    fn piece_resets_after_invalidation() {
        let (download, pieces) = test_download();
        let mut joiner = Joiner::new(&download);

        // Corrupt data first
        let blocks: Vec<_> = pieces[0].chunks(8).collect();
        for i in 0..blocks.len() {
            joiner.add(BlockData {
                piece: 0,
                offset: i * 8,
                data: vec![0xFF; 8],
            });
        }

        // Correct data second: the buffer was discarded, so every block is
        // needed again, and the piece verifies
        for (i, block) in blocks.iter().enumerate().take(blocks.len() - 1) {
            assert_eq!(
                joiner.add(BlockData {
                    piece: 0,
                    offset: i * 8,
                    data: block.to_vec(),
                }),
                Status::Incomplete
            );
        }
        let last = blocks.len() - 1;
        assert!(matches!(
            joiner.add(BlockData {
                piece: 0,
                offset: last * 8,
                data: blocks[last].to_vec(),
            }),
            Status::Complete { .. }
        ));
    }

    #[test]
    fn blocks_added_out_of_order() {
        let (download, pieces) = test_download();
        let mut joiner = Joiner::new(&download);

        let blocks: Vec<_> = pieces[0].chunks(8).collect();
        let mut order: Vec<usize> = (0..blocks.len()).collect();
        order.reverse();

        let mut last_status = Status::Incomplete;
        for i in order {
            last_status = joiner.add(BlockData {
                piece: 0,
                offset: i * 8,
                data: blocks[i].to_vec(),
            });
        }
        assert!(matches!(last_status, Status::Complete { .. }));
    }

    #[test]
    fn last_piece_offset() {
        let (download, pieces) = test_download();
        let mut joiner = Joiner::new(&download);
        let last_piece = pieces.len() - 1;
        let piece_offset = download.torrent.info.piece_offset(last_piece) as u64;

        let blocks: Vec<_> = pieces[last_piece].chunks(8).collect();
        let mut last_status = Status::Incomplete;
        for (i, block) in blocks.iter().enumerate() {
            last_status = joiner.add(BlockData {
                piece: last_piece,
                offset: i * 8,
                data: block.to_vec(),
            });
        }
        assert_eq!(
            last_status,
            Status::Complete {
                offset: piece_offset,
                data: pieces[last_piece].clone(),
            }
        );
    }

    #[test]
    fn verified_piece_ignores_further_blocks() {
        let (download, pieces) = test_download();
        let mut joiner = Joiner::new(&download);

        let blocks: Vec<_> = pieces[0].chunks(8).collect();
        for (i, block) in blocks.iter().enumerate() {
            joiner.add(BlockData {
                piece: 0,
                offset: i * 8,
                data: block.to_vec(),
            });
        }

        // The piece is already verified, nothing to redo
        for (i, block) in blocks.iter().enumerate() {
            assert_eq!(
                joiner.add(BlockData {
                    piece: 0,
                    offset: i * 8,
                    data: block.to_vec(),
                }),
                Status::Incomplete
            );
        }
    }
}

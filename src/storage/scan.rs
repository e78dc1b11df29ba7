use bit_set::BitSet;
use log::info;

use crate::crypto::Sha1;
use crate::storage::Storage;
use crate::torrent::Info;

/// Re-discovers verified pieces left behind by an earlier session: each
/// piece is read back from storage and checked against its recorded digest.
/// Pieces that cannot be read or don't verify are simply missing.
pub async fn scan_storage(info: &Info, storage: &dyn Storage) -> BitSet {
    let mut has_pieces = BitSet::with_capacity(info.total_pieces());
    for piece in 0..info.total_pieces() {
        let offset = info.piece_offset(piece) as u64;
        match storage.read_at(offset, info.piece_size(piece)).await {
            Ok(data) if Sha1::digest(&data) == info.pieces[piece] => {
                has_pieces.insert(piece);
            }
            _ => (),
        }
    }
    if !has_pieces.is_empty() {
        info!(
            "resuming with {}/{} verified pieces",
            has_pieces.len(),
            info.total_pieces()
        );
    }
    has_pieces
}

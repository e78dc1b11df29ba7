use anyhow::{Result, anyhow};

use crate::bencoding::Value;
use crate::crypto::Sha1;
use crate::torrent::DownloadType;

const SHA1_LEN: usize = 20;

#[derive(Debug, PartialEq, Clone)]
pub struct Info {
    pub info_hash: Sha1,
    pub piece_size: usize,
    pub pieces: Vec<Sha1>,
    pub download_type: DownloadType,
}

impl Info {
    /// Builds the info model from the decoded info dictionary. `info_hash`
    /// is computed by the caller over the dictionary's raw bytes.
    pub fn from_value(mut value: Value, info_hash: Sha1) -> Result<Self> {
        let piece_size: usize = value.remove_entry("piece length")?.try_into()?;
        if piece_size == 0 {
            return Err(anyhow!("piece length must be positive"));
        }
        let pieces: Vec<u8> = value.remove_entry("pieces")?.try_into()?;
        let pieces = Self::build_pieces(&pieces)?;
        let download_type: DownloadType = value.try_into()?;

        let info = Info {
            info_hash,
            piece_size,
            pieces,
            download_type,
        };
        let expected_pieces = info.total_size().div_ceil(info.piece_size);
        if info.pieces.len() != expected_pieces {
            return Err(anyhow!(
                "expected {} piece hashes for {} bytes, got {}",
                expected_pieces,
                info.total_size(),
                info.pieces.len()
            ));
        }
        Ok(info)
    }

    fn build_pieces(pieces: &[u8]) -> Result<Vec<Sha1>> {
        if pieces.len() % SHA1_LEN != 0 {
            return Err(anyhow!(
                "invalid length {}. must be a multiple of {}",
                pieces.len(),
                SHA1_LEN
            ));
        }
        let mut all = Vec::with_capacity(pieces.len() / SHA1_LEN);
        for i in (0..pieces.len()).step_by(SHA1_LEN) {
            let mut bytes = [0; SHA1_LEN];
            bytes.copy_from_slice(&pieces[i..(i + SHA1_LEN)]);
            all.push(Sha1(bytes));
        }
        Ok(all)
    }

    pub fn total_pieces(&self) -> usize {
        self.pieces.len()
    }

    /// Size of a given piece. All pieces share the nominal piece size except
    /// possibly the last one.
    pub fn piece_size(&self, piece: usize) -> usize {
        let piece_start = self.piece_offset(piece);
        let piece_end = (piece_start + self.piece_size).min(self.total_size());
        piece_end - piece_start
    }

    /// Offset of a piece in the download's flat byte space.
    pub fn piece_offset(&self, piece: usize) -> usize {
        self.piece_size * piece
    }

    pub fn total_size(&self) -> usize {
        match &self.download_type {
            DownloadType::SingleFile { size, .. } => *size,
            DownloadType::MultiFile { files, .. } => files.iter().map(|file| file.size).sum(),
        }
    }
}

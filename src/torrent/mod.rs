mod download_type;
mod info;

use std::io::Write;
use std::path::Path;

use anyhow::{Result, anyhow};
use url::Url;

use crate::bencoding::Parser;
use crate::crypto::Sha1;

pub use download_type::*;
pub use info::*;

// https://wiki.theory.org/BitTorrentSpecification#Metainfo_File_Structure

#[derive(Debug, PartialEq, Clone)]
pub struct Torrent {
    pub announce: Url,
    pub info: Info,
}

impl Torrent {
    /// Parses the contents of a `.torrent` file.
    ///
    /// The info hash is the SHA-1 of the info dictionary's raw bytes as they
    /// appear in `bytes`. Hashing a re-encoding instead would produce a
    /// different digest whenever the file's key order or canonicalization
    /// differs from ours, and the client would be invisible to the swarm.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut parser = Parser::new();
        parser.write_all(bytes)?;
        let span = parser
            .info_span()
            .ok_or_else(|| anyhow!("metainfo has no info dictionary"))?;
        let info_hash = Sha1::digest(&bytes[span]);

        let mut value = parser.result()?;
        let announce: String = value.remove_entry("announce")?.try_into()?;
        let announce = Url::parse(&announce)?;
        let info = Info::from_value(value.remove_entry("info")?, info_hash)?;
        Ok(Torrent { announce, info })
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        Self::from_bytes(&bytes)
    }
}

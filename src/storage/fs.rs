use std::io::SeekFrom;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::storage::Storage;
use crate::torrent::{DownloadType, Info};

/// Filesystem-backed storage. The download's flat byte space is mapped onto
/// the metainfo's file layout: a single file for single-file torrents, the
/// ordered `{path, length}` list under the torrent's directory otherwise.
/// A piece that straddles a file boundary is split into one write per file.
pub struct FsStorage {
    files: Vec<FileSpan>,
}

struct FileSpan {
    path: PathBuf,
    /// Offset of this file's first byte in the flat space
    start: u64,
    size: u64,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>, info: &Info) -> Self {
        let root = root.into();
        let mut files = Vec::new();
        let mut start = 0;
        match &info.download_type {
            DownloadType::SingleFile { name, size, .. } => {
                files.push(FileSpan {
                    path: root.join(name),
                    start,
                    size: *size as u64,
                });
            }
            DownloadType::MultiFile {
                directory_name,
                files: torrent_files,
            } => {
                let directory = root.join(directory_name);
                for file in torrent_files {
                    files.push(FileSpan {
                        path: directory.join(&file.path),
                        start,
                        size: file.size as u64,
                    });
                    start += file.size as u64;
                }
            }
        }
        Self { files }
    }

    /// File spans overlapping `[offset, offset + length)`, with the
    /// file-relative offset and length of each overlap.
    fn spans(&self, offset: u64, length: u64) -> impl Iterator<Item = (&FileSpan, u64, u64)> {
        let end = offset + length;
        self.files
            .iter()
            .filter(move |file| file.start < end && offset < file.start + file.size)
            .map(move |file| {
                let span_start = offset.max(file.start);
                let span_end = end.min(file.start + file.size);
                (file, span_start - file.start, span_end - span_start)
            })
    }
}

#[async_trait]
impl Storage for FsStorage {
    async fn write_at(&self, offset: u64, data: &[u8]) -> std::io::Result<()> {
        let mut written = 0;
        for (span, file_offset, length) in self.spans(offset, data.len() as u64) {
            if let Some(parent) = span.path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(false)
                .open(&span.path)
                .await?;
            file.seek(SeekFrom::Start(file_offset)).await?;
            file.write_all(&data[written..written + length as usize])
                .await?;
            file.flush().await?;
            written += length as usize;
        }
        Ok(())
    }

    async fn read_at(&self, offset: u64, length: usize) -> std::io::Result<Vec<u8>> {
        let mut data = Vec::with_capacity(length);
        for (span, file_offset, span_length) in self.spans(offset, length as u64) {
            let mut file = File::open(&span.path).await?;
            file.seek(SeekFrom::Start(file_offset)).await?;
            let mut buf = vec![0; span_length as usize];
            file.read_exact(&mut buf).await?;
            data.extend(buf);
        }
        Ok(data)
    }
}

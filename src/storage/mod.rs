mod fs;
mod joiner;
mod memory;
mod reader;
mod scan;
mod writer;

use async_trait::async_trait;

pub use fs::FsStorage;
pub use joiner::{Joiner, Status};
pub use memory::MemoryStorage;
pub use reader::FileReader;
pub use scan::scan_storage;
pub use writer::FileWriter;

/// Persistence backend for downloaded data, addressed as one flat byte
/// space. The core computes global offsets from the torrent's piece
/// geometry; backends decide how the space maps onto actual files.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn write_at(&self, offset: u64, data: &[u8]) -> std::io::Result<()>;

    async fn read_at(&self, offset: u64, length: usize) -> std::io::Result<Vec<u8>>;
}

use std::io::{Error, ErrorKind};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::storage::Storage;

/// In-memory storage over a fixed-size buffer. Used for seeding content
/// that is already in memory and as the backend in tests, where the write
/// log makes persistence observable.
pub struct MemoryStorage {
    data: Mutex<Vec<u8>>,
    writes: Mutex<Vec<(u64, usize)>>,
}

impl MemoryStorage {
    pub fn new(size: usize) -> Self {
        Self::with_content(vec![0; size])
    }

    pub fn with_content(data: Vec<u8>) -> Self {
        Self {
            data: Mutex::new(data),
            writes: Mutex::new(Vec::new()),
        }
    }

    /// Copy of the stored bytes.
    pub fn snapshot(&self) -> Vec<u8> {
        self.data.lock().expect("lock poisoned").clone()
    }

    /// `(offset, length)` of every write performed, in order.
    pub fn writes(&self) -> Vec<(u64, usize)> {
        self.writes.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn write_at(&self, offset: u64, data: &[u8]) -> std::io::Result<()> {
        let mut buffer = self.data.lock().expect("lock poisoned");
        let start = offset as usize;
        let end = start + data.len();
        if end > buffer.len() {
            return Err(Error::new(ErrorKind::InvalidInput, "write out of bounds"));
        }
        buffer[start..end].copy_from_slice(data);
        self.writes
            .lock()
            .expect("lock poisoned")
            .push((offset, data.len()));
        Ok(())
    }

    async fn read_at(&self, offset: u64, length: usize) -> std::io::Result<Vec<u8>> {
        let buffer = self.data.lock().expect("lock poisoned");
        let start = offset as usize;
        let end = start + length;
        if end > buffer.len() {
            return Err(Error::new(ErrorKind::UnexpectedEof, "read out of bounds"));
        }
        Ok(buffer[start..end].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read() {
        let storage = MemoryStorage::new(8);

        storage.write_at(2, &[1, 2, 3]).await.unwrap();

        assert_eq!(storage.read_at(2, 3).await.unwrap(), vec![1, 2, 3]);
        assert_eq!(storage.writes(), vec![(2, 3)]);
    }

    #[tokio::test]
    async fn out_of_bounds() {
        let storage = MemoryStorage::new(4);

        assert!(storage.write_at(2, &[0; 4]).await.is_err());
        assert!(storage.read_at(0, 5).await.is_err());
    }
}

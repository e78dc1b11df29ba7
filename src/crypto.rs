use anyhow::{Result, anyhow};
use sha1::Digest;

/// A 20-byte SHA-1 digest, as used for piece hashes and the info hash.
#[derive(PartialEq, Eq, Clone, Hash)]
pub struct Sha1(pub [u8; 20]);

impl Sha1 {
    /// Hashes `data` in one shot.
    pub fn digest(data: &[u8]) -> Self {
        let mut hasher = sha1::Sha1::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    pub fn from_hex(hex: &str) -> Result<Self> {
        let bytes = hex::decode(hex)?;
        let bytes = bytes
            .try_into()
            .map_err(|_| anyhow!("sha1 must be 20 bytes long"))?;
        Ok(Self(bytes))
    }
}

impl std::fmt::Debug for Sha1 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sha1(")?;
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, ")")
    }
}

#[derive(PartialEq, Eq, Clone)]
pub struct Md5(pub [u8; 16]);

impl Md5 {
    pub fn from_hex(hex: &str) -> Result<Self> {
        let bytes = hex::decode(hex)?;
        let bytes = bytes
            .try_into()
            .map_err(|_| anyhow!("md5 must be 16 bytes long"))?;
        Ok(Self(bytes))
    }
}

impl std::fmt::Debug for Md5 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Md5(")?;
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, ")")
    }
}

use rand::RngCore;

/// Azureus-style client prefix reported to trackers and peers.
const PREFIX: &[u8; 8] = b"-RP0010-";

#[derive(PartialEq, Eq, Clone)]
pub struct PeerId(pub [u8; 20]);

impl PeerId {
    pub fn random() -> Self {
        let mut data = [0; 20];
        data[..PREFIX.len()].copy_from_slice(PREFIX);
        rand::rng().fill_bytes(&mut data[PREFIX.len()..]);
        Self(data)
    }
}

impl std::fmt::Debug for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PeerId(")?;
        for byte in self.0 {
            if byte.is_ascii_graphic() {
                write!(f, "{}", byte as char)?;
            } else {
                write!(f, "\\x{:02x}", byte)?;
            }
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_ids_carry_client_prefix() {
        let peer_id = PeerId::random();

        assert_eq!(&peer_id.0[..8], PREFIX);
    }

    #[test]
    fn random_ids_differ() {
        assert_ne!(PeerId::random(), PeerId::random());
    }
}

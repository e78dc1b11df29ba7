mod peer_id;
mod transfer_rate;

pub use peer_id::*;
pub use transfer_rate::*;

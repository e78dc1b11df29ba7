mod block;
mod codec;
mod handshake;

use std::fmt::Formatter;

use bit_set::BitSet;

pub use block::*;
pub use codec::*;
pub use handshake::*;

/// All of the remaining messages in the protocol take the form of <length prefix><message
/// ID><payload>. The length prefix is a four byte big-endian value. The message ID is a single
/// decimal byte. The payload is message dependent.
#[derive(PartialEq, Eq, Clone)]
pub enum Message {
    /// # keep-alive: <len=0000>
    ///
    /// The **keep-alive** message is a message with zero bytes, specified with the length prefix
    /// set to zero. There is no message ID and no payload. Peers may close a connection if they
    /// receive no messages (**keep-alive** or any other message) for a certain period of time, so
    /// a keep-alive message must be sent to maintain the connection *alive* if no command has been
    /// sent for a given amount of time. This amount of time is generally two minutes.
    KeepAlive,

    /// # choke: <len=0001><id=0>
    ///
    /// The **choke** message is fixed-length and has no payload.
    Choke,

    /// # unchoke: <len=0001><id=1>
    ///
    /// The **unchoke** message is fixed-length and has no payload.
    Unchoke,

    /// # interested: <len=0001><id=2>
    ///
    /// The **interested** message is fixed-length and has no payload.
    Interested,

    /// # not interested: <len=0001><id=3>
    ///
    /// The **not interested** message is fixed-length and has no payload.
    NotInterested,

    /// # have: <len=0005><id=4><piece index>
    ///
    /// The **have** message is fixed length. The payload is the zero-based index of a piece that
    /// has just been successfully downloaded and verified via the hash.
    Have(usize),

    /// # bitfield: <len=0001+X><id=5><bitfield>
    ///
    /// The **bitfield** message may only be sent immediately after the handshaking sequence is
    /// completed, and before any other messages are sent. It is optional, and need not be sent if
    /// a client has no pieces.
    ///
    /// The **bitfield** message is variable length, where X is the length of the bitfield. The
    /// payload is a bitfield representing the pieces that have been successfully downloaded. The
    /// high bit in the first byte corresponds to piece index 0. Bits that are cleared indicated a
    /// missing piece, and set bits indicate a valid and available piece. Spare bits at the end are
    /// set to zero.
    Bitfield(BitSet),

    /// # request: <len=0013><id=6><index><begin><length>
    ///
    /// The **request** message is fixed length, and is used to request a block. The payload
    /// contains the following information:
    ///
    /// * **index**: integer specifying the zero-based piece index
    /// * **begin**: integer specifying the zero-based byte offset within the piece
    /// * **length**: integer specifying the requested length.
    Request(Block),

    /// # piece: <len=0009+X><id=7><index><begin><block>
    ///
    /// The **piece** message is variable length, where X is the length of the block. The payload
    /// contains the following information:
    ///
    /// * **index**: integer specifying the zero-based piece index
    /// * **begin**: integer specifying the zero-based byte offset within the piece
    /// * **block**: block of data, which is a subset of the piece specified by index.
    Piece(BlockData),

    /// # cancel: <len=0013><id=8><index><begin><length>
    ///
    /// The **cancel** message is fixed length, and is used to cancel block requests. The payload
    /// is identical to that of the "request" message.
    Cancel(Block),

    /// # port: <len=0003><id=9><listen-port>
    ///
    /// The **port** message is sent by clients that implement a DHT tracker. This client decodes
    /// it for compatibility and otherwise ignores it.
    Port(u16),
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Message::KeepAlive => write!(f, "KeepAlive"),
            Message::Choke => write!(f, "Choke"),
            Message::Unchoke => write!(f, "Unchoke"),
            Message::Interested => write!(f, "Interested"),
            Message::NotInterested => write!(f, "NotInterested"),
            Message::Have(piece) => write!(f, "Have {{ piece: {} }}", piece),
            Message::Bitfield(bitset) => write!(f, "Bitfield(<{} pieces>)", bitset.len()),
            Message::Request(block) => write!(f, "Request({:?})", block),
            Message::Piece(block) => {
                write!(
                    f,
                    "Piece {{ piece: {}, offset: {}, data: <{} bytes> }}",
                    block.piece,
                    block.offset,
                    block.data.len()
                )
            }
            Message::Cancel(block) => write!(f, "Cancel({:?})", block),
            Message::Port(port) => write!(f, "Port({})", port),
        }
    }
}

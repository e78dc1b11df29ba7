/// Where a missing piece sits in the scheduler after a peer-set change.
#[derive(Debug, PartialEq, Eq)]
pub enum PieceState {
    /// No connected peer has announced the piece.
    Orphan,
    /// At least one connected peer still has the piece.
    Available,
}

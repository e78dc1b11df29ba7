use crate::peer::stats::GlobalStats;

/// Progress surface exposed to whoever started the session.
#[derive(Debug)]
pub enum Notification {
    /// Periodic statistics snapshot
    Stats(GlobalStats),
    /// Every piece is downloaded and verified
    DownloadComplete,
    /// The session stopped on a fatal error
    Failed(String),
    /// The session is stopping gracefully
    ShuttingDown,
}

use std::{
    cmp::Ordering,
    fmt::Display,
    ops::{Add, AddAssign},
    time::Duration,
};

use size::Size;

/// Amount of data moved over a span of time. Rates are comparable by
/// bytes-per-second, and additive so per-message samples can be accumulated.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct TransferRate(pub Size, pub Duration);

impl Display for TransferRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let TransferRate(size, duration) = self;
        let seconds = duration.as_secs_f64();
        let size_per_second = size / seconds;
        write!(f, "{}/s", size_per_second)
    }
}

impl TransferRate {
    pub const EMPTY: Self = Self(Size::from_const(0), Duration::ZERO);

    fn bps(&self) -> f64 {
        let seconds = self.1.as_secs_f64();
        if seconds == 0.0 {
            // No samples yet, don't let NaN rank the peer first
            return 0.0;
        }
        (self.0.bytes() as f64) / seconds
    }
}

impl Add for TransferRate {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        let mut sum = self;
        sum += rhs;
        sum
    }
}

impl AddAssign for TransferRate {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
        self.1 += rhs.1;
    }
}

impl PartialOrd for TransferRate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TransferRate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bps().total_cmp(&other.bps())
    }
}

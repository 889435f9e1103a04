use serde::{Deserialize, Serialize};
use std::{fmt, num, str};

/// Event timestamp, seconds since the unix epoch.
///
/// Timestamps written to a chronology must be monotonically non-decreasing;
/// only the delta between consecutive events reaches the wire.
#[derive(
    Default, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// the largest value a [`Timestamp`] can be
    pub const MAX: Self = Self::new(u64::MAX);

    /// wrap the given value into a Timestamp type
    #[inline(always)]
    pub const fn new(timestamp: u64) -> Self {
        Self(timestamp)
    }

    #[inline(always)]
    pub fn into_inner(self) -> u64 {
        self.0
    }

    /// Seconds elapsed since `earlier`, or `None` if this timestamp is
    /// older than `earlier`.
    #[inline]
    pub fn checked_delta(self, earlier: Timestamp) -> Option<u64> {
        self.0.checked_sub(earlier.0)
    }

    /// The timestamp `delta` seconds after this one, saturating at the
    /// maximum.
    #[must_use = "The function does not modify the state, the new value is returned"]
    #[inline]
    pub fn saturating_add(self, delta: u64) -> Self {
        Self(self.0.saturating_add(delta))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl str::FromStr for Timestamp {
    type Err = num::ParseIntError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl From<u64> for Timestamp {
    fn from(timestamp: u64) -> Self {
        Self(timestamp)
    }
}

impl From<Timestamp> for u64 {
    fn from(Timestamp(timestamp): Timestamp) -> Self {
        timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta() {
        assert_eq!(Timestamp::new(10).checked_delta(Timestamp::new(4)), Some(6));
        assert_eq!(Timestamp::new(4).checked_delta(Timestamp::new(4)), Some(0));
        assert_eq!(Timestamp::new(3).checked_delta(Timestamp::new(4)), None);
    }
}

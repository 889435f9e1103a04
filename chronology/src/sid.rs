use serde::{Deserialize, Serialize};
use std::{fmt, num, str};

/// Sequence id assigned to an object the first time it is interned.
///
/// Ids are assigned densely from zero in interning order, so a `Sid` is
/// also the object's index in the dictionary arena.
#[derive(
    Default, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Sid(u64);

impl Sid {
    /// the largest value a [`Sid`] can be
    pub const MAX: Self = Self::new(u64::MAX);

    /// wrap the given value into a Sid type
    #[inline(always)]
    pub const fn new(sid: u64) -> Self {
        Self(sid)
    }

    #[inline(always)]
    pub fn into_inner(self) -> u64 {
        self.0
    }

    /// The id that would follow this one, or `None` on overflow.
    #[must_use = "The function does not modify the state, the new value is returned"]
    #[inline]
    pub fn checked_next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl str::FromStr for Sid {
    type Err = num::ParseIntError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl From<u64> for Sid {
    fn from(sid: u64) -> Self {
        Self(sid)
    }
}

impl From<Sid> for u64 {
    fn from(Sid(sid): Sid) -> Self {
        sid
    }
}

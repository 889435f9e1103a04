//! Append-only segmented chronology store.
//!
//! A chronology is a time-ordered event log split into segments keyed by
//! monotonically increasing cluster ids. Objects mentioned by events are
//! interned into a reference dictionary on first mention and referred to by
//! their sequence id afterwards, which keeps repeated mentions short on the
//! wire.

#[cfg(test)]
#[macro_use]
extern crate quickcheck_macros;

mod chronology;
pub mod codec;
mod config;
mod dictionary;
mod error;
mod hash;
mod sid;
mod store;
mod time;

pub use crate::chronology::*;
pub use crate::config::*;
pub use crate::dictionary::*;
pub use crate::error::*;
pub use crate::hash::*;
pub use crate::sid::*;
pub use crate::time::*;

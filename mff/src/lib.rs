//! Mempool file format.
//!
//! Records every observable transition of a node's mempool (arrivals,
//! evictions, invalidations) interleaved with block confirmations and
//! reorgs, as a compact event log over a [`chronology`] store, and
//! replays the log deterministically to an [`MffDelegate`].

#[cfg(test)]
#[macro_use]
extern crate quickcheck_macros;

mod block;
mod command;
mod delegate;
mod error;
mod outpoint;
mod reader;
mod tx;
mod writer;

pub use crate::block::*;
pub use crate::command::*;
pub use crate::delegate::*;
pub use crate::error::*;
pub use crate::outpoint::*;
pub use crate::reader::*;
pub use crate::tx::*;
pub use crate::writer::*;

pub use chronology::{H256, Sid, Timestamp};

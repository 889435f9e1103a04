use crate::outpoint::{Outpoint, OutpointState};
use chronology::codec;
use chronology::{Chronicled, CodecError, H256, RefLookup, Sid};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

/// Where a transaction currently lives. In-memory annotation only.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Serialize)]
pub enum TxLocation {
    #[default]
    InMempool,
    Confirmed,
    Discarded,
    Invalid,
}

/// Recorder-side note on why a transaction left the mempool. The wire
/// carries its own reason byte; this annotation is not serialized and
/// is not authoritative.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Serialize)]
pub enum OutReason {
    LowFee,
    AgeExpiry,
    #[default]
    Unknown,
}

/// Recorder-side note on why a transaction became invalid. Not
/// serialized.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Serialize)]
pub enum InvalidReason {
    RbfBumped,
    DoubleSpent,
    Reorg,
    #[default]
    Unknown,
}

/// A mempool transaction as the recorder sees it.
#[derive(Debug, Clone, Serialize)]
pub struct Tx {
    pub hash: H256,
    pub weight: u64,
    pub fee: u64,
    /// Inputs, in input order.
    pub vin: Vec<Outpoint>,
    /// Per-output values, in output order.
    pub vout: Vec<u64>,
    #[serde(skip)]
    pub location: TxLocation,
    #[serde(skip)]
    pub out_reason: Option<OutReason>,
    #[serde(skip)]
    pub invalid_reason: Option<InvalidReason>,
}

impl Tx {
    pub fn new(hash: H256, weight: u64, fee: u64, vin: Vec<Outpoint>, vout: Vec<u64>) -> Self {
        Self {
            hash,
            weight,
            fee,
            vin,
            vout,
            location: TxLocation::InMempool,
            out_reason: None,
            invalid_reason: None,
        }
    }

    /// Virtual size in vbytes, rounded up.
    #[inline]
    pub fn vsize(&self) -> u64 {
        (self.weight + 3) / 4
    }

    /// Fee per virtual byte.
    #[inline]
    pub fn feerate(&self) -> f64 {
        self.fee as f64 / self.vsize() as f64
    }

    /// If this transaction spends the transaction with the given
    /// identity, the output index it spends.
    pub fn spends(&self, txid: &H256, sid: Option<Sid>) -> Option<u64> {
        self.vin
            .iter()
            .find(|prevout| prevout.spends_tx(txid, sid))
            .map(|prevout| prevout.n())
    }

    /// Project a group of transactions onto their hashes.
    pub fn hashset(txs: &[Arc<Tx>]) -> BTreeSet<H256> {
        txs.iter().map(|tx| tx.hash).collect()
    }
}

/// Equality ignores the in-memory annotations.
impl PartialEq for Tx {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
            && self.weight == other.weight
            && self.fee == other.fee
            && self.vin == other.vin
            && self.vout == other.vout
    }
}

impl Eq for Tx {}

impl fmt::Display for Tx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx({}):", self.hash)?;
        for prevout in self.vin.iter() {
            if prevout.state() == OutpointState::Confirmed {
                write!(f, "\n\t<found in block>")?;
            } else {
                write!(f, "\n\t{}", prevout)?;
            }
        }
        Ok(())
    }
}

impl Chronicled for Tx {
    fn hash(&self) -> &H256 {
        &self.hash
    }

    fn encode(&self, refs: &dyn RefLookup, w: &mut dyn Write) -> Result<(), CodecError> {
        codec::put_hash(w, &self.hash)?;
        codec::put_varint(w, self.weight)?;
        codec::put_varint(w, self.fee)?;
        codec::put_varint(w, self.vin.len() as u64)?;
        for prevout in self.vin.iter() {
            prevout.encode(refs, w)?;
        }
        codec::put_varint(w, self.vout.len() as u64)?;
        for value in self.vout.iter() {
            codec::put_varint(w, *value)?;
        }
        Ok(())
    }

    fn decode(r: &mut dyn Read, refs: &dyn RefLookup) -> Result<Self, CodecError> {
        let hash = codec::get_hash(r)?;
        let weight = codec::get_varint(r)?;
        let fee = codec::get_varint(r)?;
        let vin_count = codec::get_varint(r)?;
        // clamp pre-allocation so a corrupt count dies on truncation
        let mut vin = Vec::with_capacity(vin_count.min(1024) as usize);
        for _ in 0..vin_count {
            vin.push(Outpoint::decode(r, refs)?);
        }
        let vout_count = codec::get_varint(r)?;
        let mut vout = Vec::with_capacity(vout_count.min(1024) as usize);
        for _ in 0..vout_count {
            vout.push(codec::get_varint(r)?);
        }
        Ok(Self::new(hash, weight, fee, vin, vout))
    }
}

use crate::block::{Block, Chain};
use crate::command::{
    Reason, CMD_BLOCK_MINED, CMD_BLOCK_UNMINED, CMD_FLAG_OFFENDER_KNOWN,
    CMD_FLAG_OFFENDER_PRESENT, CMD_MEMPOOL_IN, CMD_MEMPOOL_INVALIDATED, CMD_MEMPOOL_OUT,
    CMD_TIME_SET,
};
use crate::delegate::NullDelegate;
use crate::error::{MffError, Result};
use crate::reader::MffReader;
use crate::tx::Tx;
use chronology::{Chronology, ChronologyConfig, H256, Timestamp};
use std::path::Path;
use std::sync::Arc;

pub(crate) const SEGMENT_PREFIX: &str = "mff";

/// Records mempool and chain events, in observation order.
///
/// One logical writer advances a recording at a time; timestamps must be
/// monotonically non-decreasing. Segments track block heights: confirming
/// a block at a new height begins a new segment for it.
pub struct MffWriter {
    chronology: Chronology<Tx>,
    chain: Chain,
}

impl MffWriter {
    /// An in-memory recording.
    pub fn memory() -> Self {
        Self {
            chronology: Chronology::memory(),
            chain: Chain::new(),
        }
    }

    /// Start a recording in the given directory, which must not already
    /// hold one.
    pub fn create<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let config = ChronologyConfig {
            storage_path: Some(dir.as_ref().to_path_buf()),
            prefix: SEGMENT_PREFIX.to_string(),
        };
        Ok(Self {
            chronology: Chronology::create(&config)?,
            chain: Chain::new(),
        })
    }

    /// Continue an existing recording.
    ///
    /// The recording is replayed first, against a delegate that ignores
    /// everything, to rebuild the reference dictionary, the chain, and
    /// the clock; new events then append to the last segment.
    pub fn resume<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let mut reader = MffReader::open(dir, NullDelegate)?;
        while reader.iterate()? {}
        let (chronology, chain, _) = reader.into_parts();
        Ok(Self {
            chronology: chronology.into_append()?,
            chain,
        })
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    /// The register clock: timestamp of the newest recorded event.
    pub fn time(&self) -> Timestamp {
        self.chronology.time()
    }

    pub fn segment_ids(&self) -> Vec<u64> {
        self.chronology.segment_ids()
    }

    /// Record the passage of time without any other observation.
    pub fn mark_time(&mut self, ts: Timestamp) -> Result<()> {
        self.chronology.push_event(ts, CMD_TIME_SET, None, true)?;
        Ok(())
    }

    /// A transaction entered the mempool.
    ///
    /// First mention records the transaction in full; later mentions are
    /// a reference.
    pub fn tx_entered(&mut self, ts: Timestamp, tx: &Arc<Tx>) -> Result<()> {
        self.chronology.push_event(ts, CMD_MEMPOOL_IN, Some(tx), true)?;
        Ok(())
    }

    /// A transaction left the mempool. The offender, when given, is the
    /// transaction that pushed it out (e.g. the replacement).
    pub fn tx_left(
        &mut self,
        ts: Timestamp,
        tx: &Arc<Tx>,
        reason: Reason,
        offender: Option<&Arc<Tx>>,
    ) -> Result<()> {
        let offender_known = self.offender_known(offender);
        let cmd = CMD_MEMPOOL_OUT | offender_flags(offender, offender_known);
        self.chronology.push_event(ts, cmd, Some(tx), true)?;
        self.chronology.write_u8(reason.into_inner())?;
        self.write_offender(offender, offender_known)?;
        Ok(())
    }

    /// A transaction was rendered invalid. `rawtx` is the
    /// consensus-serialized transaction, opaque to the recording.
    pub fn tx_discarded(
        &mut self,
        ts: Timestamp,
        tx: &Arc<Tx>,
        rawtx: &[u8],
        reason: Reason,
        offender: Option<&Arc<Tx>>,
    ) -> Result<()> {
        let offender_known = self.offender_known(offender);
        let cmd = CMD_MEMPOOL_INVALIDATED | offender_flags(offender, offender_known);
        self.chronology.push_event(ts, cmd, Some(tx), true)?;
        self.chronology.write_u8(reason.into_inner())?;
        self.write_offender(offender, offender_known)?;
        self.chronology.write_bytes(rawtx)?;
        Ok(())
    }

    /// A block was confirmed at `height` with the given transactions.
    ///
    /// Any recorded tip at or above `height` is unconfirmed first, so a
    /// competing branch can simply be confirmed over the old one. Note
    /// that this does not invalidate double-spends; the caller records
    /// those separately.
    pub fn confirm_block(
        &mut self,
        ts: Timestamp,
        height: u32,
        hash: H256,
        txs: &[Arc<Tx>],
    ) -> Result<()> {
        if height == 0 {
            return Err(MffError::ZeroHeight);
        }
        if self.chronology.tip() < u64::from(height - 1) {
            self.chronology.begin_segment(u64::from(height - 1))?;
        }
        while self.chain.tip() != 0 && self.chain.tip() >= height {
            self.unconfirm_tip(ts)?;
        }
        self.chronology.push_event(ts, CMD_BLOCK_MINED, None, true)?;
        self.chronology.write_reference_set(txs)?;
        self.chronology.write_hash(&hash)?;
        self.chronology.write_u32(height)?;
        self.chain.did_confirm(Block::from_txs(height, hash, txs));
        if self.chronology.tip() < u64::from(height) {
            self.chronology.begin_segment(u64::from(height))?;
        }
        Ok(())
    }

    /// The current tip was reorged out.
    pub fn unconfirm_tip(&mut self, ts: Timestamp) -> Result<()> {
        let tip = self.chain.tip();
        if tip == 0 {
            return Err(MffError::EmptyChain);
        }
        self.chronology.push_event(ts, CMD_BLOCK_UNMINED, None, true)?;
        self.chronology.write_u32(tip)?;
        self.chain.pop_tip();
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.chronology.flush()?;
        Ok(())
    }

    /// Consume the writer, returning the raw `(id, bytes)` segments.
    pub fn into_segments(self) -> Result<Vec<(u64, Vec<u8>)>> {
        Ok(self.chronology.into_segments()?)
    }

    /// Decided before the event is pushed, so an offender equal to a
    /// fresh principal is flagged and written the same way.
    fn offender_known(&self, offender: Option<&Arc<Tx>>) -> bool {
        offender
            .map(|offender| self.chronology.dictionary().contains(&offender.hash))
            .unwrap_or(false)
    }

    /// Body counterpart of the offender flag bits: a reference when the
    /// flags said known, the full transaction otherwise.
    fn write_offender(&mut self, offender: Option<&Arc<Tx>>, known: bool) -> Result<()> {
        match offender {
            None => {}
            Some(offender) if known => {
                self.chronology.write_reference(offender)?;
            }
            Some(offender) => {
                self.chronology.write_object(offender)?;
            }
        }
        Ok(())
    }
}

fn offender_flags(offender: Option<&Arc<Tx>>, known: bool) -> u8 {
    match offender {
        None => 0,
        Some(_) => CMD_FLAG_OFFENDER_PRESENT | if known { CMD_FLAG_OFFENDER_KNOWN } else { 0 },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outpoint::Outpoint;

    fn tx(seed: u8) -> Arc<Tx> {
        Arc::new(Tx::new(
            H256::repeat_byte(seed),
            400,
            1000,
            vec![Outpoint::by_txid(0, H256::repeat_byte(seed ^ 0xff))],
            vec![900],
        ))
    }

    fn ts(secs: u64) -> Timestamp {
        Timestamp::new(secs)
    }

    #[test]
    fn unconfirm_refused_on_empty_chain() {
        let mut writer = MffWriter::memory();
        assert!(matches!(
            writer.unconfirm_tip(ts(1)),
            Err(MffError::EmptyChain)
        ));
    }

    #[test]
    fn height_zero_refused() {
        let mut writer = MffWriter::memory();
        assert!(matches!(
            writer.confirm_block(ts(1), 0, H256::repeat_byte(1), &[]),
            Err(MffError::ZeroHeight)
        ));
    }

    #[test]
    fn segments_track_block_heights() {
        let mut writer = MffWriter::memory();
        writer.tx_entered(ts(1), &tx(0x11)).unwrap();
        writer
            .confirm_block(ts(2), 1, H256::repeat_byte(0xb1), &[])
            .unwrap();
        assert_eq!(writer.segment_ids(), vec![0, 1]);

        // a jump in height begins the predecessor segment first
        writer
            .confirm_block(ts(3), 4, H256::repeat_byte(0xb4), &[])
            .unwrap();
        assert_eq!(writer.segment_ids(), vec![0, 1, 3, 4]);
        assert_eq!(writer.chain().tip(), 4);
    }

    #[test]
    fn confirm_unwinds_competing_tip() {
        let mut writer = MffWriter::memory();
        writer
            .confirm_block(ts(1), 1, H256::repeat_byte(0xb1), &[])
            .unwrap();
        writer
            .confirm_block(ts(2), 2, H256::repeat_byte(0xb2), &[])
            .unwrap();
        writer
            .confirm_block(ts(3), 2, H256::repeat_byte(0xc2), &[])
            .unwrap();
        assert_eq!(writer.chain().tip(), 2);
        assert_eq!(writer.chain().len(), 2);
        assert_eq!(
            writer.chain().blocks().last().unwrap().hash,
            H256::repeat_byte(0xc2)
        );
    }
}

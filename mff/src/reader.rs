use crate::block::{Block, Chain};
use crate::command::{
    command_name, Reason, CMD_BLOCK_MINED, CMD_BLOCK_UNMINED, CMD_FLAG_OFFENDER_KNOWN,
    CMD_FLAG_OFFENDER_PRESENT, CMD_MEMPOOL_IN, CMD_MEMPOOL_INVALIDATED, CMD_MEMPOOL_OUT,
    CMD_OPCODE_MASK, CMD_TIME_SET,
};
use crate::delegate::MffDelegate;
use crate::error::{MffError, Result};
use crate::tx::Tx;
use crate::writer::SEGMENT_PREFIX;
use chronology::{Chronology, ChronologyConfig, H256, Timestamp};
use std::path::Path;
use tracing::warn;

/// Replays a recording, event by event, into a delegate.
///
/// Replay is strictly sequential and deterministic: the reference
/// dictionary and the chain are rebuilt from the stream alone, so
/// replaying the same bytes twice drives the delegate identically.
pub struct MffReader<D: MffDelegate> {
    chronology: Chronology<Tx>,
    chain: Chain,
    delegate: D,
}

impl<D: MffDelegate> MffReader<D> {
    /// Open a recorded directory for replay.
    pub fn open<P: AsRef<Path>>(dir: P, delegate: D) -> Result<Self> {
        let config = ChronologyConfig {
            storage_path: Some(dir.as_ref().to_path_buf()),
            prefix: SEGMENT_PREFIX.to_string(),
        };
        Ok(Self {
            chronology: Chronology::open(&config)?,
            chain: Chain::new(),
            delegate,
        })
    }

    /// Replay raw `(id, bytes)` segments.
    pub fn from_segments(segments: Vec<(u64, Vec<u8>)>, delegate: D) -> Self {
        Self {
            chronology: Chronology::from_segments(segments),
            chain: Chain::new(),
            delegate,
        }
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    /// The register clock: timestamp of the newest replayed event.
    pub fn time(&self) -> Timestamp {
        self.chronology.time()
    }

    pub fn delegate(&self) -> &D {
        &self.delegate
    }

    pub fn delegate_mut(&mut self) -> &mut D {
        &mut self.delegate
    }

    pub fn into_delegate(self) -> D {
        self.delegate
    }

    pub(crate) fn into_parts(self) -> (Chronology<Tx>, Chain, D) {
        (self.chronology, self.chain, self.delegate)
    }

    /// Consume one event and invoke the matching delegate callback.
    /// Returns `false` at clean end-of-stream. Decode errors are fatal;
    /// the stream position is undefined afterwards.
    pub fn iterate(&mut self) -> Result<bool> {
        let Some((cmd, known)) = self.chronology.pop_event()? else {
            return Ok(false);
        };
        let offender_present = cmd & CMD_FLAG_OFFENDER_PRESENT != 0;
        let offender_known = cmd & CMD_FLAG_OFFENDER_KNOWN != 0;
        if offender_known && !offender_present {
            return Err(MffError::InconsistentFlags(cmd));
        }

        match cmd & CMD_OPCODE_MASK {
            // the time update has already been absorbed by pop_event
            CMD_TIME_SET => {}

            CMD_MEMPOOL_IN => {
                if known {
                    let sid = self.chronology.pop_reference()?;
                    let txid = self.chronology.resolve(sid)?.hash;
                    self.delegate.receive_transaction_with_txid(&txid);
                } else {
                    let tx = self.chronology.pop_object()?;
                    self.delegate.receive_transaction(tx);
                }
            }

            CMD_MEMPOOL_OUT => {
                let txid = self.pop_txid(known)?;
                let reason = Reason::new(self.chronology.read_u8()?);
                if offender_present {
                    // recorded for richer analyses; replay does not use it
                    self.pop_txid(offender_known)?;
                }
                self.delegate.forget_transaction_with_txid(&txid, reason);
            }

            CMD_MEMPOOL_INVALIDATED => {
                let txid = self.pop_txid(known)?;
                let reason = Reason::new(self.chronology.read_u8()?);
                let offender = if offender_present {
                    Some(self.pop_txid(offender_known)?)
                } else {
                    None
                };
                let rawtx = self.chronology.read_bytes()?;
                self.delegate.discard_transaction_with_txid(
                    &txid,
                    &rawtx,
                    reason,
                    offender.as_ref(),
                );
            }

            CMD_BLOCK_MINED => {
                let txids = self.chronology.pop_reference_hashes()?;
                let hash = self.chronology.read_hash()?;
                let height = self.chronology.read_u32()?;
                let block = Block::new(height, hash, txids);
                self.chain.did_confirm(block.clone());
                self.delegate.block_confirmed(&block);
            }

            CMD_BLOCK_UNMINED => {
                let height = self.chronology.read_u32()?;
                if self.chain.is_empty() {
                    // the reorged block can predate the recording
                    warn!(height, "unmining with an empty chain");
                }
                self.chain.pop_tip();
                self.delegate.block_reorged(height);
            }

            opcode => {
                warn!(
                    opcode,
                    name = command_name(opcode),
                    "invalid command in stream"
                );
                return Err(MffError::InvalidCommand(opcode));
            }
        }
        Ok(true)
    }

    /// Replay every remaining event; the number of events consumed.
    pub fn replay(&mut self) -> Result<u64> {
        let mut count = 0;
        while self.iterate()? {
            count += 1;
        }
        Ok(count)
    }

    /// The object-reference read path: a dictionary lookup when the
    /// known flag was set, otherwise a full transaction that is interned
    /// as a side effect.
    fn pop_txid(&mut self, known: bool) -> Result<H256> {
        if known {
            let sid = self.chronology.pop_reference()?;
            Ok(self.chronology.resolve(sid)?.hash)
        } else {
            Ok(self.chronology.pop_object()?.hash)
        }
    }
}

use crate::block::Block;
use crate::command::Reason;
use crate::tx::Tx;
use chronology::H256;
use std::sync::Arc;

/// The consumer replay drives; the equivalent of a full node fed the
/// recorded transactions and blocks in their original order.
///
/// The delegate is told when the mempool no longer needs a transaction,
/// but it may keep it; recommendations are made, not enforced.
pub trait MffDelegate {
    /// Receive a new (or previously forgotten) transaction, in full.
    ///
    /// The transaction is considered in the mempool until it leaves or
    /// is confirmed.
    fn receive_transaction(&mut self, tx: Arc<Tx>);

    /// Receive a transaction by its hash.
    ///
    /// Only called for hashes the delegate has already seen, through
    /// [`MffDelegate::receive_transaction`] or an earlier confirmed
    /// block containing the hash.
    fn receive_transaction_with_txid(&mut self, txid: &H256);

    /// The transaction with the given hash left the mempool. If it is
    /// ever addressed again it will be given in full.
    ///
    /// The hash may be one the delegate never saw, when the recording
    /// began mid-life; tolerate it.
    fn forget_transaction_with_txid(&mut self, txid: &H256, reason: Reason);

    /// The transaction with the given hash was rendered invalid, for
    /// example by a double-spend. Unlike the forget counterpart the raw
    /// transaction is included, along with the offending transaction's
    /// hash when one was recorded.
    fn discard_transaction_with_txid(
        &mut self,
        txid: &H256,
        rawtx: &[u8],
        reason: Reason,
        offender: Option<&H256>,
    );

    /// The given block was confirmed and is the new chain tip.
    fn block_confirmed(&mut self, block: &Block);

    /// The block at the given height was reorged out; the block below
    /// it is the new chain tip.
    fn block_reorged(&mut self, height: u32);

    /// Short description for diagnostics.
    fn describe(&self) -> String {
        "mff delegate".to_string()
    }
}

/// Delegate that ignores every callback. Useful when only the side
/// effects of replay matter, such as rebuilding writer state.
pub struct NullDelegate;

impl MffDelegate for NullDelegate {
    fn receive_transaction(&mut self, _tx: Arc<Tx>) {}

    fn receive_transaction_with_txid(&mut self, _txid: &H256) {}

    fn forget_transaction_with_txid(&mut self, _txid: &H256, _reason: Reason) {}

    fn discard_transaction_with_txid(
        &mut self,
        _txid: &H256,
        _rawtx: &[u8],
        _reason: Reason,
        _offender: Option<&H256>,
    ) {
    }

    fn block_confirmed(&mut self, _block: &Block) {}

    fn block_reorged(&mut self, _height: u32) {}

    fn describe(&self) -> String {
        "null delegate".to_string()
    }
}

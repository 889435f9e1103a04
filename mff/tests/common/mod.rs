use mff::{Block, MffDelegate, Reason, Tx, H256};
use std::sync::Arc;

/// One delegate callback, captured with its arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Callback {
    Received(Arc<Tx>),
    ReceivedKnown(H256),
    Forgotten(H256, Reason),
    Discarded {
        txid: H256,
        rawtx: Vec<u8>,
        reason: Reason,
        offender: Option<H256>,
    },
    Confirmed(Block),
    Reorged(u32),
}

/// Delegate that records every callback in order.
#[derive(Debug, Default)]
pub struct Analyzer {
    pub callbacks: Vec<Callback>,
}

impl MffDelegate for Analyzer {
    fn receive_transaction(&mut self, tx: Arc<Tx>) {
        self.callbacks.push(Callback::Received(tx));
    }

    fn receive_transaction_with_txid(&mut self, txid: &H256) {
        self.callbacks.push(Callback::ReceivedKnown(*txid));
    }

    fn forget_transaction_with_txid(&mut self, txid: &H256, reason: Reason) {
        self.callbacks.push(Callback::Forgotten(*txid, reason));
    }

    fn discard_transaction_with_txid(
        &mut self,
        txid: &H256,
        rawtx: &[u8],
        reason: Reason,
        offender: Option<&H256>,
    ) {
        self.callbacks.push(Callback::Discarded {
            txid: *txid,
            rawtx: rawtx.to_vec(),
            reason,
            offender: offender.copied(),
        });
    }

    fn block_confirmed(&mut self, block: &Block) {
        self.callbacks.push(Callback::Confirmed(block.clone()));
    }

    fn block_reorged(&mut self, height: u32) {
        self.callbacks.push(Callback::Reorged(height));
    }

    fn describe(&self) -> String {
        format!("analyzer ({} callbacks)", self.callbacks.len())
    }
}

use crate::tx::Tx;
use chronology::H256;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

/// A confirmed block: height, hash, and the full set of confirmed
/// transaction ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    pub height: u32,
    pub hash: H256,
    pub txids: BTreeSet<H256>,
}

impl Block {
    pub fn new(height: u32, hash: H256, txids: BTreeSet<H256>) -> Self {
        Self {
            height,
            hash,
            txids,
        }
    }

    pub fn from_txs(height: u32, hash: H256, txs: &[Arc<Tx>]) -> Self {
        Self::new(height, hash, Tx::hashset(txs))
    }
}

/// The confirmed chain as replay sees it: blocks in confirmation order,
/// truncated from the end on reorgs.
#[derive(Debug, Default)]
pub struct Chain {
    blocks: Vec<Block>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Height of the newest block, or 0 when the chain is empty.
    pub fn tip(&self) -> u32 {
        self.blocks.last().map(|block| block.height).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Append a newly confirmed block, making it the tip.
    pub fn did_confirm(&mut self, block: Block) {
        self.blocks.push(block);
    }

    /// Drop the tip. Popping an empty chain is a no-op.
    pub fn pop_tip(&mut self) -> Option<Block> {
        self.blocks.pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(height: u32, seed: u8) -> Block {
        Block::new(height, H256::repeat_byte(seed), BTreeSet::new())
    }

    #[test]
    fn tip_follows_confirms_and_pops() {
        let mut chain = Chain::new();
        assert_eq!(chain.tip(), 0);

        chain.did_confirm(block(1, 0x01));
        chain.did_confirm(block(2, 0x02));
        assert_eq!(chain.tip(), 2);
        assert_eq!(chain.len(), 2);

        let popped = chain.pop_tip().unwrap();
        assert_eq!(popped.height, 2);
        assert_eq!(chain.tip(), 1);

        chain.pop_tip().unwrap();
        assert_eq!(chain.tip(), 0);
        assert!(chain.pop_tip().is_none());
        assert_eq!(chain.tip(), 0);
    }

    #[test]
    fn block_equality_includes_txids() {
        let mut txids = BTreeSet::new();
        txids.insert(H256::repeat_byte(0x11));
        let a = Block::new(1, H256::repeat_byte(0xbb), txids.clone());
        let b = Block::new(1, H256::repeat_byte(0xbb), txids);
        let c = Block::new(1, H256::repeat_byte(0xbb), BTreeSet::new());
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}

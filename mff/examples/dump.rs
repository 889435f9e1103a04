//! Replay a recording and print one JSON line per event.

use clap::Parser;
use mff::{Block, MffDelegate, MffReader, Reason, Tx, H256};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[clap(version)]
struct Cli {
    /// Directory holding the recorded segments.
    #[clap(value_parser)]
    pub dir: PathBuf,
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case", tag = "event")]
enum Line<'a> {
    MempoolIn {
        tx: &'a Tx,
    },
    MempoolInKnown {
        txid: &'a H256,
    },
    MempoolOut {
        txid: &'a H256,
        reason: String,
    },
    MempoolInvalidated {
        txid: &'a H256,
        reason: String,
        offender: Option<&'a H256>,
        rawtx_len: usize,
    },
    BlockMined {
        block: &'a Block,
    },
    BlockUnmined {
        height: u32,
    },
}

#[derive(Default)]
struct Printer {
    events: u64,
}

impl Printer {
    fn emit(&mut self, line: Line<'_>) {
        self.events += 1;
        match serde_json::to_string(&line) {
            Ok(json) => println!("{}", json),
            Err(err) => tracing::error!(%err, "can't encode event"),
        }
    }
}

impl MffDelegate for Printer {
    fn receive_transaction(&mut self, tx: Arc<Tx>) {
        self.emit(Line::MempoolIn { tx: tx.as_ref() });
    }

    fn receive_transaction_with_txid(&mut self, txid: &H256) {
        self.emit(Line::MempoolInKnown { txid });
    }

    fn forget_transaction_with_txid(&mut self, txid: &H256, reason: Reason) {
        self.emit(Line::MempoolOut {
            txid,
            reason: reason.to_string(),
        });
    }

    fn discard_transaction_with_txid(
        &mut self,
        txid: &H256,
        rawtx: &[u8],
        reason: Reason,
        offender: Option<&H256>,
    ) {
        self.emit(Line::MempoolInvalidated {
            txid,
            reason: reason.to_string(),
            offender,
            rawtx_len: rawtx.len(),
        });
    }

    fn block_confirmed(&mut self, block: &Block) {
        self.emit(Line::BlockMined { block });
    }

    fn block_reorged(&mut self, height: u32) {
        self.emit(Line::BlockUnmined { height });
    }

    fn describe(&self) -> String {
        format!("printer ({} events)", self.events)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let Cli { dir } = Cli::parse();

    let mut reader = MffReader::open(&dir, Printer::default())?;
    let count = reader.replay()?;

    tracing::info!(
        count,
        tip = reader.chain().tip(),
        "replay finished: {}",
        reader.delegate().describe()
    );
    Ok(())
}

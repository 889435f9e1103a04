use chronology::ChronologyError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MffError {
    #[error("chronology error: {0}")]
    Chronology(#[from] ChronologyError),

    #[error("invalid command: {0:#04x}")]
    InvalidCommand(u8),

    #[error("offender-known flag set without an offender present: {0:#04x}")]
    InconsistentFlags(u8),

    #[error("cannot unconfirm the tip of an empty chain")]
    EmptyChain,

    #[error("height 0 is reserved for the empty chain")]
    ZeroHeight,
}

pub type Result<T> = std::result::Result<T, MffError>;

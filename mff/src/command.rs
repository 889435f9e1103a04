use serde::{Deserialize, Serialize};
use std::fmt;

// Event command byte: a 3-bit opcode in the low bits, offender flags in
// bits 3 and 4. Bit 5 is the principal-known flag and belongs to the
// chronology layer.
pub const CMD_TIME_SET: u8 = 0x00;
pub const CMD_MEMPOOL_IN: u8 = 0x01;
pub const CMD_MEMPOOL_OUT: u8 = 0x02;
pub const CMD_MEMPOOL_INVALIDATED: u8 = 0x03;
pub const CMD_BLOCK_MINED: u8 = 0x04;
pub const CMD_BLOCK_UNMINED: u8 = 0x05;

pub const CMD_OPCODE_MASK: u8 = 0x07;

pub const CMD_FLAG_OFFENDER_PRESENT: u8 = 1 << 3;
pub const CMD_FLAG_OFFENDER_KNOWN: u8 = 1 << 4;

pub fn command_name(opcode: u8) -> &'static str {
    match opcode {
        CMD_TIME_SET => "time_set",
        CMD_MEMPOOL_IN => "mempool_in",
        CMD_MEMPOOL_OUT => "mempool_out",
        CMD_MEMPOOL_INVALIDATED => "mempool_invalidated",
        CMD_BLOCK_MINED => "block_mined",
        CMD_BLOCK_UNMINED => "block_unmined",
        _ => "invalid",
    }
}

/// Why a transaction left or was invalidated.
///
/// One byte on the wire. The named codes below are the ones writers
/// emit; replay passes unrecognized values through to the delegate
/// untouched.
#[derive(Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reason(u8);

impl Reason {
    pub const UNKNOWN: Self = Self(0x00);
    pub const EXPIRED: Self = Self(0x01);
    pub const SIZELIMIT: Self = Self(0x02);
    pub const REORG: Self = Self(0x03);
    pub const CONFLICT: Self = Self(0x04);
    pub const REPLACED: Self = Self(0x05);

    #[inline(always)]
    pub const fn new(code: u8) -> Self {
        Self(code)
    }

    #[inline(always)]
    pub fn into_inner(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Reason::UNKNOWN => write!(f, "unknown"),
            Reason::EXPIRED => write!(f, "expired"),
            Reason::SIZELIMIT => write!(f, "sizelimit"),
            Reason::REORG => write!(f, "reorg"),
            Reason::CONFLICT => write!(f, "conflict"),
            Reason::REPLACED => write!(f, "replaced"),
            Reason(code) => write!(f, "reason({:#04x})", code),
        }
    }
}

impl From<u8> for Reason {
    fn from(code: u8) -> Self {
        Self(code)
    }
}

impl From<Reason> for u8 {
    fn from(Reason(code): Reason) -> Self {
        code
    }
}

use chronology::codec;
use chronology::{CodecError, H256, RefLookup, Sid};
use serde::Serialize;
use std::fmt;
use std::io::{Read, Write};

/// Output index of the coinbase pseudo-outpoint.
pub const COINBASE_N: u64 = 0xffff_ffff;

/// What the recorder knows about the transaction an outpoint spends.
/// In-memory annotation only; never serialized.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Serialize)]
pub enum OutpointState {
    #[default]
    Unknown,
    Known,
    Confirmed,
    Coinbase,
}

/// A reference to the `n`-th output of a previous transaction.
///
/// The previous transaction is identified by its interned sequence id
/// when one is set, and by its hash otherwise; exactly one of the two is
/// authoritative at any time.
#[derive(Debug, Clone, Serialize)]
pub struct Outpoint {
    n: u64,
    sid: Option<Sid>,
    txid: H256,
    #[serde(skip)]
    state: OutpointState,
}

impl Outpoint {
    /// Outpoint identified by the spent transaction's hash.
    pub fn by_txid(n: u64, txid: H256) -> Self {
        Self {
            n,
            sid: None,
            txid,
            state: OutpointState::Unknown,
        }
    }

    /// Outpoint identified by the spent transaction's sequence id.
    pub fn by_sid(n: u64, sid: Sid) -> Self {
        Self {
            n,
            sid: Some(sid),
            txid: H256::ZERO,
            state: OutpointState::Known,
        }
    }

    /// The coinbase pseudo-outpoint: index `0xffffffff`, zero hash.
    pub fn coinbase() -> Self {
        Self {
            n: COINBASE_N,
            sid: None,
            txid: H256::ZERO,
            state: OutpointState::Coinbase,
        }
    }

    #[inline(always)]
    pub fn n(&self) -> u64 {
        self.n
    }

    #[inline(always)]
    pub fn sid(&self) -> Option<Sid> {
        self.sid
    }

    /// Hash identity, when the sequence id is not set.
    pub fn txid(&self) -> Option<&H256> {
        match self.sid {
            Some(_) => None,
            None => Some(&self.txid),
        }
    }

    #[inline(always)]
    pub fn state(&self) -> OutpointState {
        self.state
    }

    pub fn set_state(&mut self, state: OutpointState) {
        self.state = state;
    }

    /// Re-identify by hash, clearing the sequence id.
    pub fn set_txid(&mut self, txid: H256) {
        self.sid = None;
        self.txid = txid;
    }

    /// Re-identify by sequence id, clearing the hash.
    pub fn set_sid(&mut self, sid: Sid) {
        self.sid = Some(sid);
        self.txid = H256::ZERO;
    }

    pub fn is_coinbase(&self) -> bool {
        self.n == COINBASE_N && self.sid.is_none() && self.txid.is_zero()
    }

    /// Whether this outpoint spends the transaction with the given
    /// identity.
    pub fn spends_tx(&self, txid: &H256, sid: Option<Sid>) -> bool {
        match self.sid {
            Some(own) => Some(own) == sid || self.txid == *txid,
            None => self.txid == *txid,
        }
    }

    pub(crate) fn encode(&self, refs: &dyn RefLookup, w: &mut dyn Write) -> Result<(), CodecError> {
        // compress a hash identity down to a sequence id when the
        // dictionary already knows the spent transaction
        let sid = self.sid.or_else(|| refs.sid_of(&self.txid));
        match sid {
            Some(sid) => {
                codec::put_u8(w, 1)?;
                codec::put_varint(w, sid.into_inner())?;
            }
            None => {
                codec::put_u8(w, 0)?;
                codec::put_hash(w, &self.txid)?;
            }
        }
        codec::put_varint(w, self.n)
    }

    pub(crate) fn decode(r: &mut dyn Read, refs: &dyn RefLookup) -> Result<Self, CodecError> {
        let mut outpoint = match codec::get_u8(r)? {
            1 => {
                // expand back to the hash form the writer compressed,
                // so the decoded input equals the recorded one
                let sid = Sid::new(codec::get_varint(r)?);
                match refs.hash_of(sid) {
                    Some(txid) => {
                        let mut outpoint = Self::by_txid(0, *txid);
                        outpoint.state = OutpointState::Known;
                        outpoint
                    }
                    None => Self::by_sid(0, sid),
                }
            }
            0 => {
                let txid = codec::get_hash(r)?;
                Self::by_txid(0, txid)
            }
            tag => return Err(CodecError::Tag(tag)),
        };
        outpoint.n = codec::get_varint(r)?;
        if outpoint.is_coinbase() {
            outpoint.state = OutpointState::Coinbase;
        }
        Ok(outpoint)
    }
}

/// Equality is on the spent transaction's identity: sequence id when
/// set, hash otherwise. The output index does not participate.
impl PartialEq for Outpoint {
    fn eq(&self, other: &Self) -> bool {
        match self.sid {
            Some(sid) => Some(sid) == other.sid,
            None => self.txid == other.txid,
        }
    }
}

impl Eq for Outpoint {}

impl fmt::Display for Outpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sid {
            Some(sid) => write!(f, "outpoint(known seq={}, n={})", sid, self.n),
            None => write!(f, "outpoint(unknown txid={}, n={})", self.txid, self.n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronology::NoRefs;

    #[test]
    fn coinbase_sentinel() {
        let coinbase = Outpoint::coinbase();
        assert!(coinbase.is_coinbase());
        assert_eq!(coinbase.n(), COINBASE_N);
        assert_eq!(coinbase.state(), OutpointState::Coinbase);
        assert!(!Outpoint::by_txid(COINBASE_N, H256::repeat_byte(1)).is_coinbase());
    }

    #[test]
    fn equality_is_on_identity() {
        let txid = H256::repeat_byte(0xaa);
        assert_eq!(Outpoint::by_txid(0, txid), Outpoint::by_txid(7, txid));
        assert_ne!(
            Outpoint::by_txid(0, txid),
            Outpoint::by_txid(0, H256::repeat_byte(0xbb))
        );
        assert_eq!(Outpoint::by_sid(1, Sid::new(4)), Outpoint::by_sid(2, Sid::new(4)));
        assert_ne!(Outpoint::by_sid(1, Sid::new(4)), Outpoint::by_sid(1, Sid::new(5)));
    }

    #[test]
    fn reidentification() {
        let mut outpoint = Outpoint::by_txid(3, H256::repeat_byte(0xcc));
        outpoint.set_sid(Sid::new(9));
        assert_eq!(outpoint.sid(), Some(Sid::new(9)));
        assert_eq!(outpoint.txid(), None);
        outpoint.set_txid(H256::repeat_byte(0xdd));
        assert_eq!(outpoint.sid(), None);
        assert_eq!(outpoint.txid(), Some(&H256::repeat_byte(0xdd)));
    }

    struct OneRef {
        sid: Sid,
        hash: H256,
    }

    impl RefLookup for OneRef {
        fn sid_of(&self, hash: &H256) -> Option<Sid> {
            (*hash == self.hash).then_some(self.sid)
        }

        fn hash_of(&self, sid: Sid) -> Option<&H256> {
            (sid == self.sid).then_some(&self.hash)
        }
    }

    #[test]
    fn known_hash_compresses_and_expands() {
        let refs = OneRef {
            sid: Sid::new(5),
            hash: H256::repeat_byte(0xaa),
        };
        let outpoint = Outpoint::by_txid(3, refs.hash);

        let mut buf = Vec::new();
        outpoint.encode(&refs, &mut buf).unwrap();
        // tag, sid varint, n varint; no 32-byte hash
        assert_eq!(buf, [1, 5, 3]);

        let mut slice = buf.as_slice();
        let decoded = Outpoint::decode(&mut slice, &refs).unwrap();
        assert_eq!(decoded, outpoint);
        assert_eq!(decoded.txid(), Some(&refs.hash));
        assert_eq!(decoded.n(), 3);
        assert_eq!(decoded.state(), OutpointState::Known);
    }

    #[test]
    fn wire_round_trip_both_forms() {
        for outpoint in [
            Outpoint::by_txid(11, H256::repeat_byte(0xee)),
            Outpoint::by_sid(12, Sid::new(3)),
            Outpoint::coinbase(),
        ] {
            let mut buf = Vec::new();
            outpoint.encode(&NoRefs, &mut buf).unwrap();
            let mut slice = buf.as_slice();
            let decoded = Outpoint::decode(&mut slice, &NoRefs).unwrap();
            assert_eq!(decoded, outpoint);
            assert_eq!(decoded.n(), outpoint.n());
            assert!(slice.is_empty());
        }
    }
}

use crate::codec;
use crate::config::ChronologyConfig;
use crate::dictionary::{Dictionary, RefLookup};
use crate::error::{ChronologyError, CodecError};
use crate::hash::H256;
use crate::sid::Sid;
use crate::store::SegmentStore;
use crate::time::Timestamp;
use std::collections::BTreeSet;
use std::io::{Read, Write};
use std::sync::Arc;
use tracing::debug;

/// Bit the chronology ORs into an event's command byte when the event's
/// principal object is already interned. The low five bits belong to the
/// caller.
pub const FLAG_KNOWN: u8 = 1 << 5;

/// An object a chronology can intern and reference.
///
/// `encode`/`decode` receive the reference dictionary as context, so an
/// object may compress embedded hashes down to sequence ids the
/// dictionary already knows, and expand them again on the way back.
pub trait Chronicled: Sized {
    /// Identifying hash of this object.
    fn hash(&self) -> &H256;
    /// Write the object in full.
    fn encode(&self, refs: &dyn RefLookup, w: &mut dyn Write) -> Result<(), CodecError>;
    /// Read back an object written by [`Chronicled::encode`].
    fn decode(r: &mut dyn Read, refs: &dyn RefLookup) -> Result<Self, CodecError>;
}

/// Time-ordered, segmented event log with reference compression.
///
/// Every event is `cmd:u8, delta:varint` followed by a caller-defined
/// body. The first mention of an object writes it in full and interns
/// it; later mentions are a varint sequence id with [`FLAG_KNOWN`] set
/// in the command byte.
pub struct Chronology<T: Chronicled> {
    store: SegmentStore,
    dictionary: Dictionary<T>,
    time: Timestamp,
}

impl<T: Chronicled> Chronology<T> {
    /// An empty in-memory chronology open for writing.
    pub fn memory() -> Self {
        Self::with_store(SegmentStore::mem_write())
    }

    /// Create a chronology for writing.
    pub fn create(config: &ChronologyConfig) -> Result<Self, ChronologyError> {
        let store = match &config.storage_path {
            Some(path) => SegmentStore::dir_create(path, &config.prefix)?,
            None => SegmentStore::mem_write(),
        };
        Ok(Self::with_store(store))
    }

    /// Open an existing chronology for reading.
    pub fn open(config: &ChronologyConfig) -> Result<Self, ChronologyError> {
        let store = match &config.storage_path {
            Some(path) => SegmentStore::dir_open(path, &config.prefix)?,
            None => SegmentStore::mem_read(Vec::new()),
        };
        Ok(Self::with_store(store))
    }

    /// Open the given `(id, bytes)` segments for reading.
    pub fn from_segments(segments: Vec<(u64, Vec<u8>)>) -> Self {
        Self::with_store(SegmentStore::mem_read(segments))
    }

    fn with_store(store: SegmentStore) -> Self {
        Self {
            store,
            dictionary: Dictionary::new(),
            time: Timestamp::default(),
        }
    }

    /// Consume the chronology, returning its raw segments.
    pub fn into_segments(self) -> Result<Vec<(u64, Vec<u8>)>, ChronologyError> {
        self.store.into_segments()
    }

    /// Turn a fully-consumed reading chronology into a writing one that
    /// appends to the last segment, keeping the dictionary and clock.
    pub fn into_append(self) -> Result<Self, ChronologyError> {
        Ok(Self {
            store: self.store.into_append()?,
            dictionary: self.dictionary,
            time: self.time,
        })
    }

    /// Highest segment id begun so far.
    pub fn tip(&self) -> u64 {
        self.store.tip()
    }

    pub fn segment_ids(&self) -> Vec<u64> {
        self.store.segment_ids()
    }

    /// The register clock: timestamp of the newest event pushed or
    /// popped.
    pub fn time(&self) -> Timestamp {
        self.time
    }

    pub fn dictionary(&self) -> &Dictionary<T> {
        &self.dictionary
    }

    pub fn begin_segment(&mut self, id: u64) -> Result<(), ChronologyError> {
        debug!(segment = id, "beginning segment");
        self.store.begin_segment(id)
    }

    pub fn flush(&mut self) -> Result<(), ChronologyError> {
        self.store.flush_store()
    }

    //////////////////////////////////////////////////////////////////////
    // Writing

    /// Write an event header and its principal reference.
    ///
    /// An interned principal is written as its sequence id with
    /// [`FLAG_KNOWN`] ORed into `cmd`; a fresh one is written in full and
    /// interned. With `refer = false` the object is written in full
    /// regardless of dictionary state and the flag stays clear (interning
    /// is idempotent, so both sides still agree on ids).
    pub fn push_event(
        &mut self,
        ts: Timestamp,
        cmd: u8,
        principal: Option<&Arc<T>>,
        refer: bool,
    ) -> Result<(), ChronologyError> {
        let delta = ts
            .checked_delta(self.time)
            .ok_or(ChronologyError::TimeRegression {
                current: self.time,
                requested: ts,
            })?;
        let known = refer
            && principal
                .map(|p| self.dictionary.contains(p.hash()))
                .unwrap_or(false);
        codec::put_u8(&mut self.store, cmd | if known { FLAG_KNOWN } else { 0 })?;
        codec::put_varint(&mut self.store, delta)?;
        self.time = ts;
        match principal {
            Some(principal) if known => self.write_reference(principal)?,
            Some(principal) => self.write_object(principal)?,
            None => {}
        }
        Ok(())
    }

    /// Write an interned object's sequence id.
    pub fn write_reference(&mut self, object: &T) -> Result<(), ChronologyError> {
        let sid = self
            .dictionary
            .sid_of(object.hash())
            .ok_or(ChronologyError::NotInterned(*object.hash()))?;
        codec::put_varint(&mut self.store, sid.into_inner())?;
        Ok(())
    }

    /// Write an object in full and intern it.
    pub fn write_object(&mut self, object: &Arc<T>) -> Result<(), ChronologyError> {
        object.encode(&self.dictionary, &mut self.store)?;
        self.dictionary.intern(object.clone());
        Ok(())
    }

    /// Write a set of object references: a count, then per element a
    /// known flag followed by a sequence id or the full object.
    pub fn write_reference_set(&mut self, objects: &[Arc<T>]) -> Result<(), ChronologyError> {
        codec::put_varint(&mut self.store, objects.len() as u64)?;
        for object in objects {
            match self.dictionary.sid_of(object.hash()) {
                Some(sid) => {
                    codec::put_u8(&mut self.store, 1)?;
                    codec::put_varint(&mut self.store, sid.into_inner())?;
                }
                None => {
                    codec::put_u8(&mut self.store, 0)?;
                    object.encode(&self.dictionary, &mut self.store)?;
                    self.dictionary.intern(object.clone());
                }
            }
        }
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> Result<(), ChronologyError> {
        Ok(codec::put_u8(&mut self.store, value)?)
    }

    pub fn write_u32(&mut self, value: u32) -> Result<(), ChronologyError> {
        Ok(codec::put_u32(&mut self.store, value)?)
    }

    pub fn write_hash(&mut self, hash: &H256) -> Result<(), ChronologyError> {
        Ok(codec::put_hash(&mut self.store, hash)?)
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), ChronologyError> {
        Ok(codec::put_bytes(&mut self.store, bytes)?)
    }

    //////////////////////////////////////////////////////////////////////
    // Reading

    /// Read the next event header. Returns the command byte with the
    /// known flag split out, or `None` at clean end-of-stream.
    pub fn pop_event(&mut self) -> Result<Option<(u8, bool)>, ChronologyError> {
        let Some(byte) = self.store.next_event_byte()? else {
            return Ok(None);
        };
        let delta = codec::get_varint(&mut self.store)?;
        self.time = self.time.saturating_add(delta);
        Ok(Some((byte & !FLAG_KNOWN, byte & FLAG_KNOWN != 0)))
    }

    /// Read a full object and intern it.
    pub fn pop_object(&mut self) -> Result<Arc<T>, ChronologyError> {
        let object = Arc::new(T::decode(&mut self.store, &self.dictionary)?);
        let sid = self.dictionary.intern(object.clone());
        Ok(self.dictionary.get(sid).cloned().unwrap_or(object))
    }

    /// Read a sequence id.
    pub fn pop_reference(&mut self) -> Result<Sid, ChronologyError> {
        Ok(Sid::new(codec::get_varint(&mut self.store)?))
    }

    /// Resolve an interned object by sequence id.
    pub fn resolve(&self, sid: Sid) -> Result<&Arc<T>, ChronologyError> {
        self.dictionary
            .get(sid)
            .ok_or(ChronologyError::UnknownReference(sid))
    }

    /// Read a reference set written by [`Chronology::write_reference_set`],
    /// returning the hashes of the referenced objects.
    pub fn pop_reference_hashes(&mut self) -> Result<BTreeSet<H256>, ChronologyError> {
        let count = codec::get_varint(&mut self.store)?;
        let mut hashes = BTreeSet::new();
        for _ in 0..count {
            match codec::get_u8(&mut self.store)? {
                1 => {
                    let sid = Sid::new(codec::get_varint(&mut self.store)?);
                    let hash = self
                        .dictionary
                        .hash_of(sid)
                        .copied()
                        .ok_or(ChronologyError::UnknownReference(sid))?;
                    hashes.insert(hash);
                }
                0 => {
                    let object = self.pop_object()?;
                    hashes.insert(*object.hash());
                }
                tag => return Err(CodecError::Tag(tag).into()),
            }
        }
        Ok(hashes)
    }

    pub fn read_u8(&mut self) -> Result<u8, ChronologyError> {
        Ok(codec::get_u8(&mut self.store)?)
    }

    pub fn read_u32(&mut self) -> Result<u32, ChronologyError> {
        Ok(codec::get_u32(&mut self.store)?)
    }

    pub fn read_hash(&mut self) -> Result<H256, ChronologyError> {
        Ok(codec::get_hash(&mut self.store)?)
    }

    pub fn read_bytes(&mut self) -> Result<Vec<u8>, ChronologyError> {
        Ok(codec::get_bytes(&mut self.store)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;

    /// Minimal chronicled object for exercising the framing layer.
    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Note {
        hash: H256,
        body: Vec<u8>,
    }

    impl Note {
        fn new(seed: u8, body: &[u8]) -> Arc<Self> {
            Arc::new(Self {
                hash: H256::repeat_byte(seed),
                body: body.to_vec(),
            })
        }
    }

    impl Chronicled for Note {
        fn hash(&self) -> &H256 {
            &self.hash
        }

        fn encode(&self, _refs: &dyn RefLookup, w: &mut dyn Write) -> Result<(), CodecError> {
            codec::put_hash(w, &self.hash)?;
            codec::put_bytes(w, &self.body)
        }

        fn decode(r: &mut dyn Read, _refs: &dyn RefLookup) -> Result<Self, CodecError> {
            Ok(Self {
                hash: codec::get_hash(r)?,
                body: codec::get_bytes(r)?,
            })
        }
    }

    const CMD: u8 = 0x01;

    fn ts(secs: u64) -> Timestamp {
        Timestamp::new(secs)
    }

    #[test]
    fn fresh_then_known_round_trip() {
        let note = Note::new(0x11, b"payload");
        let mut chron = Chronology::<Note>::memory();
        chron.push_event(ts(100), CMD, Some(&note), true).unwrap();
        chron.push_event(ts(105), CMD, Some(&note), true).unwrap();

        let mut chron = Chronology::<Note>::from_segments(chron.into_segments().unwrap());

        let (cmd, known) = chron.pop_event().unwrap().unwrap();
        assert_eq!(cmd, CMD);
        assert!(!known);
        assert_eq!(chron.time(), ts(100));
        let decoded = chron.pop_object().unwrap();
        assert_eq!(*decoded, *note);

        let (cmd, known) = chron.pop_event().unwrap().unwrap();
        assert_eq!(cmd, CMD);
        assert!(known);
        assert_eq!(chron.time(), ts(105));
        let sid = chron.pop_reference().unwrap();
        assert_eq!(sid, Sid::new(0));
        assert_eq!(chron.resolve(sid).unwrap().hash(), note.hash());

        assert!(chron.pop_event().unwrap().is_none());
    }

    #[test]
    fn full_record_mode_keeps_ids_aligned() {
        let note = Note::new(0x22, b"data");
        let other = Note::new(0x33, b"more");
        let mut chron = Chronology::<Note>::memory();
        chron.push_event(ts(1), CMD, Some(&note), true).unwrap();
        // re-record in full: flag stays clear, no new id is assigned
        chron.push_event(ts(2), CMD, Some(&note), false).unwrap();
        chron.push_event(ts(3), CMD, Some(&other), true).unwrap();

        let mut chron = Chronology::<Note>::from_segments(chron.into_segments().unwrap());
        let (_, known) = chron.pop_event().unwrap().unwrap();
        assert!(!known);
        chron.pop_object().unwrap();
        let (_, known) = chron.pop_event().unwrap().unwrap();
        assert!(!known);
        chron.pop_object().unwrap();
        let (_, known) = chron.pop_event().unwrap().unwrap();
        assert!(!known);
        let decoded = chron.pop_object().unwrap();
        assert_eq!(decoded.hash(), other.hash());
        assert_eq!(chron.dictionary().len(), 2);
        assert_eq!(chron.dictionary().sid_of(other.hash()), Some(Sid::new(1)));
    }

    #[test]
    fn reference_set_round_trip() {
        let a = Note::new(0x0a, b"a");
        let b = Note::new(0x0b, b"b");
        let mut chron = Chronology::<Note>::memory();
        // make `a` known ahead of the set
        chron.push_event(ts(1), CMD, Some(&a), true).unwrap();
        chron.push_event(ts(2), 0x04, None, true).unwrap();
        chron
            .write_reference_set(&[a.clone(), b.clone()])
            .unwrap();

        let mut chron = Chronology::<Note>::from_segments(chron.into_segments().unwrap());
        chron.pop_event().unwrap().unwrap();
        chron.pop_object().unwrap();
        chron.pop_event().unwrap().unwrap();
        let hashes = chron.pop_reference_hashes().unwrap();
        assert_eq!(hashes.len(), 2);
        assert!(hashes.contains(a.hash()));
        assert!(hashes.contains(b.hash()));
        // the fresh element was interned while reading the set
        assert_eq!(chron.dictionary().sid_of(b.hash()), Some(Sid::new(1)));
    }

    #[test]
    fn time_must_not_regress() {
        let mut chron = Chronology::<Note>::memory();
        chron.push_event(ts(50), CMD, None, true).unwrap();
        chron.push_event(ts(50), CMD, None, true).unwrap();
        assert!(matches!(
            chron.push_event(ts(49), CMD, None, true),
            Err(ChronologyError::TimeRegression { .. })
        ));
    }

    #[test]
    fn events_survive_segment_boundaries() {
        let note = Note::new(0x44, b"x");
        let mut chron = Chronology::<Note>::memory();
        chron.push_event(ts(1), CMD, Some(&note), true).unwrap();
        chron.begin_segment(8).unwrap();
        chron.push_event(ts(2), CMD, Some(&note), true).unwrap();
        assert_eq!(chron.tip(), 8);

        let mut chron = Chronology::<Note>::from_segments(chron.into_segments().unwrap());
        chron.pop_event().unwrap().unwrap();
        chron.pop_object().unwrap();
        let (_, known) = chron.pop_event().unwrap().unwrap();
        assert!(known);
        let sid = chron.pop_reference().unwrap();
        assert_eq!(chron.resolve(sid).unwrap().hash(), note.hash());
        assert!(chron.pop_event().unwrap().is_none());
    }

    #[test]
    fn truncated_body_is_fatal() {
        let note = Note::new(0x55, b"payload");
        let mut chron = Chronology::<Note>::memory();
        chron.push_event(ts(1), CMD, Some(&note), true).unwrap();
        let mut segments = chron.into_segments().unwrap();
        let last = segments.last_mut().unwrap();
        last.1.truncate(last.1.len() - 1);

        let mut chron = Chronology::<Note>::from_segments(segments);
        chron.pop_event().unwrap().unwrap();
        assert!(matches!(
            chron.pop_object(),
            Err(ChronologyError::Codec(CodecError::Truncated))
        ));
    }

    #[test]
    fn unresolved_reference_is_fatal() {
        let chron = Chronology::<Note>::memory();
        assert!(matches!(
            chron.resolve(Sid::new(9)),
            Err(ChronologyError::UnknownReference(_))
        ));
    }

    #[test]
    fn write_reference_requires_interning() {
        let note = Note::new(0x66, b"n");
        let mut chron = Chronology::<Note>::memory();
        assert!(matches!(
            chron.write_reference(&note),
            Err(ChronologyError::NotInterned(_))
        ));
    }

    #[test]
    fn directory_backed_chronology() {
        let tmp = tempfile::tempdir().unwrap();
        let config = ChronologyConfig {
            storage_path: Some(tmp.path().join("log")),
            prefix: "note".to_string(),
        };
        let note = Note::new(0x77, b"persisted");

        let mut chron = Chronology::<Note>::create(&config).unwrap();
        chron.push_event(ts(10), CMD, Some(&note), true).unwrap();
        chron.begin_segment(2).unwrap();
        chron.push_event(ts(11), CMD, Some(&note), true).unwrap();
        chron.flush().unwrap();
        drop(chron);

        let mut chron = Chronology::<Note>::open(&config).unwrap();
        assert_eq!(chron.segment_ids(), vec![0, 2]);
        let (_, known) = chron.pop_event().unwrap().unwrap();
        assert!(!known);
        assert_eq!(*chron.pop_object().unwrap(), *note);
        let (_, known) = chron.pop_event().unwrap().unwrap();
        assert!(known);
        let sid = chron.pop_reference().unwrap();
        assert_eq!(chron.resolve(sid).unwrap().hash(), note.hash());
        assert!(chron.pop_event().unwrap().is_none());
    }

    #[test]
    fn dictionary_interning_is_idempotent() {
        let note = Note::new(0x88, b"once");
        let mut dictionary = Dictionary::<Note>::new();
        let first = dictionary.intern(note.clone());
        let second = dictionary.intern(note.clone());
        assert_eq!(first, second);
        assert_eq!(dictionary.len(), 1);
        assert_eq!(dictionary.hash_of(first), Some(note.hash()));
    }
}

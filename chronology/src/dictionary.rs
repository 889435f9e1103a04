use crate::chronology::Chronicled;
use crate::hash::H256;
use crate::sid::Sid;
use std::collections::HashMap;
use std::sync::Arc;

/// Resolves between object hashes and their interned sequence ids.
///
/// This is the context objects receive while encoding and decoding, so
/// they can compress an embedded hash down to a sequence id and back.
pub trait RefLookup {
    fn sid_of(&self, hash: &H256) -> Option<Sid>;
    fn hash_of(&self, sid: Sid) -> Option<&H256>;
}

/// Append-only reference dictionary.
///
/// Objects are held in an arena indexed by their sequence id; a hash
/// index points back into it. Entries are never removed, so ids stay
/// valid for the lifetime of the recording.
pub struct Dictionary<T> {
    objects: Vec<Arc<T>>,
    references: HashMap<H256, Sid>,
}

impl<T: Chronicled> Dictionary<T> {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            references: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn contains(&self, hash: &H256) -> bool {
        self.references.contains_key(hash)
    }

    pub fn get(&self, sid: Sid) -> Option<&Arc<T>> {
        self.objects.get(sid.into_inner() as usize)
    }

    /// Intern an object, assigning the next sequence id.
    ///
    /// Idempotent: re-interning a hash that is already present returns
    /// the existing id. Writers and readers rely on this to assign the
    /// same ids when a known object is re-recorded in full.
    pub fn intern(&mut self, object: Arc<T>) -> Sid {
        if let Some(sid) = self.references.get(object.hash()) {
            return *sid;
        }
        let sid = Sid::new(self.objects.len() as u64);
        self.references.insert(*object.hash(), sid);
        self.objects.push(object);
        sid
    }
}

impl<T: Chronicled> Default for Dictionary<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Chronicled> RefLookup for Dictionary<T> {
    fn sid_of(&self, hash: &H256) -> Option<Sid> {
        self.references.get(hash).copied()
    }

    fn hash_of(&self, sid: Sid) -> Option<&H256> {
        self.get(sid).map(|object| object.hash())
    }
}

/// Lookup context with no entries; lets self-contained objects encode
/// outside any chronology.
pub struct NoRefs;

impl RefLookup for NoRefs {
    fn sid_of(&self, _hash: &H256) -> Option<Sid> {
        None
    }

    fn hash_of(&self, _sid: Sid) -> Option<&H256> {
        None
    }
}

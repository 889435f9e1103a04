//! Segment files are the only thing a chronology keeps on disk.
//!
//! A store is an ordered run of segments keyed by strictly increasing
//! cluster ids. Writing appends to the newest segment; reading walks the
//! segments in id order. A store is open for writing or for reading,
//! never both. Record bodies never span a segment boundary: only the
//! event-header byte may advance the read cursor into the next segment.

use crate::error::{ChronologyError, FileError};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub(crate) enum SegmentStore {
    MemWrite {
        segments: Vec<(u64, Vec<u8>)>,
    },
    MemRead {
        segments: Vec<(u64, Vec<u8>)>,
        index: usize,
        offset: usize,
    },
    DirWrite {
        dir: PathBuf,
        prefix: String,
        ids: Vec<u64>,
        sink: BufWriter<File>,
    },
    DirRead {
        dir: PathBuf,
        prefix: String,
        ids: Vec<u64>,
        index: usize,
        buf: Vec<u8>,
        offset: usize,
    },
}

impl SegmentStore {
    /// Open an in-memory store for writing, with segment 0 begun.
    pub fn mem_write() -> Self {
        SegmentStore::MemWrite {
            segments: vec![(0, Vec::new())],
        }
    }

    /// Open the given segments for reading.
    pub fn mem_read(segments: Vec<(u64, Vec<u8>)>) -> Self {
        SegmentStore::MemRead {
            segments,
            index: 0,
            offset: 0,
        }
    }

    /// Create a directory-backed store for writing, with segment 0 begun.
    /// The directory is created if missing and must not already hold a
    /// recording.
    pub fn dir_create(dir: &Path, prefix: &str) -> Result<Self, ChronologyError> {
        if !dir.exists() {
            fs::create_dir_all(dir)
                .map_err(|err| FileError::Open(dir.to_path_buf(), err))?;
        }
        if !dir.is_dir() {
            return Err(FileError::PathNotDir(dir.to_path_buf()).into());
        }
        if !Self::scan(dir, prefix)?.is_empty() {
            return Err(ChronologyError::StoreNotEmpty(dir.to_path_buf()));
        }
        let sink = Self::new_segment_file(&Self::segment_path(dir, prefix, 0))?;
        Ok(SegmentStore::DirWrite {
            dir: dir.to_path_buf(),
            prefix: prefix.to_string(),
            ids: vec![0],
            sink,
        })
    }

    /// Open an existing directory-backed store for reading. A directory
    /// with no segments replays as an empty recording.
    pub fn dir_open(dir: &Path, prefix: &str) -> Result<Self, ChronologyError> {
        if !dir.exists() {
            return Err(FileError::PathNotFound(dir.to_path_buf()).into());
        }
        if !dir.is_dir() {
            return Err(FileError::PathNotDir(dir.to_path_buf()).into());
        }
        let ids = Self::scan(dir, prefix)?;
        let buf = match ids.first() {
            Some(id) => Self::load_segment(dir, prefix, *id)?,
            None => Vec::new(),
        };
        Ok(SegmentStore::DirRead {
            dir: dir.to_path_buf(),
            prefix: prefix.to_string(),
            ids,
            index: 0,
            buf,
            offset: 0,
        })
    }

    /// Begin a new segment. Ids must be strictly increasing.
    pub fn begin_segment(&mut self, id: u64) -> Result<(), ChronologyError> {
        let tip = self.tip();
        if id <= tip {
            return Err(ChronologyError::SegmentNotMonotonic { tip, requested: id });
        }
        match self {
            SegmentStore::MemWrite { segments } => {
                segments.push((id, Vec::new()));
                Ok(())
            }
            SegmentStore::DirWrite {
                dir,
                prefix,
                ids,
                sink,
            } => {
                sink.flush().map_err(FileError::Flush)?;
                *sink = Self::new_segment_file(&Self::segment_path(dir, prefix, id))?;
                ids.push(id);
                Ok(())
            }
            _ => Err(ChronologyError::ReadOnly),
        }
    }

    /// Read the next event-header byte, advancing across segment
    /// boundaries. `None` means the recording is fully consumed.
    pub fn next_event_byte(&mut self) -> Result<Option<u8>, ChronologyError> {
        loop {
            match self {
                SegmentStore::MemRead {
                    segments,
                    index,
                    offset,
                } => {
                    let Some((_, buf)) = segments.get(*index) else {
                        return Ok(None);
                    };
                    if *offset < buf.len() {
                        let byte = buf[*offset];
                        *offset += 1;
                        return Ok(Some(byte));
                    }
                    *index += 1;
                    *offset = 0;
                }
                SegmentStore::DirRead {
                    dir,
                    prefix,
                    ids,
                    index,
                    buf,
                    offset,
                } => {
                    if *index >= ids.len() {
                        return Ok(None);
                    }
                    if *offset < buf.len() {
                        let byte = buf[*offset];
                        *offset += 1;
                        return Ok(Some(byte));
                    }
                    *index += 1;
                    *offset = 0;
                    *buf = match ids.get(*index) {
                        Some(id) => Self::load_segment(dir, prefix, *id)?,
                        None => Vec::new(),
                    };
                }
                _ => return Err(ChronologyError::WriteOnly),
            }
        }
    }

    /// Highest segment id. For a reading store, the id of the segment
    /// under the cursor.
    pub fn tip(&self) -> u64 {
        match self {
            SegmentStore::MemWrite { segments } => {
                segments.last().map(|(id, _)| *id).unwrap_or(0)
            }
            SegmentStore::DirWrite { ids, .. } => ids.last().copied().unwrap_or(0),
            SegmentStore::MemRead {
                segments, index, ..
            } => segments
                .get(*index)
                .or_else(|| segments.last())
                .map(|(id, _)| *id)
                .unwrap_or(0),
            SegmentStore::DirRead { ids, index, .. } => ids
                .get(*index)
                .or_else(|| ids.last())
                .copied()
                .unwrap_or(0),
        }
    }

    pub fn segment_ids(&self) -> Vec<u64> {
        match self {
            SegmentStore::MemWrite { segments } | SegmentStore::MemRead { segments, .. } => {
                segments.iter().map(|(id, _)| *id).collect()
            }
            SegmentStore::DirWrite { ids, .. } | SegmentStore::DirRead { ids, .. } => ids.clone(),
        }
    }

    pub fn flush_store(&mut self) -> Result<(), ChronologyError> {
        match self {
            SegmentStore::DirWrite { sink, .. } => {
                sink.flush().map_err(FileError::Flush)?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Consume the store, returning every segment as `(id, bytes)`.
    pub fn into_segments(mut self) -> Result<Vec<(u64, Vec<u8>)>, ChronologyError> {
        self.flush_store()?;
        match self {
            SegmentStore::MemWrite { segments } | SegmentStore::MemRead { segments, .. } => {
                Ok(segments)
            }
            SegmentStore::DirWrite {
                dir, prefix, ids, ..
            }
            | SegmentStore::DirRead {
                dir, prefix, ids, ..
            } => ids
                .iter()
                .map(|id| Self::load_segment(&dir, &prefix, *id).map(|buf| (*id, buf)))
                .collect(),
        }
    }

    /// Turn a fully-consumed reading store into a writing one appending
    /// to its last segment. A writing store passes through unchanged.
    pub fn into_append(self) -> Result<Self, ChronologyError> {
        match self {
            SegmentStore::MemRead { mut segments, .. } => {
                if segments.is_empty() {
                    segments.push((0, Vec::new()));
                }
                Ok(SegmentStore::MemWrite { segments })
            }
            SegmentStore::DirRead {
                dir, prefix, ids, ..
            } => {
                if ids.is_empty() {
                    return Self::dir_create(&dir, &prefix);
                }
                let path = Self::segment_path(&dir, &prefix, ids[ids.len() - 1]);
                let file = OpenOptions::new()
                    .append(true)
                    .open(&path)
                    .map_err(|err| FileError::Open(path, err))?;
                Ok(SegmentStore::DirWrite {
                    dir,
                    prefix,
                    ids,
                    sink: BufWriter::new(file),
                })
            }
            store => Ok(store),
        }
    }

    fn segment_path(dir: &Path, prefix: &str, id: u64) -> PathBuf {
        dir.join(format!("{}.{:010}.seg", prefix, id))
    }

    fn new_segment_file(path: &Path) -> Result<BufWriter<File>, ChronologyError> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|err| FileError::Create(path.to_path_buf(), err))?;
        Ok(BufWriter::new(file))
    }

    fn load_segment(dir: &Path, prefix: &str, id: u64) -> Result<Vec<u8>, ChronologyError> {
        let path = Self::segment_path(dir, prefix, id);
        fs::read(&path)
            .map_err(|err| FileError::Open(path, err))
            .map_err(ChronologyError::from)
    }

    fn scan(dir: &Path, prefix: &str) -> Result<Vec<u64>, ChronologyError> {
        let entries =
            fs::read_dir(dir).map_err(|err| FileError::ListDir(dir.to_path_buf(), err))?;
        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| FileError::ListDir(dir.to_path_buf(), err))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(rest) = name.strip_prefix(prefix).and_then(|s| s.strip_prefix('.')) else {
                continue;
            };
            let Some(digits) = rest.strip_suffix(".seg") else {
                continue;
            };
            if let Ok(id) = digits.parse::<u64>() {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }
}

impl Read for SegmentStore {
    /// Reads stay inside the current segment; a depleted segment reads
    /// as end-of-file, which record decoders report as truncation.
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let (buf, offset) = match self {
            SegmentStore::MemRead {
                segments,
                index,
                offset,
            } => match segments.get(*index) {
                Some((_, buf)) => (buf.as_slice(), offset),
                None => return Ok(0),
            },
            SegmentStore::DirRead {
                ids,
                index,
                buf,
                offset,
                ..
            } => {
                if *index >= ids.len() {
                    return Ok(0);
                }
                (buf.as_slice(), offset)
            }
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "store is open for writing",
                ))
            }
        };
        let available = &buf[*offset..];
        let n = available.len().min(out.len());
        out[..n].copy_from_slice(&available[..n]);
        *offset += n;
        Ok(n)
    }
}

impl Write for SegmentStore {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        match self {
            SegmentStore::MemWrite { segments } => {
                if let Some((_, buf)) = segments.last_mut() {
                    buf.extend_from_slice(data);
                } else {
                    segments.push((0, data.to_vec()));
                }
                Ok(data.len())
            }
            SegmentStore::DirWrite { sink, .. } => sink.write(data),
            _ => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "store is open for reading",
            )),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            SegmentStore::DirWrite { sink, .. } => sink.flush(),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SegmentStore;
    use crate::error::ChronologyError;
    use std::io::{Read, Write};

    #[test]
    fn memory_write_read_across_segments() {
        let mut store = SegmentStore::mem_write();
        store.write_all(b"one").unwrap();
        store.begin_segment(4).unwrap();
        store.begin_segment(5).unwrap(); // empty segment in the middle
        store.begin_segment(6).unwrap();
        store.write_all(b"two").unwrap();
        assert_eq!(store.segment_ids(), vec![0, 4, 5, 6]);

        let mut store = SegmentStore::mem_read(store.into_segments().unwrap());
        let mut collected = Vec::new();
        while let Some(byte) = store.next_event_byte().unwrap() {
            collected.push(byte);
        }
        assert_eq!(collected, b"onetwo");
        assert!(store.next_event_byte().unwrap().is_none());
    }

    #[test]
    fn segment_ids_must_increase() {
        let mut store = SegmentStore::mem_write();
        store.begin_segment(3).unwrap();
        assert!(matches!(
            store.begin_segment(3),
            Err(ChronologyError::SegmentNotMonotonic { tip: 3, requested: 3 })
        ));
        assert!(matches!(
            store.begin_segment(1),
            Err(ChronologyError::SegmentNotMonotonic { .. })
        ));
    }

    #[test]
    fn body_reads_stop_at_segment_end() {
        let mut store = SegmentStore::mem_write();
        store.write_all(b"ab").unwrap();
        store.begin_segment(1).unwrap();
        store.write_all(b"cd").unwrap();

        let mut store = SegmentStore::mem_read(store.into_segments().unwrap());
        assert_eq!(store.next_event_byte().unwrap(), Some(b'a'));
        let mut buf = [0u8; 2];
        // only 'b' is left in segment 0
        assert!(store.read_exact(&mut buf).is_err());
    }

    #[test]
    fn directory_store_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("store");

        let mut store = SegmentStore::dir_create(&dir, "test").unwrap();
        store.write_all(b"first").unwrap();
        store.begin_segment(7).unwrap();
        store.write_all(b"second").unwrap();
        store.flush_store().unwrap();
        drop(store);

        let mut store = SegmentStore::dir_open(&dir, "test").unwrap();
        assert_eq!(store.segment_ids(), vec![0, 7]);
        let mut collected = Vec::new();
        while let Some(byte) = store.next_event_byte().unwrap() {
            collected.push(byte);
        }
        assert_eq!(collected, b"firstsecond");
    }

    #[test]
    fn create_refuses_existing_recording() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("store");
        let store = SegmentStore::dir_create(&dir, "test").unwrap();
        drop(store);
        assert!(matches!(
            SegmentStore::dir_create(&dir, "test"),
            Err(ChronologyError::StoreNotEmpty(_))
        ));
    }

    #[test]
    fn reopen_for_append() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("store");

        let mut store = SegmentStore::dir_create(&dir, "test").unwrap();
        store.write_all(b"head").unwrap();
        store.flush_store().unwrap();
        drop(store);

        let mut store = SegmentStore::dir_open(&dir, "test").unwrap();
        while store.next_event_byte().unwrap().is_some() {}
        let mut store = store.into_append().unwrap();
        store.write_all(b"tail").unwrap();
        store.flush_store().unwrap();
        drop(store);

        let mut store = SegmentStore::dir_open(&dir, "test").unwrap();
        let mut collected = Vec::new();
        while let Some(byte) = store.next_event_byte().unwrap() {
            collected.push(byte);
        }
        assert_eq!(collected, b"headtail");
    }
}

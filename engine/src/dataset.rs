//! Sorted key datasets.
//!
//! On-disk format: an 8-byte element count followed by that many 8-byte keys,
//! native byte order, no padding. Keys are expected in non-decreasing order;
//! that is a precondition of the caller and is not validated here.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LoadError, Result};

const KEY_BYTES: usize = std::mem::size_of::<u64>();

/// Keys converted per read call while loading.
const LOAD_CHUNK_KEYS: usize = 1 << 20;

/// Anything that can be ordered by a `u64` lookup key.
///
/// Lets the resolver and verifier work over plain key arrays and over
/// payload-augmented rows without copying either.
pub trait SortKey {
    fn sort_key(&self) -> u64;
}

impl SortKey for u64 {
    #[inline(always)]
    fn sort_key(&self) -> u64 {
        *self
    }
}

/// A key paired with a synthetic payload: its ordinal position in the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(C)]
pub struct Row {
    pub key: u64,
    pub value: u64,
}

impl SortKey for Row {
    #[inline(always)]
    fn sort_key(&self) -> u64 {
        self.key
    }
}

/// Immutable sorted key array.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    keys: Vec<u64>,
}

impl Dataset {
    /// Wrap keys that are already sorted.
    pub fn from_sorted(keys: Vec<u64>) -> Self {
        debug_assert!(keys.windows(2).all(|w| w[0] <= w[1]), "keys must be sorted");
        Self { keys }
    }

    /// Load a dataset file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let (mut reader, count) = open_counted(path)?;
        let mut keys = Vec::with_capacity(count);
        let mut buf = vec![0u8; LOAD_CHUNK_KEYS.min(count.max(1)) * KEY_BYTES];
        let mut remaining = count;
        while remaining > 0 {
            let take = remaining.min(LOAD_CHUNK_KEYS);
            let bytes = &mut buf[..take * KEY_BYTES];
            reader.read_exact(bytes).map_err(|source| LoadError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            keys.extend(bytes.chunks_exact(KEY_BYTES).map(read_ne_u64));
            remaining -= take;
        }

        tracing::debug!(path = %path.display(), keys = keys.len(), "dataset loaded");
        Ok(Self { keys })
    }

    pub fn keys(&self) -> &[u64] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn min_key(&self) -> Option<u64> {
        self.keys.first().copied()
    }

    pub fn max_key(&self) -> Option<u64> {
        self.keys.last().copied()
    }

    /// Key count declared by a dataset file, without reading the keys.
    ///
    /// Fails exactly where [`Dataset::load`] would on the header or on a file
    /// too short for the declared count.
    pub fn read_len(path: impl AsRef<Path>) -> Result<usize> {
        open_counted(path.as_ref()).map(|(_, count)| count)
    }

    /// Pair every key with its ordinal position.
    pub fn rows(&self) -> Vec<Row> {
        self.keys
            .iter()
            .enumerate()
            .map(|(i, &key)| Row {
                key,
                value: i as u64,
            })
            .collect()
    }
}

/// Open a dataset file and read its count header, leaving the reader at the
/// first key. The file must be long enough to hold every declared key.
fn open_counted(path: &Path) -> Result<(BufReader<File>, usize)> {
    let file = File::open(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let read_err = |source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    };

    let file_len = file.metadata().map_err(read_err)?.len();
    let mut reader = BufReader::new(file);

    let mut header = [0u8; KEY_BYTES];
    reader.read_exact(&mut header).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            LoadError::Truncated {
                path: path.to_path_buf(),
                expected: KEY_BYTES as u64,
                found: file_len,
            }
        } else {
            read_err(e)
        }
    })?;
    let count = u64::from_ne_bytes(header);

    let expected = count
        .checked_mul(KEY_BYTES as u64)
        .and_then(|body| body.checked_add(KEY_BYTES as u64))
        .ok_or_else(|| LoadError::malformed(path, format!("element count {count} overflows")))?;
    if file_len < expected {
        return Err(LoadError::Truncated {
            path: path.to_path_buf(),
            expected,
            found: file_len,
        });
    }

    let count = usize::try_from(count)
        .map_err(|_| LoadError::malformed(path, "element count exceeds address space"))?;
    Ok((reader, count))
}

#[inline]
pub(crate) fn read_ne_u64(bytes: &[u8]) -> u64 {
    let mut word = [0u8; KEY_BYTES];
    word.copy_from_slice(&bytes[..KEY_BYTES]);
    u64::from_ne_bytes(word)
}

/// Write keys in the dataset file format.
pub fn write_keys(path: impl AsRef<Path>, keys: &[u64]) -> io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    out.write_all(&(keys.len() as u64).to_ne_bytes())?;
    for key in keys {
        out.write_all(&key.to_ne_bytes())?;
    }
    out.flush()
}

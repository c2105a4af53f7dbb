//! Hashing of published change streams.
//!
//! Uses FNV-1a over the canonical JSON encoding of each entry. These
//! hashes are not cryptographically secure; they are fast equality
//! checks between runs.

use railsim_core::ChangeEntry;

use crate::error::ReplayError;

/// FNV-1a offset basis for 64-bit.
const FNV_OFFSET: u64 = 0xcbf29ce484222325;
/// FNV-1a prime for 64-bit.
const FNV_PRIME: u64 = 0x00000100000001B3;

#[inline]
fn fnv1a_byte(hash: u64, byte: u8) -> u64 {
    (hash ^ byte as u64).wrapping_mul(FNV_PRIME)
}

#[inline]
fn fnv1a_bytes(mut hash: u64, bytes: &[u8]) -> u64 {
    for &b in bytes {
        hash = fnv1a_byte(hash, b);
    }
    hash
}

/// Incremental FNV-1a hash over a sequence of entries.
///
/// Entry boundaries are folded in, so `[ab, c]` and `[a, bc]` hash
/// differently.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamHasher {
    hash: u64,
    entries: u64,
}

impl Default for StreamHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamHasher {
    /// A hasher that has seen nothing.
    pub fn new() -> Self {
        Self {
            hash: FNV_OFFSET,
            entries: 0,
        }
    }

    /// Fold in one already-encoded entry.
    pub fn update_encoded(&mut self, line: &[u8]) {
        self.hash = fnv1a_bytes(self.hash, &(line.len() as u64).to_le_bytes());
        self.hash = fnv1a_bytes(self.hash, line);
        self.entries += 1;
    }

    /// Fold in one entry.
    ///
    /// # Errors
    ///
    /// [`ReplayError::Json`] if the entry cannot be encoded.
    pub fn update(&mut self, entry: &ChangeEntry) -> Result<(), ReplayError> {
        let line = serde_json::to_vec(entry)?;
        self.update_encoded(&line);
        Ok(())
    }

    /// Hash of everything seen so far.
    pub fn finish(&self) -> u64 {
        self.hash
    }

    /// Number of entries seen.
    pub fn entries(&self) -> u64 {
        self.entries
    }
}

/// Hash of a single entry.
///
/// # Errors
///
/// [`ReplayError::Json`] if the entry cannot be encoded.
pub fn entry_hash(entry: &ChangeEntry) -> Result<u64, ReplayError> {
    let mut hasher = StreamHasher::new();
    hasher.update(entry)?;
    Ok(hasher.finish())
}

/// Hash of a whole stream, in order.
///
/// Returns `FNV_OFFSET` for an empty stream.
///
/// # Errors
///
/// [`ReplayError::Json`] if an entry cannot be encoded.
pub fn stream_hash<'a>(
    entries: impl IntoIterator<Item = &'a ChangeEntry>,
) -> Result<u64, ReplayError> {
    let mut hasher = StreamHasher::new();
    for entry in entries {
        hasher.update(entry)?;
    }
    Ok(hasher.finish())
}

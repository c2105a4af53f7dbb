//! Change log recording.
//!
//! [`ReplayWriter`] streams entries to any `Write` sink as JSON lines.
//! The header line is written immediately on construction.

use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};

use railsim_core::{ChangeEntry, ChangeSink};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ReplayError;
use crate::hash::StreamHasher;
use crate::{FORMAT_VERSION, MAGIC};

/// First line of every replay log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayHeader {
    /// Always [`MAGIC`].
    pub magic: String,
    /// Format version of the entries that follow.
    pub version: u8,
}

impl ReplayHeader {
    /// Header of the current format.
    pub fn current() -> Self {
        Self {
            magic: MAGIC.to_string(),
            version: FORMAT_VERSION,
        }
    }
}

/// Writes published changes to a byte stream.
///
/// Generic over `W: Write` so tests can use `Vec<u8>` and production
/// code can use `BufWriter<File>`.
///
/// # Examples
///
/// ```
/// use railsim_core::{Change, ChangeEntry, ChangeSeq, StopReachedChange, TrainId};
/// use railsim_replay::{ReplayReader, ReplayWriter};
///
/// let entry = ChangeEntry {
///     seq: ChangeSeq(0),
///     time: 12.5,
///     change: Change::StopReached(StopReachedChange {
///         train: TrainId(0),
///         stop_index: 0,
///         position: 900.0,
///     }),
/// };
///
/// let mut writer = ReplayWriter::new(Vec::new()).unwrap();
/// writer.write_entry(&entry).unwrap();
/// assert_eq!(writer.entries_written(), 1);
/// let buf = writer.into_inner();
///
/// let mut reader = ReplayReader::open(buf.as_slice()).unwrap();
/// assert_eq!(reader.next_entry().unwrap(), Some(entry));
/// assert!(reader.next_entry().unwrap().is_none());
/// ```
#[derive(Debug)]
pub struct ReplayWriter<W: Write> {
    writer: W,
    hasher: StreamHasher,
}

impl<W: Write> ReplayWriter<W> {
    /// Create a writer, immediately writing the header line.
    ///
    /// # Errors
    ///
    /// [`ReplayError::Io`] or [`ReplayError::Json`] if the header cannot
    /// be written.
    pub fn new(mut writer: W) -> Result<Self, ReplayError> {
        serde_json::to_writer(&mut writer, &ReplayHeader::current())?;
        writer.write_all(b"\n")?;
        Ok(Self {
            writer,
            hasher: StreamHasher::new(),
        })
    }

    /// Append one published entry.
    ///
    /// # Errors
    ///
    /// [`ReplayError::Io`] or [`ReplayError::Json`] on failure; the
    /// stream is then truncated mid-line and should be discarded.
    pub fn write_entry(&mut self, entry: &ChangeEntry) -> Result<(), ReplayError> {
        let line = serde_json::to_vec(entry)?;
        self.writer.write_all(&line)?;
        self.writer.write_all(b"\n")?;
        self.hasher.update_encoded(&line);
        Ok(())
    }

    /// Flush the underlying writer.
    ///
    /// # Errors
    ///
    /// [`ReplayError::Io`] from the underlying writer.
    pub fn flush(&mut self) -> Result<(), ReplayError> {
        self.writer.flush()?;
        Ok(())
    }

    /// Number of entries written so far.
    pub fn entries_written(&self) -> u64 {
        self.hasher.entries()
    }

    /// Hash of the entries written so far.
    pub fn stream_hash(&self) -> u64 {
        self.hasher.finish()
    }

    /// The underlying `Write` sink.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Consume the writer and return the underlying `Write` sink.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[derive(Debug)]
struct SinkState<W: Write> {
    writer: ReplayWriter<W>,
    error: Option<ReplayError>,
}

/// A [`ChangeSink`] recording every published change through a shared
/// [`ReplayWriter`].
///
/// The simulation owns one clone; the caller keeps another to read the
/// result. Sinks cannot fail, so the first write error is kept, later
/// entries are dropped, and the error is reported by
/// [`finish`](Self::finish).
#[derive(Debug)]
pub struct ReplaySink<W: Write> {
    inner: Arc<Mutex<SinkState<W>>>,
}

impl<W: Write> Clone for ReplaySink<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W: Write> ReplaySink<W> {
    /// Wrap a writer.
    pub fn new(writer: ReplayWriter<W>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SinkState {
                writer,
                error: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SinkState<W>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `f` on the wrapped writer.
    pub fn with_writer<T>(&self, f: impl FnOnce(&mut ReplayWriter<W>) -> T) -> T {
        f(&mut self.lock().writer)
    }

    /// Flush and return `(entries written, stream hash)`.
    ///
    /// # Errors
    ///
    /// The first error met while recording, or the flush error.
    pub fn finish(&self) -> Result<(u64, u64), ReplayError> {
        let mut state = self.lock();
        if let Some(e) = state.error.take() {
            return Err(e);
        }
        state.writer.flush()?;
        Ok((state.writer.entries_written(), state.writer.stream_hash()))
    }
}

impl<W: Write + Send> ChangeSink for ReplaySink<W> {
    fn change_published(&mut self, entry: &ChangeEntry) {
        let mut state = self.lock();
        if state.error.is_some() {
            return;
        }
        if let Err(e) = state.writer.write_entry(entry) {
            warn!(seq = entry.seq.0, error = %e, "replay recording failed");
            state.error = Some(e);
        }
    }
}

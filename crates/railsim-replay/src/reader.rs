//! Change log playback.
//!
//! [`ReplayReader`] reads entries from any `BufRead` source. The header
//! line is validated on construction.

use std::io::BufRead;

use railsim_core::ChangeEntry;

use crate::error::ReplayError;
use crate::writer::ReplayHeader;
use crate::{FORMAT_VERSION, MAGIC};

/// Reads a replay log line by line.
///
/// Generic over `R: BufRead` so tests can use `&[u8]` and production
/// code can use `BufReader<File>`. Blank lines are skipped.
#[derive(Debug)]
pub struct ReplayReader<R: BufRead> {
    reader: R,
    header: ReplayHeader,
    line: String,
    entries_read: u64,
}

impl<R: BufRead> ReplayReader<R> {
    /// Open a log, reading and validating the header line.
    ///
    /// # Errors
    ///
    /// [`ReplayError::InvalidHeader`] for a missing or foreign header,
    /// [`ReplayError::UnsupportedVersion`] for a newer format.
    pub fn open(mut reader: R) -> Result<Self, ReplayError> {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Err(ReplayError::InvalidHeader {
                detail: "empty stream".into(),
            });
        }
        let header: ReplayHeader =
            serde_json::from_str(line.trim_end()).map_err(|e| ReplayError::InvalidHeader {
                detail: e.to_string(),
            })?;
        if header.magic != MAGIC {
            return Err(ReplayError::InvalidHeader {
                detail: format!("magic {:?}", header.magic),
            });
        }
        if header.version != FORMAT_VERSION {
            return Err(ReplayError::UnsupportedVersion {
                found: header.version,
            });
        }
        line.clear();
        Ok(Self {
            reader,
            header,
            line,
            entries_read: 0,
        })
    }

    /// The validated header.
    pub fn header(&self) -> &ReplayHeader {
        &self.header
    }

    /// Read the next entry, or `None` at the end of the stream.
    ///
    /// # Errors
    ///
    /// [`ReplayError::Io`] or, for a truncated or corrupt line,
    /// [`ReplayError::Json`].
    pub fn next_entry(&mut self) -> Result<Option<ChangeEntry>, ReplayError> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }
            let text = self.line.trim();
            if text.is_empty() {
                continue;
            }
            let entry = serde_json::from_str(text)?;
            self.entries_read += 1;
            return Ok(Some(entry));
        }
    }

    /// Number of entries read so far.
    pub fn entries_read(&self) -> u64 {
        self.entries_read
    }

    /// Read every remaining entry.
    ///
    /// # Errors
    ///
    /// See [`next_entry`](Self::next_entry).
    pub fn read_all(mut self) -> Result<Vec<ChangeEntry>, ReplayError> {
        let mut entries = Vec::new();
        while let Some(entry) = self.next_entry()? {
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Convert into an entry iterator.
    pub fn entries(self) -> EntryIter<R> {
        EntryIter {
            reader: self,
            done: false,
        }
    }
}

/// Iterator adapter over replay entries.
///
/// Stops after the first error.
#[derive(Debug)]
pub struct EntryIter<R: BufRead> {
    reader: ReplayReader<R>,
    done: bool,
}

impl<R: BufRead> Iterator for EntryIter<R> {
    type Item = Result<ChangeEntry, ReplayError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

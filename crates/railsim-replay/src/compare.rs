//! Change stream comparison.
//!
//! Hash-first comparison (fast path) with an entry-by-entry fallback on
//! mismatch to locate the first divergence.

use std::io::BufRead;

use railsim_core::ChangeEntry;

use crate::error::ReplayError;
use crate::hash::stream_hash;
use crate::reader::ReplayReader;

/// How two streams differ at the first divergent position.
#[derive(Clone, Debug, PartialEq)]
pub enum DivergenceKind {
    /// Both streams have an entry here, and they differ.
    Mismatch {
        /// Entry of the recorded stream.
        recorded: Box<ChangeEntry>,
        /// Entry of the replayed stream.
        replayed: Box<ChangeEntry>,
    },
    /// The replayed stream ended early.
    Missing {
        /// First recorded entry without counterpart.
        recorded: Box<ChangeEntry>,
    },
    /// The replayed stream has more entries.
    Extra {
        /// First replayed entry without counterpart.
        replayed: Box<ChangeEntry>,
    },
}

/// The first point at which two change streams disagree.
#[derive(Clone, Debug, PartialEq)]
pub struct DivergenceReport {
    /// Sequence number of the first divergent entry, as recorded in
    /// whichever stream has it.
    pub seq: u64,
    /// What differs there.
    pub kind: DivergenceKind,
}

impl DivergenceReport {
    fn into_error(self) -> ReplayError {
        let detail = match &self.kind {
            DivergenceKind::Mismatch { recorded, replayed } => format!(
                "recorded {:?} at t={}, replayed {:?} at t={}",
                recorded.change.kind(),
                recorded.time,
                replayed.change.kind(),
                replayed.time
            ),
            DivergenceKind::Missing { recorded } => {
                format!("replay ended before {:?}", recorded.change.kind())
            }
            DivergenceKind::Extra { replayed } => {
                format!("unexpected {:?} after the recorded end", replayed.change.kind())
            }
        };
        ReplayError::Divergence {
            seq: self.seq,
            detail,
        }
    }
}

/// Compare two change streams.
///
/// Returns `Ok(None)` when they are identical, or the first divergence.
/// Entries compare by their encoded form, so `-0.0` and `0.0` differ
/// and a `NaN` equals itself.
///
/// # Errors
///
/// [`ReplayError::Json`] if an entry cannot be encoded.
pub fn compare_logs(
    recorded: &[ChangeEntry],
    replayed: &[ChangeEntry],
) -> Result<Option<DivergenceReport>, ReplayError> {
    if recorded.len() == replayed.len() && stream_hash(recorded)? == stream_hash(replayed)? {
        return Ok(None);
    }
    for (rec, rep) in recorded.iter().zip(replayed) {
        if serde_json::to_vec(rec)? != serde_json::to_vec(rep)? {
            return Ok(Some(DivergenceReport {
                seq: rec.seq.0,
                kind: DivergenceKind::Mismatch {
                    recorded: Box::new(rec.clone()),
                    replayed: Box::new(rep.clone()),
                },
            }));
        }
    }
    let common = recorded.len().min(replayed.len());
    let report = match (recorded.get(common), replayed.get(common)) {
        (Some(rec), None) => DivergenceReport {
            seq: rec.seq.0,
            kind: DivergenceKind::Missing {
                recorded: Box::new(rec.clone()),
            },
        },
        (None, Some(rep)) => DivergenceReport {
            seq: rep.seq.0,
            kind: DivergenceKind::Extra {
                replayed: Box::new(rep.clone()),
            },
        },
        // equal length and entries, hash collision aside
        _ => return Ok(None),
    };
    Ok(Some(report))
}

/// Check a freshly produced stream against a recorded log.
///
/// # Errors
///
/// [`ReplayError::Divergence`] at the first difference, or the read
/// error of the log.
pub fn verify_stream<R: BufRead>(
    reader: ReplayReader<R>,
    replayed: &[ChangeEntry],
) -> Result<(), ReplayError> {
    let recorded = reader.read_all()?;
    match compare_logs(&recorded, replayed)? {
        None => Ok(()),
        Some(report) => Err(report.into_error()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use railsim_core::{
        Change, ChangeSeq, RouteId, RouteStatus, RouteStatusChange, TrainId,
    };

    fn entry(seq: u64, train: u32) -> ChangeEntry {
        ChangeEntry {
            seq: ChangeSeq(seq),
            time: 1.0,
            change: Change::RouteStatus(RouteStatusChange {
                route: RouteId(0),
                from: RouteStatus::Free,
                to: RouteStatus::Reserved,
                train: Some(TrainId(train)),
            }),
        }
    }

    fn stream(trains: &[u32]) -> Vec<ChangeEntry> {
        trains
            .iter()
            .enumerate()
            .map(|(i, t)| entry(i as u64, *t))
            .collect()
    }

    #[test]
    fn identical_streams_match() {
        assert_eq!(compare_logs(&stream(&[0, 1, 2]), &stream(&[0, 1, 2])).unwrap(), None);
    }

    #[test]
    fn first_mismatch_is_reported() {
        let report = compare_logs(&stream(&[0, 1, 2, 3]), &stream(&[0, 1, 7, 8]))
            .unwrap()
            .unwrap();
        assert_eq!(report.seq, 2);
        match report.kind {
            DivergenceKind::Mismatch { recorded, replayed } => {
                assert_eq!(recorded.change.train(), Some(TrainId(2)));
                assert_eq!(replayed.change.train(), Some(TrainId(7)));
            }
            other => panic!("expected Mismatch, got {other:?}"),
        }
    }

    #[test]
    fn short_replay_is_missing_entries() {
        let report = compare_logs(&stream(&[0, 1, 2]), &stream(&[0, 1]))
            .unwrap()
            .unwrap();
        assert_eq!(report.seq, 2);
        assert!(matches!(report.kind, DivergenceKind::Missing { .. }));
    }

    #[test]
    fn long_replay_has_extra_entries() {
        let report = compare_logs(&stream(&[0]), &stream(&[0, 1]))
            .unwrap()
            .unwrap();
        assert_eq!(report.seq, 1);
        assert!(matches!(report.kind, DivergenceKind::Extra { .. }));
    }

    #[test]
    fn verify_turns_divergence_into_error() {
        let mut writer = crate::writer::ReplayWriter::new(Vec::new()).unwrap();
        for e in stream(&[0, 1]) {
            writer.write_entry(&e).unwrap();
        }
        let buf = writer.into_inner();
        let reader = ReplayReader::open(buf.as_slice()).unwrap();
        assert!(verify_stream(reader, &stream(&[0, 1])).is_ok());

        let reader = ReplayReader::open(buf.as_slice()).unwrap();
        match verify_stream(reader, &stream(&[0, 5])) {
            Err(ReplayError::Divergence { seq, .. }) => assert_eq!(seq, 1),
            other => panic!("expected Divergence, got {other:?}"),
        }
    }
}

//! Change log recording and replay for railsim simulations.
//!
//! Records the published change stream of a run so it can be inspected,
//! compared against another run, or re-applied to rebuild state.
//!
//! # Architecture
//!
//! - [`ReplayWriter`] records entries to any `Write` sink
//! - [`ReplaySink`] plugs a writer into a running simulation
//! - [`ReplayReader`] plays entries back from any `BufRead` source
//! - [`compare_logs`] and [`verify_stream`] check determinism
//! - [`StateReplica`] rebuilds interlocking and train state from a log
//!
//! # Format
//!
//! JSON lines: a header object, then one [`ChangeEntry`] per line.
//!
//! ```text
//! {"magic":"RAILSIM","version":1}
//! {"seq":0,"time":0.0,"change":{...}}
//! {"seq":1,"time":0.0,"change":{...}}
//! ```
//!
//! [`ChangeEntry`]: railsim_core::ChangeEntry

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod compare;
pub mod error;
pub mod hash;
pub mod reader;
pub mod replica;
pub mod writer;

pub use compare::{compare_logs, verify_stream, DivergenceKind, DivergenceReport};
pub use error::ReplayError;
pub use hash::{entry_hash, stream_hash, StreamHasher};
pub use reader::{EntryIter, ReplayReader};
pub use replica::{StateReplica, TrainReplica};
pub use writer::{ReplayHeader, ReplaySink, ReplayWriter};

/// Magic string in the header line of every replay log.
pub const MAGIC: &str = "RAILSIM";

/// Current log format version.
pub const FORMAT_VERSION: u8 = 1;

//! Test fixtures for railsim development.
//!
//! Rolling stock, infrastructure, and schedule builders shared by the
//! integration tests and benches of the other crates, plus a
//! [`CollectingSink`] that records every change notification.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;
pub mod sink;

pub use fixtures::{
    fast_train, junction_infra, line_infra, schedule, slow_freight, FAST_TRAIN, SLOW_FREIGHT,
};
pub use sink::{Collected, CollectingSink};

//! Recorded beat stream schema
//!
//! Newline-delimited JSON records used to replay a captured sensor stream
//! through a monitoring session (CLI `analyze`, tests).

mod beat_record;

pub use beat_record::*;

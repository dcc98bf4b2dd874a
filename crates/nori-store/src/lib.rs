//! Single-file append-only record store.
//!
//! Implements the storage primitive beneath log segments:
//! - 8-byte big-endian length-prefixed framing
//! - Buffered sequential appends addressed by byte offset
//! - Flush-then-read consistency for positioned reads
//! - One mutex serializing every operation on a store
//! - Resume appending on files written by an earlier store

pub mod frame;
pub mod store;

pub use frame::{FrameError, LEN_WIDTH};
pub use store::{Store, StoreConfig, StoreError};

//! Durable queue of stories captured while the network was unavailable.
//!
//! The foreground writes records here after a failed direct submission; the
//! replay engine reads and deletes them. Each operation is a single SQLite
//! transaction, so the two sides need no further coordination.

pub mod payload;
pub mod store;
#[cfg(test)]
mod tests;

pub use payload::{DecodedPhoto, PayloadError};
pub use store::{generate_local_id, PendingSubmission, QueueStore};

pub use crate::db::StorageError;

//! Offline-resilient story submission.
//!
//! Stories that cannot be sent are kept in a durable SQLite queue and
//! replayed by a background sync daemon once a session token can be obtained
//! from the foreground. A caching proxy keeps the app shell and the story
//! list available while offline.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod notify;
pub mod queue;
pub mod relay;
pub mod state;
pub mod sync;

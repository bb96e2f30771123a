//! # parley-memory
//!
//! Persistent message store for Parley (SQLite-backed), plus the
//! answered-message set backends and the reply log.

pub mod answered;
pub mod audit;
pub mod store;

pub use answered::InMemoryAnswered;
pub use audit::ReplyLog;
pub use store::Store;

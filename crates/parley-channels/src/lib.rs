//! # parley-channels
//!
//! Chat transport adapters for Parley.

pub mod telegram;

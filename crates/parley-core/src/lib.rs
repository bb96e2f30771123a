//! # parley-core
//!
//! Core types, traits, configuration, and error handling for the Parley responder.

pub mod config;
pub mod error;
pub mod message;
pub mod prompt;
pub mod traits;

//! # parley-providers
//!
//! Generative-text provider implementations for Parley.

pub mod gemini;

pub use gemini::GeminiProvider;

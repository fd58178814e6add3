//! Common utilities for MCDF.
//!
//! This crate provides foundational types and utilities used across the MCDF crates:
//!
//! - [`ContentHash`] - Content-addressed file identifier (SHA-256, uppercase hex)
//! - [`stream`] - Bounded, exact-length stream copies
//! - [`DEFAULT_BUFFER_SIZE`] / [`clamp_buffer_size`] - Peak-memory bound for streaming I/O

mod error;
mod hash;

pub mod stream;

pub use error::{Error, Result};
pub use hash::ContentHash;

/// Largest buffer used for a single streaming read or write (4 MiB).
pub const DEFAULT_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// Clamp a caller-supplied buffer size into `1..=DEFAULT_BUFFER_SIZE`.
#[inline]
pub fn clamp_buffer_size(size: usize) -> usize {
    size.clamp(1, DEFAULT_BUFFER_SIZE)
}

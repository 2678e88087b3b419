//! # Error Types
//!
//! This module provides the error types used throughout the tsmux library.
//! It defines a central error type `TsMuxError` that encapsulates all
//! failure modes of the muxing pipeline.
//!
//! Scanning shortages (no complete frame in the loaded buffer while input
//! remains) are not errors: the stream reader recovers by refilling.
//! Everything surfaced through `TsMuxError` is fatal to the current run.

use thiserror::Error;

/// Primary error type for the tsmux library
#[derive(Error, Debug)]
pub enum TsMuxError {
    /// I/O errors reading elementary streams or writing segments and playlists
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors raised while parsing elementary-stream framing (NAL units, ADTS headers)
    #[error("parser error: {0}")]
    Parser(String),

    /// Errors for invalid or malformed data, including transport packet overflow
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Errors in muxer configuration
    #[error("config error: {0}")]
    Config(String),
}

/// A specialized Result type for tsmux operations.
///
/// ## Example
///
/// ```rust
/// use tsmux::error::{Result, TsMuxError};
///
/// fn check_packet(packet: &[u8]) -> Result<()> {
///     if packet.len() != 188 {
///         return Err(TsMuxError::InvalidData("short ts packet".to_string()));
///     }
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, TsMuxError>;

//! Common utilities shared by the codec and transport layers.
//!
//! - [`bits`] provides a big-endian bit reader used to pull the packed
//!   fields out of ADTS fixed headers.
//! - [`crc`] provides the MPEG-2 CRC32 that seals PSI sections.

/// Bitstream reading utilities
pub mod bits;

/// CRC calculation implementations
pub mod crc;

pub use bits::BitReader;
pub use crc::Crc32Mpeg2;

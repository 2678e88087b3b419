//! # tsmux - MPEG-TS/HLS muxer for pre-encoded elementary streams
//!
//! `tsmux` takes an H.264 video bitstream in Annex-B byte-stream format
//! and an AAC audio bitstream in ADTS framing and interleaves them into
//! segmented `.ts` files plus an HLS playlist indexing them. It never
//! touches picture or audio payloads: frames are located by scanning for
//! start codes and sync words, then sliced into fixed 188-byte transport
//! packets with the timing and header fields the MPEG-TS and HLS
//! specifications require.
//!
//! ## Pipeline
//!
//! 1. Per-stream refill buffers pull chunks from the input files.
//! 2. Frame scanners find NAL-unit / ADTS-frame boundaries.
//! 3. A per-packet scheduler picks PAT, PMT, video PES, or audio PES.
//! 4. The packet assembler emits exactly 188 bytes per slot, inserting
//!    adaptation fields (with PCR on keyframe group boundaries) and
//!    stuffing as needed.
//! 5. The segmenter rotates the output file on keyframe boundaries and
//!    appends `#EXTINF` entries to the playlist.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use tsmux::config::MuxerConfig;
//! use tsmux::format::ts::TsWriter;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> tsmux::Result<()> {
//!     let config = MuxerConfig::new("capture.h264", "capture.aac")
//!         .with_output_dir("out");
//!     TsWriter::open(config).await?.run().await
//! }
//! ```
//!
//! The pipeline is strictly sequential: one loop, one packet per
//! iteration, every write awaited in order. I/O failures and packet
//! overflow are fatal; scanning shortages recover by refilling.

/// Elementary-stream framing (H.264 Annex-B, AAC ADTS)
pub mod codec;

/// Muxer configuration
pub mod config;

/// Error types and utilities
pub mod error;

/// Transport stream and HLS output
pub mod format;

/// Bit and CRC helpers
pub mod utils;

pub use config::MuxerConfig;
pub use error::{Result, TsMuxError};
pub use format::ts::TsWriter;

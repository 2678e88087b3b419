//! # MPEG Transport Stream implementation
//!
//! Everything needed to fold two elementary streams into a sequence of
//! 188-byte TS packets:
//!
//! - **PSI**: PAT/PMT section generation with MPEG-2 CRC32
//! - **PES**: fixed-layout packetised-elementary-stream headers
//! - **Stream state**: refill buffers, frame extraction, 90 kHz clocks
//! - **Muxing**: the per-packet scheduler and packet assembler
//! - **HLS**: segment rotation and vod playlist generation

/// HLS segmentation and playlist generation
pub mod hls;

/// The TS writer: scheduler, adaptation fields, packet loop
pub mod muxer;

/// PES header generation
pub mod pes;

/// PAT/PMT table generation
pub mod psi;

/// Per-stream input state and frame extraction
pub mod stream;

/// Core TS types and constants
pub mod types;

pub use hls::{PlaylistWriter, Segmenter};
pub use muxer::TsWriter;
pub use psi::{Pat, Pmt};
pub use stream::{ElementaryStream, StreamKind};
pub use types::{
    TsHeader, TsPacketType, PID_ADTS, PID_H264, PID_PAT, PID_PMT, STREAM_TYPE_AAC_ADTS,
    STREAM_TYPE_H264, TS_PACKET_SIZE,
};

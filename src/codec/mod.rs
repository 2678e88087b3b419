//! Elementary-stream framing support.
//!
//! The muxer never decodes picture or audio data; these modules only find
//! frame boundaries in raw byte buffers and classify what they found.

/// AAC ADTS framing: sync-word scanning and fixed-header parsing
pub mod aac;

/// H.264 Annex-B framing: start-code scanning and NAL unit classification
pub mod h264;

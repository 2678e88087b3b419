//! Media container implementations.
//!
//! Only one container lives here: MPEG-2 Transport Stream with HLS
//! segmentation on top.

/// MPEG Transport Stream format implementation with HLS output
pub mod ts;

pub use self::ts::TsWriter;

//! AAC ADTS framing support.

mod scan;
mod types;

pub use scan::{find_adts_frame, AdtsScan};
pub use types::AdtsHeader;

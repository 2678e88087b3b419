//! H.264 Annex-B byte-stream handling.

mod scan;
mod types;

pub use scan::{find_nal_unit, start_code_origin, NalScan};
pub use types::{nalu_kind, NaluKind};

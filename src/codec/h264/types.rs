/// Classification of a NAL unit as the muxer cares about it.
///
/// The transport layer only needs to know where access units begin (SPS
/// or a non-IDR slice), where keyframe groups begin (SPS, since the
/// encoder emits SPS -> PPS -> IDR), and which units are plain parameter
/// or filler data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NaluKind {
    /// Coded slice of a non-IDR picture (nal_unit_type 1)
    Vcl,
    /// Coded slice of an IDR picture (nal_unit_type 5)
    Idr,
    /// Sequence parameter set (nal_unit_type 7)
    Sps,
    /// Picture parameter set (nal_unit_type 8)
    Pps,
    /// Access unit delimiter (nal_unit_type 9)
    Aud,
    /// Everything else (SEI, filler, end-of-sequence, ...)
    NonVcl,
}

impl NaluKind {
    /// Maps the low five bits of a NAL header byte.
    pub fn from_nal_type(value: u8) -> Self {
        match value & 0x1F {
            1 => NaluKind::Vcl,
            5 => NaluKind::Idr,
            7 => NaluKind::Sps,
            8 => NaluKind::Pps,
            9 => NaluKind::Aud,
            _ => NaluKind::NonVcl,
        }
    }

    /// True for the units that open a new access unit in this stream
    /// shape: an SPS (keyframe group follows) or a non-IDR slice.
    ///
    /// The video clock and the per-segment frame counter advance exactly
    /// on these units; PPS/IDR ride in the access unit their SPS opened.
    pub fn starts_access_unit(self) -> bool {
        matches!(self, NaluKind::Vcl | NaluKind::Sps)
    }
}

/// Reads the kind of the NAL unit at the start of `frame`.
///
/// `frame` must begin with a 3- or 4-byte Annex-B start code; returns
/// `None` when neither prefix is present.
pub fn nalu_kind(frame: &[u8]) -> Option<NaluKind> {
    if frame.len() >= 5 && frame[0] == 0 && frame[1] == 0 && frame[2] == 0 && frame[3] == 1 {
        Some(NaluKind::from_nal_type(frame[4]))
    } else if frame.len() >= 4 && frame[0] == 0 && frame[1] == 0 && frame[2] == 1 {
        Some(NaluKind::from_nal_type(frame[3]))
    } else {
        None
    }
}

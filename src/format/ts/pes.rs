//! Packetised Elementary Stream headers.
//!
//! Two fixed layouts are emitted. Video PES packets carry PTS and DTS
//! (19 bytes) and declare no length, which is permitted for video
//! elementary streams; audio PES packets carry a PTS only (14 bytes) and
//! must declare their length. The stream assumes baseline H.264, so DTS
//! always equals PTS.

use super::types::{PES_STREAM_ID_ADTS, PES_STREAM_ID_H264};
use crate::error::Result;
use bytes::{BufMut, BytesMut};

/// Packs a 33-bit timestamp into the five-byte PTS/DTS field. The value
/// splits into three groups of 3 + 15 + 15 bits; the first shares a byte
/// with the marker nibble, and every group is closed by a marker bit.
fn write_timestamp(buf: &mut BytesMut, marker: u8, ts: u64) {
    let high = (ts >> 30) as u8 & 0x07; // bits 32..30
    let mid = (ts >> 15) as u16 & 0x7FFF; // bits 29..15
    let low = ts as u16 & 0x7FFF; // bits 14..0

    buf.put_u8(marker | (high << 1) | 0x01);
    buf.put_u8((mid >> 7) as u8);
    buf.put_u8((((mid & 0x7F) as u8) << 1) | 0x01);
    buf.put_u8((low >> 7) as u8);
    buf.put_u8((((low & 0x7F) as u8) << 1) | 0x01);
}

/// Writes the 19-byte H.264 PES header.
pub fn write_video_pes_header(buf: &mut BytesMut, pts: u64, dts: u64) -> Result<()> {
    buf.put_slice(&[0x00, 0x00, 0x01]);
    buf.put_u8(PES_STREAM_ID_H264);
    buf.put_u16(0x0000); // unbounded
    buf.put_u8(0x80); // marker bits
    buf.put_u8(0xC0); // PTS_DTS_flags = 11
    buf.put_u8(0x0A); // header data length: PTS + DTS
    write_timestamp(buf, 0x30, pts);
    write_timestamp(buf, 0x10, dts);
    Ok(())
}

/// Writes the 14-byte ADTS PES header. `frame_len` is the full length of
/// the ADTS frame being wrapped; the PES length field covers it plus the
/// eight header bytes that follow the length field.
pub fn write_audio_pes_header(buf: &mut BytesMut, pts: u64, frame_len: usize) -> Result<()> {
    buf.put_slice(&[0x00, 0x00, 0x01]);
    buf.put_u8(PES_STREAM_ID_ADTS);
    buf.put_u16((frame_len + 8) as u16);
    buf.put_u8(0x80); // marker bits
    buf.put_u8(0x80); // PTS_DTS_flags = 10
    buf.put_u8(0x05); // header data length: PTS only
    write_timestamp(buf, 0x20, pts);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::types::{INITIAL_PTS, PES_ADTS_HEADER_SIZE, PES_H264_HEADER_SIZE};
    use super::*;
    use quickcheck_macros::quickcheck;

    fn read_timestamp(bytes: &[u8]) -> u64 {
        (((bytes[0] >> 1) & 0x07) as u64) << 30
            | (bytes[1] as u64) << 22
            | ((bytes[2] >> 1) as u64) << 15
            | (bytes[3] as u64) << 7
            | (bytes[4] >> 1) as u64
    }

    #[test]
    fn test_video_header_layout() {
        let mut buf = BytesMut::new();
        write_video_pes_header(&mut buf, INITIAL_PTS, INITIAL_PTS).unwrap();

        assert_eq!(buf.len(), PES_H264_HEADER_SIZE);
        assert_eq!(
            &buf[..9],
            &[0x00, 0x00, 0x01, 0x1B, 0x00, 0x00, 0x80, 0xC0, 0x0A]
        );
        // 126000 packed behind the '0011' and '0001' marker nibbles
        assert_eq!(&buf[9..14], &[0x31, 0x00, 0x07, 0xD8, 0x61]);
        assert_eq!(&buf[14..19], &[0x11, 0x00, 0x07, 0xD8, 0x61]);
    }

    #[test]
    fn test_audio_header_layout() {
        let mut buf = BytesMut::new();
        write_audio_pes_header(&mut buf, INITIAL_PTS, 263).unwrap();

        assert_eq!(buf.len(), PES_ADTS_HEADER_SIZE);
        assert_eq!(
            &buf[..9],
            &[0x00, 0x00, 0x01, 0xC0, 0x01, 0x0F, 0x80, 0x80, 0x05]
        );
        assert_eq!(&buf[9..14], &[0x21, 0x00, 0x07, 0xD8, 0x61]);
    }

    #[test]
    fn test_marker_bits_always_set() {
        let mut buf = BytesMut::new();
        write_timestamp(&mut buf, 0x20, 0);
        assert_eq!(buf[0] & 0x01, 0x01);
        assert_eq!(buf[2] & 0x01, 0x01);
        assert_eq!(buf[4] & 0x01, 0x01);
    }

    #[quickcheck]
    fn prop_timestamp_roundtrip(ts: u64) -> bool {
        let mut buf = BytesMut::new();
        write_timestamp(&mut buf, 0x20, ts);
        read_timestamp(&buf) == ts & 0x1_FFFF_FFFF
    }
}

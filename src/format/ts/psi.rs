//! Program Specific Information: PAT and PMT sections.
//!
//! Sections are built structurally and sealed with the MPEG-2 CRC32, then
//! wrapped into a single 188-byte packet (pointer field, section bytes,
//! `0xFF` fill). Both tables fit one packet by a wide margin.

use super::types::{TsHeader, PID_ADTS, PID_H264, PID_PAT, PID_PMT, TS_PACKET_SIZE};
use crate::error::Result;
use crate::utils::crc::Crc32Mpeg2;
use bytes::{BufMut, BytesMut};

/// Table id for the Program Association Table
pub const TABLE_ID_PAT: u8 = 0x00;
/// Table id for the Program Map Table
pub const TABLE_ID_PMT: u8 = 0x02;

/// One program declared by the PAT.
#[derive(Debug, Clone)]
pub struct PatEntry {
    /// Program number, never 0 here (0 would declare a network PID)
    pub program_number: u16,
    /// PID of the program's PMT
    pub program_map_pid: u16,
}

/// Program Association Table.
#[derive(Debug, Clone, Default)]
pub struct Pat {
    /// Declared programs
    pub entries: Vec<PatEntry>,
}

impl Pat {
    /// A PAT declaring one program whose PMT lives on `pmt_pid`.
    pub fn single_program(pmt_pid: u16) -> Self {
        Self {
            entries: vec![PatEntry {
                program_number: 1,
                program_map_pid: pmt_pid,
            }],
        }
    }

    fn write_body(&self, buf: &mut BytesMut) {
        for entry in &self.entries {
            buf.put_u16(entry.program_number);
            buf.put_u16(entry.program_map_pid & 0x1fff | 7 << 13);
        }
    }
}

/// A descriptor attached to an elementary stream in the PMT.
#[derive(Debug, Clone)]
pub struct Descriptor {
    /// Descriptor tag
    pub tag: u8,
    /// Raw descriptor payload
    pub data: Vec<u8>,
}

impl Descriptor {
    /// ISO 639 language descriptor (tag 0x0A), audio type 0.
    pub fn language(code: &[u8; 3]) -> Self {
        let mut data = code.to_vec();
        data.push(0x00);
        Self { tag: 0x0A, data }
    }
}

/// One elementary stream declared by the PMT.
#[derive(Debug, Clone)]
pub struct EsInfo {
    /// Stream type (0x1b H.264, 0x0f ADTS AAC)
    pub stream_type: u8,
    /// PID carrying the stream
    pub elementary_pid: u16,
    /// Stream descriptors
    pub descriptors: Vec<Descriptor>,
}

/// Program Map Table.
#[derive(Debug, Clone, Default)]
pub struct Pmt {
    /// PID carrying the program clock reference
    pub pcr_pid: u16,
    /// Declared elementary streams
    pub streams: Vec<EsInfo>,
}

impl Pmt {
    /// The fixed program shape of this muxer: H.264 on PID 256 (also the
    /// PCR PID) and ADTS AAC on PID 257 with an undetermined-language
    /// descriptor.
    pub fn audio_video() -> Self {
        Self {
            pcr_pid: PID_H264,
            streams: vec![
                EsInfo {
                    stream_type: super::types::STREAM_TYPE_H264,
                    elementary_pid: PID_H264,
                    descriptors: Vec::new(),
                },
                EsInfo {
                    stream_type: super::types::STREAM_TYPE_AAC_ADTS,
                    elementary_pid: PID_ADTS,
                    descriptors: vec![Descriptor::language(b"und")],
                },
            ],
        }
    }

    fn write_body(&self, buf: &mut BytesMut) {
        buf.put_u16(self.pcr_pid & 0x1fff | 7 << 13);
        buf.put_u16(0xf << 12); // no program descriptors

        for info in &self.streams {
            buf.put_u8(info.stream_type);
            buf.put_u16(info.elementary_pid & 0x1fff | 7 << 13);

            let es_desc_len = info
                .descriptors
                .iter()
                .map(|d| 2 + d.data.len())
                .sum::<usize>();
            buf.put_u16((es_desc_len as u16) & 0x3ff | 0xf << 12);

            for desc in &info.descriptors {
                buf.put_u8(desc.tag);
                buf.put_u8(desc.data.len() as u8);
                buf.put_slice(&desc.data);
            }
        }
    }
}

/// Wraps a table body into a complete section: long-form header, body,
/// CRC32 over everything from the table id on.
fn seal_section(table_id: u8, body: &[u8], crc: &Crc32Mpeg2) -> BytesMut {
    let section_length = 5 + body.len() + 4;
    let mut section = BytesMut::with_capacity(3 + section_length);

    section.put_u8(table_id);
    section.put_u8(0xB0 | ((section_length >> 8) as u8 & 0x03));
    section.put_u8(section_length as u8);
    section.put_u16(1); // table id extension: transport stream / program 1
    section.put_u8(0xC1); // version 0, current/next = 1
    section.put_u8(0); // section number
    section.put_u8(0); // last section number
    section.extend_from_slice(body);

    let checksum = crc.calculate(&section);
    section.put_u32(checksum);
    section
}

fn build_psi_packet(pid: u16, section: &[u8], cc: u8) -> Result<BytesMut> {
    let mut packet = BytesMut::with_capacity(TS_PACKET_SIZE);
    let header = TsHeader {
        pid,
        payload_unit_start: true,
        continuity_counter: cc,
        ..Default::default()
    };
    header.write_to(&mut packet)?;
    packet.put_u8(0); // pointer field
    packet.extend_from_slice(section);
    while packet.len() < TS_PACKET_SIZE {
        packet.put_u8(0xFF);
    }
    Ok(packet)
}

/// Builds the 188-byte PAT packet for the given continuity counter.
pub fn build_pat_packet(pat: &Pat, cc: u8, crc: &Crc32Mpeg2) -> Result<BytesMut> {
    let mut body = BytesMut::new();
    pat.write_body(&mut body);
    let section = seal_section(TABLE_ID_PAT, &body, crc);
    build_psi_packet(PID_PAT, &section, cc)
}

/// Builds the 188-byte PMT packet for the given continuity counter.
pub fn build_pmt_packet(pmt: &Pmt, cc: u8, crc: &Crc32Mpeg2) -> Result<BytesMut> {
    let mut body = BytesMut::new();
    pmt.write_body(&mut body);
    let section = seal_section(TABLE_ID_PMT, &body, crc);
    build_psi_packet(PID_PMT, &section, cc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pat_packet_bytes() {
        let pat = Pat::single_program(PID_PMT);
        let packet = build_pat_packet(&pat, 0, &Crc32Mpeg2::new()).unwrap();

        assert_eq!(packet.len(), TS_PACKET_SIZE);
        let expected: &[u8] = &[
            0x47, 0x40, 0x00, 0x10, // header
            0x00, // pointer
            0x00, 0xB0, 0x0D, 0x00, 0x01, 0xC1, 0x00, 0x00, // section header
            0x00, 0x01, 0xF0, 0x00, // program 1 -> PMT 0x1000
            0x2A, 0xB1, 0x04, 0xB2, // crc32
        ];
        assert_eq!(&packet[..expected.len()], expected);
        assert!(packet[expected.len()..].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_pmt_packet_bytes() {
        let pmt = Pmt::audio_video();
        let packet = build_pmt_packet(&pmt, 0, &Crc32Mpeg2::new()).unwrap();

        assert_eq!(packet.len(), TS_PACKET_SIZE);
        let expected: &[u8] = &[
            0x47, 0x50, 0x00, 0x10, // header
            0x00, // pointer
            0x02, 0xB0, 0x1D, 0x00, 0x01, 0xC1, 0x00, 0x00, // section header
            0xE1, 0x00, 0xF0, 0x00, // pcr pid 256, no program descriptors
            0x1B, 0xE1, 0x00, 0xF0, 0x00, // H.264 on 256
            0x0F, 0xE1, 0x01, 0xF0, 0x06, // ADTS on 257, 6 descriptor bytes
            0x0A, 0x04, 0x75, 0x6E, 0x64, 0x00, // language "und"
            0x08, 0x7D, 0xE8, 0x77, // crc32
        ];
        assert_eq!(&packet[..expected.len()], expected);
        assert!(packet[expected.len()..].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_continuity_counter_lands_in_header() {
        let pat = Pat::single_program(PID_PMT);
        let crc = Crc32Mpeg2::new();
        for cc in 0u8..16 {
            let packet = build_pat_packet(&pat, cc, &crc).unwrap();
            assert_eq!(packet[3], 0x10 | cc);
        }
    }
}

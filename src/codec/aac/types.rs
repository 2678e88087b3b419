use crate::error::{Result, TsMuxError};
use crate::utils::BitReader;

/// Fixed part of an ADTS frame header.
///
/// Seven bytes when `protection_absent` is set, which is the only shape
/// this muxer accepts (sync word `FFF` + MPEG-4 + layer 00 + no CRC).
#[derive(Debug, Clone)]
pub struct AdtsHeader {
    /// 12-bit sync word, `0xFFF`
    pub sync_word: u16,
    /// MPEG version bit: 0 = MPEG-4, 1 = MPEG-2
    pub id: u8,
    /// Layer, always 00
    pub layer: u8,
    /// True when no CRC follows the fixed header
    pub protection_absent: bool,
    /// Audio object type minus one (1 = AAC-LC)
    pub profile: u8,
    /// Sampling frequency table index
    pub sample_rate_index: u8,
    /// Private stream bit
    pub private_bit: bool,
    /// Channel configuration
    pub channel_configuration: u8,
    /// Originality flag
    pub original_copy: bool,
    /// Home usage flag
    pub home: bool,
    /// Frame length in bytes, header included (13 bits over bytes 3..5)
    pub frame_length: u16,
    /// Buffer fullness, `0x7FF` for variable bitrate
    pub buffer_fullness: u16,
    /// Number of raw data blocks in the frame, minus one
    pub number_of_raw_blocks: u8,
}

impl AdtsHeader {
    /// Parses the fixed header at the start of `data`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 7 {
            return Err(TsMuxError::Parser("adts header too short".into()));
        }

        let mut reader = BitReader::new(data);

        let sync_word = reader.read_bits(12)? as u16;
        if sync_word != 0xFFF {
            return Err(TsMuxError::Parser("invalid adts sync word".into()));
        }

        let id = reader.read_bits(1)? as u8;
        let layer = reader.read_bits(2)? as u8;
        let protection_absent = reader.read_flag()?;
        let profile = reader.read_bits(2)? as u8;
        let sample_rate_index = reader.read_bits(4)? as u8;
        let private_bit = reader.read_flag()?;
        let channel_configuration = reader.read_bits(3)? as u8;
        let original_copy = reader.read_flag()?;
        let home = reader.read_flag()?;
        reader.read_bits(2)?; // copyright id bit + start
        let frame_length = reader.read_bits(13)? as u16;
        let buffer_fullness = reader.read_bits(11)? as u16;
        let number_of_raw_blocks = reader.read_bits(2)? as u8;

        Ok(Self {
            sync_word,
            id,
            layer,
            protection_absent,
            profile,
            sample_rate_index,
            private_bit,
            channel_configuration,
            original_copy,
            home,
            frame_length,
            buffer_fullness,
            number_of_raw_blocks,
        })
    }

    /// Raw data blocks carried by the frame (the header stores the count
    /// minus one). Each block is 1024 PCM samples after decode, so the
    /// presentation clock advances once per block.
    pub fn raw_data_blocks(&self) -> u8 {
        self.number_of_raw_blocks + 1
    }

    /// Sampling rate in Hz, `None` for reserved table indices.
    pub fn sample_rate(&self) -> Option<u32> {
        match self.sample_rate_index {
            0 => Some(96000),
            1 => Some(88200),
            2 => Some(64000),
            3 => Some(48000),
            4 => Some(44100),
            5 => Some(32000),
            6 => Some(24000),
            7 => Some(22050),
            8 => Some(16000),
            9 => Some(12000),
            10 => Some(11025),
            11 => Some(8000),
            12 => Some(7350),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // AAC-LC, 48 kHz, stereo, frame_length = 263, one raw data block
    const HEADER: [u8; 7] = [0xFF, 0xF1, 0x4C, 0x80, 0x20, 0xFF, 0xFC];

    #[test]
    fn test_parse_fixed_header() {
        let header = AdtsHeader::parse(&HEADER).unwrap();
        assert_eq!(header.sync_word, 0xFFF);
        assert_eq!(header.id, 0);
        assert_eq!(header.layer, 0);
        assert!(header.protection_absent);
        assert_eq!(header.profile, 1);
        assert_eq!(header.sample_rate_index, 3);
        assert_eq!(header.sample_rate(), Some(48000));
        assert_eq!(header.channel_configuration, 2);
        assert_eq!(header.frame_length, 263);
        assert_eq!(header.buffer_fullness, 0x7FF);
        assert_eq!(header.raw_data_blocks(), 1);
    }

    #[test]
    fn test_raw_block_count_from_low_bits() {
        let mut bytes = HEADER;
        bytes[6] = 0xFF; // number_of_raw_blocks = 3
        let header = AdtsHeader::parse(&bytes).unwrap();
        assert_eq!(header.raw_data_blocks(), 4);
    }

    #[test]
    fn test_rejects_bad_sync_word() {
        let bytes = [0x00, 0x00, 0x4C, 0x80, 0x20, 0xFF, 0xFC];
        assert!(AdtsHeader::parse(&bytes).is_err());
    }

    #[test]
    fn test_rejects_truncated_header() {
        assert!(AdtsHeader::parse(&HEADER[..6]).is_err());
    }
}

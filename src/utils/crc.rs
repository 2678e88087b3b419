/// CRC32 implementation for MPEG-2 TS PSI tables
/// Based on ITU-T H.222.0 / ISO/IEC 13818-1
/// Polynomial: x32 + x26 + x23 + x22 + x16 + x12 + x11 + x10 + x8 + x7 + x5 + x4 + x2 + x + 1
/// Initial value: 0xFFFFFFFF
const CRC32_MPEG2: u32 = 0x04C11DB7;

/// MPEG-2 CRC32 calculator used to seal PAT/PMT sections.
pub struct Crc32Mpeg2 {
    table: [u32; 256],
}

impl Crc32Mpeg2 {
    /// Creates a new calculator with a pre-computed lookup table.
    pub fn new() -> Self {
        let mut table = [0u32; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            let mut crc = (i as u32) << 24;
            for _ in 0..8 {
                crc = if (crc & 0x8000_0000) != 0 {
                    (crc << 1) ^ CRC32_MPEG2
                } else {
                    crc << 1
                };
            }
            *entry = crc;
        }
        Self { table }
    }

    /// Calculates the CRC32 checksum of `data`.
    pub fn calculate(&self, data: &[u8]) -> u32 {
        let mut crc = 0xFFFF_FFFF;
        for &byte in data {
            let index = ((crc >> 24) ^ (byte as u32)) & 0xFF;
            crc = (crc << 8) ^ self.table[index as usize];
        }
        crc
    }
}

impl Default for Crc32Mpeg2 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_mpeg2_test_vector() {
        let crc = Crc32Mpeg2::new();
        assert_eq!(crc.calculate(&[0x01, 0x01]), 0xD66F_B816);
    }

    #[test]
    fn test_crc32_of_single_program_pat_section() {
        let crc = Crc32Mpeg2::new();
        // one program, PMT on PID 0x1000
        let section = [
            0x00, 0xB0, 0x0D, 0x00, 0x01, 0xC1, 0x00, 0x00, 0x00, 0x01, 0xF0, 0x00,
        ];
        assert_eq!(crc.calculate(&section), 0x2AB1_04B2);
    }

    #[test]
    fn test_crc32_of_av_pmt_section() {
        let crc = Crc32Mpeg2::new();
        // H.264 on PID 256, ADTS AAC on PID 257 with an "und" language descriptor
        let section = [
            0x02, 0xB0, 0x1D, 0x00, 0x01, 0xC1, 0x00, 0x00, 0xE1, 0x00, 0xF0, 0x00, 0x1B, 0xE1,
            0x00, 0xF0, 0x00, 0x0F, 0xE1, 0x01, 0xF0, 0x06, 0x0A, 0x04, 0x75, 0x6E, 0x64, 0x00,
        ];
        assert_eq!(crc.calculate(&section), 0x087D_E877);
    }
}

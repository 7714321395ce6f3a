/// CRC32 as used by MPEG-2 PSI and SCTE-35 sections
/// (ITU-T H.222.0 Annex A / SCTE 35 section 9.9).
/// Polynomial 0x04C11DB7, initial value 0xFFFFFFFF, no reflection, no final XOR.
const CRC32_MPEG2: u32 = 0x04C11DB7;

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u32) << 24;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ CRC32_MPEG2
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

static TABLE: [u32; 256] = build_table();

/// MPEG-2 CRC32 calculator.
///
/// The cue pipeline never validates incoming CRCs; this is used to emit
/// well-formed sections from [`crate::scte35::SpliceSectionBuilder`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc32Mpeg2;

impl Crc32Mpeg2 {
    /// Calculates the CRC32 checksum for the given data.
    ///
    /// ```
    /// use cuemark::utils::Crc32Mpeg2;
    ///
    /// assert_eq!(Crc32Mpeg2::calculate(&[0x01, 0x01]), 0xD66FB816);
    /// ```
    pub fn calculate(data: &[u8]) -> u32 {
        data.iter().fold(0xFFFF_FFFF, |crc, &byte| {
            let index = ((crc >> 24) ^ byte as u32) & 0xFF;
            (crc << 8) ^ TABLE[index as usize]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    #[test]
    fn test_crc32_mpeg2_vector() {
        assert_eq!(Crc32Mpeg2::calculate(&[0x01, 0x01]), 0xD66FB816);
    }

    #[test]
    fn test_crc_of_real_section() {
        // time_signal from a production encoder
        let section = STANDARD.decode("/DAWAAAAAAAAAP/wBQb+Qjo1vQAAuwxz9A==").unwrap();
        let body = &section[..section.len() - 4];
        assert_eq!(Crc32Mpeg2::calculate(body), 0xBB0C73F4);
        // Running the CRC over the trailing checksum leaves a zero residue
        assert_eq!(Crc32Mpeg2::calculate(&section), 0);
    }
}

use crate::error::{CueError, Result};

/// A bit-level reader for SCTE-35 and PSI bitfields.
///
/// Fields are read most-significant bit first, the order used by every
/// MPEG-2 systems and SCTE-35 syntax table.
///
/// Example:
/// ```
/// use cuemark::utils::BitReader;
///
/// // table_id, section_syntax_indicator, private_indicator, reserved, section_length
/// let data = [0xFC, 0x30, 0x11];
/// let mut reader = BitReader::new(&data);
///
/// assert_eq!(reader.read_bits(8).unwrap(), 0xFC);
/// reader.skip_bits(4).unwrap();
/// assert_eq!(reader.read_bits(12).unwrap(), 0x011);
/// ```
pub struct BitReader<'a> {
    data: &'a [u8],
    byte_offset: usize,
    bit_offset: u8,
}

impl<'a> BitReader<'a> {
    /// Creates a new BitReader from a byte slice
    pub fn new(data: &'a [u8]) -> Self {
        BitReader {
            data,
            byte_offset: 0,
            bit_offset: 0,
        }
    }

    /// Reads a single bit from the stream.
    ///
    /// Returns error if end of data is reached.
    pub fn read_bit(&mut self) -> Result<bool> {
        if self.byte_offset >= self.data.len() {
            return Err(CueError::Parser("Reached end of data".into()));
        }

        let bit = (self.data[self.byte_offset] >> (7 - self.bit_offset)) & 1;
        self.bit_offset += 1;

        if self.bit_offset == 8 {
            self.bit_offset = 0;
            self.byte_offset += 1;
        }

        Ok(bit == 1)
    }

    /// Reads n bits (n <= 32) and returns them as a big-endian number.
    pub fn read_bits(&mut self, n: u32) -> Result<u32> {
        if n > 32 {
            return Err(CueError::Parser("Too many bits requested".into()));
        }
        Ok(self.read_bits_u64(n)? as u32)
    }

    /// Reads up to 64 bits. Used for 33-bit PTS fields.
    pub fn read_bits_u64(&mut self, n: u32) -> Result<u64> {
        if n > 64 {
            return Err(CueError::Parser("Too many bits requested".into()));
        }
        if (n as usize) > self.available_bits() {
            return Err(CueError::Parser("Reached end of data".into()));
        }

        let mut value = 0u64;
        for _ in 0..n {
            value = (value << 1) | self.read_bit()? as u64;
        }
        Ok(value)
    }

    /// Skips n bits in the stream.
    pub fn skip_bits(&mut self, n: u32) -> Result<()> {
        if (n as usize) > self.available_bits() {
            return Err(CueError::Parser("Reached end of data".into()));
        }
        let total = self.bit_offset as usize + n as usize;
        self.byte_offset += total / 8;
        self.bit_offset = (total % 8) as u8;
        Ok(())
    }

    /// Byte position of the reader; partial bytes count as consumed.
    pub fn position(&self) -> usize {
        self.byte_offset + usize::from(self.bit_offset != 0)
    }

    /// Returns number of bits available to read.
    pub fn available_bits(&self) -> usize {
        (self.data.len().saturating_sub(self.byte_offset)) * 8 - self.bit_offset as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_read_bits() {
        let data = [0b10110011];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(3).unwrap(), 0b101);
        assert_eq!(reader.read_bits(5).unwrap(), 0b10011);

        // Cross-byte boundary
        let data = [0b10110011, 0b01011010];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(3).unwrap(), 0b101);
        assert_eq!(reader.read_bits(8).unwrap(), 0b10011010);

        let data = [0b10101010];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(0).unwrap(), 0);

        let data = [0xFF; 8];
        let mut reader = BitReader::new(&data);
        assert!(reader.read_bits(33).is_err());
    }

    #[test]
    fn test_read_33_bit_pts() {
        // time_specified_flag=1, reserved=0x3F, pts_time=0x1_0000_0001
        let data = [0xFF, 0x00, 0x00, 0x00, 0x01];
        let mut reader = BitReader::new(&data);
        assert!(reader.read_bit().unwrap());
        reader.skip_bits(6).unwrap();
        assert_eq!(reader.read_bits_u64(33).unwrap(), 0x1_0000_0001);
        assert_eq!(reader.available_bits(), 0);
    }

    #[test]
    fn test_skip_and_position() {
        let data = [0xFF, 0x00, 0xAB];
        let mut reader = BitReader::new(&data);
        reader.skip_bits(3).unwrap();
        assert_eq!(reader.position(), 1);
        reader.skip_bits(5).unwrap();
        assert_eq!(reader.position(), 1);
        reader.skip_bits(8).unwrap();
        assert_eq!(reader.position(), 2);
        assert_eq!(reader.read_bits(8).unwrap(), 0xAB);
        assert!(reader.skip_bits(1).is_err());
    }

    #[test]
    fn test_error_cases() {
        let data = [0xFF];
        let mut reader = BitReader::new(&data);
        reader.read_bits(8).unwrap();
        assert!(reader.read_bit().is_err());

        let mut reader = BitReader::new(&data);
        assert!(reader.read_bits_u64(9).is_err());
        // A failed read does not consume anything
        assert_eq!(reader.read_bits(8).unwrap(), 0xFF);
    }

    #[quickcheck]
    fn prop_read_bits_matches_manual(data: Vec<u8>, n: u8) -> bool {
        let n = (n % 33) as usize;
        let mut reader = BitReader::new(&data);

        match reader.read_bits(n as u32) {
            Ok(result) => {
                let mut expected = 0u32;
                for i in 0..n {
                    let bit = (data[i / 8] >> (7 - (i % 8))) & 1;
                    expected = (expected << 1) | bit as u32;
                }
                result == expected
            }
            Err(_) => n > data.len() * 8,
        }
    }
}

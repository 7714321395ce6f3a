//! # Utility Functions and Types
//!
//! Bit-level reading for section headers and the MPEG-2 CRC32 used when
//! emitting SCTE-35 sections.
//!
//! ```rust
//! use cuemark::utils::BitReader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let data = vec![0b10110011u8];
//! let mut reader = BitReader::new(&data);
//! assert_eq!(reader.read_bits(3)?, 0b101);
//! # Ok(())
//! # }
//! ```

/// Bit manipulation and bitstream reading utilities
pub mod bits;

/// CRC calculation implementations
pub mod crc;

pub use bits::BitReader;
pub use crc::Crc32Mpeg2;

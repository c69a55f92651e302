//! IEC 60870-5-104 ASDU (Application Service Data Unit) fixed header.
//!
//! Decode-only views of the VSQ, cause of transmission, common address and
//! information object address fields. Field legality (COT ranges, CA zero,
//! IOA zero on commands) is deliberately not checked; the reconstruction
//! pipeline reports what the trace contains.

use crate::error::{Result, TraceError};
use crate::types::TypeId;

/// Variable Structure Qualifier (VSQ).
///
/// Defines the layout of information objects in an ASDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vsq {
    /// Number of information objects (0-127)
    pub count: u8,
    /// If true, addresses are sequential (SQ=1)
    pub sequence: bool,
}

impl Vsq {
    /// Create a new VSQ.
    #[inline]
    pub const fn new(count: u8, sequence: bool) -> Self {
        Self { count, sequence }
    }

    /// Parse VSQ from byte.
    #[inline]
    pub const fn from_u8(value: u8) -> Self {
        Self {
            count: value & 0x7F,
            sequence: (value & 0x80) != 0,
        }
    }

    /// Encode VSQ to byte.
    #[inline]
    pub const fn as_u8(&self) -> u8 {
        (self.count & 0x7F) | if self.sequence { 0x80 } else { 0 }
    }
}

/// Information Object Address (IOA).
///
/// 3-byte little-endian address identifying a specific data point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ioa(pub u32);

impl Ioa {
    /// Create IOA from u32 (lower 24 bits).
    #[inline]
    pub const fn new(value: u32) -> Self {
        Self(value & 0x00FF_FFFF)
    }

    /// Parse IOA from 3 bytes (little-endian).
    #[inline]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 3 {
            return Err(TraceError::short_static("IOA needs 3 bytes"));
        }
        let value = bytes[0] as u32 | ((bytes[1] as u32) << 8) | ((bytes[2] as u32) << 16);
        Ok(Self(value))
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for Ioa {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cause of Transmission (COT), carried raw.
///
/// Two bytes little-endian: cause in the low 6 bits of the first byte with
/// negative/test flags above it, originator address in the second byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Cot(pub u16);

impl Cot {
    /// Parse COT from 2 bytes (little-endian).
    #[inline]
    pub const fn from_le_bytes(lo: u8, hi: u8) -> Self {
        Self(lo as u16 | ((hi as u16) << 8))
    }

    /// Cause value (low 6 bits).
    #[inline]
    pub const fn cause(&self) -> u8 {
        (self.0 & 0x3F) as u8
    }

    /// Negative confirmation flag (bit 6 of the first byte).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        (self.0 & 0x40) != 0
    }

    /// Test flag (bit 7 of the first byte).
    #[inline]
    pub const fn is_test(&self) -> bool {
        (self.0 & 0x80) != 0
    }

    /// Originator address (second byte).
    #[inline]
    pub const fn originator(&self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// Raw 16-bit value.
    #[inline]
    pub const fn raw(&self) -> u16 {
        self.0
    }
}

impl std::fmt::Display for Cot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.cause())?;
        if self.is_test() {
            f.write_str("/test")?;
        }
        if self.is_negative() {
            f.write_str("/neg")?;
        }
        Ok(())
    }
}

/// ASDU fixed header (TypeID, VSQ, COT, CA).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsduHeader {
    /// Type identification
    pub type_id: TypeId,
    /// Variable structure qualifier
    pub vsq: Vsq,
    /// Cause of transmission (raw)
    pub cot: Cot,
    /// Common address of ASDU (station address)
    pub common_address: u16,
}

impl AsduHeader {
    /// Parse the 6-byte fixed header from the start of an ASDU view.
    ///
    /// Returns the header and the number of bytes consumed.
    pub fn parse(data: &[u8]) -> Result<(Self, usize)> {
        if data.len() < 6 {
            return Err(TraceError::short_static("ASDU header needs 6 bytes"));
        }

        let type_id = TypeId::from_u8(data[0])?;
        let vsq = Vsq::from_u8(data[1]);
        let cot = Cot::from_le_bytes(data[2], data[3]);
        let common_address = data[4] as u16 | ((data[5] as u16) << 8);

        Ok((
            Self {
                type_id,
                vsq,
                cot,
                common_address,
            },
            6,
        ))
    }
}

//! IEC 60870-5-104 Type Identification.
//!
//! Only the type identifications the payload dispatcher routes are modelled;
//! any other value is reported as unsupported and the surrounding APDU
//! decodes to an empty result list.

use crate::error::{Result, TraceError};

/// IEC 60870-5-104 Type Identification.
///
/// Defines the type of information contained in an ASDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeId {
    // ============================================
    // Process information in monitoring direction
    // ============================================
    /// Single-point information (M_SP_NA_1)
    SinglePoint = 1,

    /// Single-point information with time tag (M_SP_TA_1)
    SinglePointTime24 = 2,

    /// Double-point information (M_DP_NA_1)
    DoublePoint = 3,

    /// Double-point information with time tag (M_DP_TA_1)
    DoublePointTime24 = 4,

    /// Measured value, normalized (M_ME_NA_1)
    MeasuredNormalized = 9,

    /// Measured value, normalized with time tag (M_ME_TA_1)
    MeasuredNormalizedTime24 = 10,

    /// Measured value, scaled (M_ME_NB_1)
    MeasuredScaled = 11,

    /// Measured value, scaled with time tag (M_ME_TB_1)
    MeasuredScaledTime24 = 12,

    /// Measured value, short floating point (M_ME_NC_1)
    MeasuredFloat = 13,

    /// Measured value, short floating point with time tag (M_ME_TC_1)
    MeasuredFloatTime24 = 14,

    /// Packed single-point information with status change detection (M_PS_NA_1)
    PackedSinglePoint = 20,

    /// Measured value, normalized without quality descriptor (M_ME_ND_1)
    MeasuredNoQuality = 21,

    /// Single-point information with time tag CP56Time2a (M_SP_TB_1)
    SinglePointTime56 = 30,

    /// Double-point information with time tag CP56Time2a (M_DP_TB_1)
    DoublePointTime56 = 31,

    // ============================================
    // Process information in control direction
    // ============================================
    /// Single command (C_SC_NA_1)
    SingleCommand = 45,

    /// Double command (C_DC_NA_1)
    DoubleCommand = 46,

    /// Regulating step command (C_RC_NA_1)
    RegulatingStep = 47,

    /// Single command with time tag CP56Time2a (C_SC_TA_1)
    SingleCommandTime56 = 58,

    /// Double command with time tag CP56Time2a (C_DC_TA_1)
    DoubleCommandTime56 = 59,

    // ============================================
    // System information in control direction
    // ============================================
    /// Interrogation command (C_IC_NA_1)
    InterrogationCommand = 100,

    /// Counter interrogation command (C_CI_NA_1)
    CounterInterrogation = 101,

    /// Clock synchronization command (C_CS_NA_1)
    ClockSync = 103,
}

impl TypeId {
    /// Create TypeId from raw byte value.
    #[inline]
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::SinglePoint),
            2 => Ok(Self::SinglePointTime24),
            3 => Ok(Self::DoublePoint),
            4 => Ok(Self::DoublePointTime24),
            9 => Ok(Self::MeasuredNormalized),
            10 => Ok(Self::MeasuredNormalizedTime24),
            11 => Ok(Self::MeasuredScaled),
            12 => Ok(Self::MeasuredScaledTime24),
            13 => Ok(Self::MeasuredFloat),
            14 => Ok(Self::MeasuredFloatTime24),
            20 => Ok(Self::PackedSinglePoint),
            21 => Ok(Self::MeasuredNoQuality),
            30 => Ok(Self::SinglePointTime56),
            31 => Ok(Self::DoublePointTime56),
            45 => Ok(Self::SingleCommand),
            46 => Ok(Self::DoubleCommand),
            47 => Ok(Self::RegulatingStep),
            58 => Ok(Self::SingleCommandTime56),
            59 => Ok(Self::DoubleCommandTime56),
            100 => Ok(Self::InterrogationCommand),
            101 => Ok(Self::CounterInterrogation),
            103 => Ok(Self::ClockSync),
            _ => Err(TraceError::UnsupportedType(value)),
        }
    }

    /// Convert to raw byte value.
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Check if this type is in the monitoring direction (from RTU to master).
    #[inline]
    pub const fn is_monitoring(&self) -> bool {
        matches!(self.as_u8(), 1..=44)
    }

    /// Check if this type is in the control direction (from master to RTU).
    #[inline]
    pub const fn is_control(&self) -> bool {
        matches!(self.as_u8(), 45..=69 | 100..=107)
    }

    /// Get the IEC standard name (e.g., "M_SP_NA_1").
    #[inline]
    pub const fn standard_name(&self) -> &'static str {
        match self {
            Self::SinglePoint => "M_SP_NA_1",
            Self::SinglePointTime24 => "M_SP_TA_1",
            Self::DoublePoint => "M_DP_NA_1",
            Self::DoublePointTime24 => "M_DP_TA_1",
            Self::MeasuredNormalized => "M_ME_NA_1",
            Self::MeasuredNormalizedTime24 => "M_ME_TA_1",
            Self::MeasuredScaled => "M_ME_NB_1",
            Self::MeasuredScaledTime24 => "M_ME_TB_1",
            Self::MeasuredFloat => "M_ME_NC_1",
            Self::MeasuredFloatTime24 => "M_ME_TC_1",
            Self::PackedSinglePoint => "M_PS_NA_1",
            Self::MeasuredNoQuality => "M_ME_ND_1",
            Self::SinglePointTime56 => "M_SP_TB_1",
            Self::DoublePointTime56 => "M_DP_TB_1",
            Self::SingleCommand => "C_SC_NA_1",
            Self::DoubleCommand => "C_DC_NA_1",
            Self::RegulatingStep => "C_RC_NA_1",
            Self::SingleCommandTime56 => "C_SC_TA_1",
            Self::DoubleCommandTime56 => "C_DC_TA_1",
            Self::InterrogationCommand => "C_IC_NA_1",
            Self::CounterInterrogation => "C_CI_NA_1",
            Self::ClockSync => "C_CS_NA_1",
        }
    }
}

impl std::fmt::Display for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.standard_name())
    }
}

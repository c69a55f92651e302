//! Decoded protocol events.
//!
//! Every reconstructed APDU decodes into zero or more [`DecodedResult`]
//! values: point states, measurements, commands, interrogations, clock
//! sync, and link-layer supervisory/unnumbered frames.

use chrono::{DateTime, Utc};

use super::{Cot, LinkAction, LinkFunction, TypeId};

/// One decoded application-level event.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedResult {
    /// Type identification; `None` for S- and U-frames, which carry no ASDU
    pub type_id: Option<TypeId>,
    /// Common address of the ASDU (0 for S- and U-frames)
    pub common_address: u16,
    /// Information object address (0 for S- and U-frames)
    pub ioa: u32,
    /// Cause of transmission, raw
    pub cot: Cot,
    /// Reception timestamp handed to the decoder, if any
    pub timestamp: Option<DateTime<Utc>>,
    /// Decoded value
    pub value: ResultValue,
}

impl DecodedResult {
    /// Build a link-layer result (S- or U-frame); no ASDU header fields.
    #[inline]
    pub fn link(value: ResultValue, timestamp: Option<DateTime<Utc>>) -> Self {
        Self {
            type_id: None,
            common_address: 0,
            ioa: 0,
            cot: Cot::default(),
            timestamp,
            value,
        }
    }

    /// Check whether the carried value is flagged valid.
    ///
    /// Link-layer and command values have no quality bits and count as valid.
    #[inline]
    pub fn is_valid(&self) -> bool {
        match self.value {
            ResultValue::Status { valid, .. } => valid,
            ResultValue::Measurement { valid, .. } => valid,
            _ => true,
        }
    }
}

/// Decoded value variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultValue {
    /// Point status (single-point: 0/1, double-point: 0-3)
    Status {
        /// Point state
        state: u8,
        /// IV bit clear
        valid: bool,
    },

    /// Normalized, scaled or floating measurement
    Measurement {
        /// Measured value
        value: f64,
        /// IV bit clear
        valid: bool,
    },

    /// Control command (single: 0/1, double and step: 0-3)
    ControlCommand {
        /// Commanded state
        command_value: u8,
        /// Select (true) vs execute (false)
        is_select: bool,
    },

    /// Interrogation request
    Interrogation {
        /// Qualifier of interrogation
        qoi: u8,
    },

    /// Clock synchronization command
    TimeSync {
        /// Commanded wall clock, UTC
        sync_time: DateTime<Utc>,
    },

    /// Supervisory acknowledgment
    SFrame {
        /// 15-bit receive sequence number
        receive_seq: u16,
    },

    /// Unnumbered link control
    UFrame {
        /// STARTDT / STOPDT / TESTFR
        function: LinkFunction,
        /// Activation or confirmation
        action: LinkAction,
    },
}

impl ResultValue {
    /// Check if this is a link-layer (non-ASDU) value.
    #[inline]
    pub const fn is_link_layer(&self) -> bool {
        matches!(self, Self::SFrame { .. } | Self::UFrame { .. })
    }

    /// Numeric view of the value, where one exists.
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Status { state, .. } => Some(*state as f64),
            Self::Measurement { value, .. } => Some(*value),
            Self::ControlCommand { command_value, .. } => Some(*command_value as f64),
            _ => None,
        }
    }
}

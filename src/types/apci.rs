//! IEC 60870-5-104 APCI (Application Protocol Control Information).
//!
//! Classification of the 4-byte control field of a reassembled APDU into
//! I-, S- and U-frames. Reconstruction is decode-only; frames that fail
//! classification are reported as `Invalid` rather than rejected.

/// Start byte for IEC 104 frames.
pub const START_BYTE: u8 = 0x68;

/// Minimum reassembled APDU length (start byte + length + control field).
pub const MIN_APDU_LENGTH: usize = 6;

/// Link-layer function carried by a U-frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkFunction {
    /// Start data transfer (STARTDT)
    StartDt,
    /// Stop data transfer (STOPDT)
    StopDt,
    /// Test frame (TESTFR)
    TestDt,
}

/// Direction of a U-frame exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkAction {
    /// Activation request
    Activate,
    /// Confirmation reply
    Confirm,
}

impl std::fmt::Display for LinkFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::StartDt => "STARTDT",
            Self::StopDt => "STOPDT",
            Self::TestDt => "TESTFR",
        };
        f.write_str(name)
    }
}

impl std::fmt::Display for LinkAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Activate => "act",
            Self::Confirm => "con",
        };
        f.write_str(name)
    }
}

/// Map a U-frame control byte to its function and action.
///
/// Only the six exact values defined by the standard are recognised.
pub fn u_frame_from_control(byte: u8) -> Option<(LinkFunction, LinkAction)> {
    match byte {
        0x07 => Some((LinkFunction::StartDt, LinkAction::Activate)),
        0x0B => Some((LinkFunction::StartDt, LinkAction::Confirm)),
        0x13 => Some((LinkFunction::StopDt, LinkAction::Activate)),
        0x23 => Some((LinkFunction::StopDt, LinkAction::Confirm)),
        0x43 => Some((LinkFunction::TestDt, LinkAction::Activate)),
        0x83 => Some((LinkFunction::TestDt, LinkAction::Confirm)),
        _ => None,
    }
}

/// Classified APCI control field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameClass {
    /// Information transfer frame; the ASDU follows the control field.
    IFrame,
    /// Supervisory frame with a 15-bit receive sequence number.
    SFrame {
        /// Receive sequence number (0-32767)
        recv_seq: u16,
    },
    /// Unnumbered control frame.
    UFrame {
        /// Link-layer function
        function: LinkFunction,
        /// Activation or confirmation
        action: LinkAction,
    },
    /// A U-frame pattern with an unrecognised control byte.
    Invalid,
}

impl FrameClass {
    /// Classify a 4-byte control field by the two low bits of its first
    /// byte: `00`/`10` I-frame, `01` S-frame, `11` U-frame.
    pub fn classify(control: &[u8]) -> Self {
        if control.len() < 4 {
            return Self::Invalid;
        }

        let ctrl0 = control[0];
        if ctrl0 & 0x01 == 0 {
            Self::IFrame
        } else if ctrl0 & 0x03 == 0x01 {
            Self::SFrame {
                recv_seq: recv_seq_from_control(control[2], control[3]),
            }
        } else {
            match u_frame_from_control(ctrl0) {
                Some((function, action)) => Self::UFrame { function, action },
                None => Self::Invalid,
            }
        }
    }
}

/// Extract the 15-bit receive sequence number from control bytes 3 and 4.
#[inline]
pub fn recv_seq_from_control(ctrl2: u8, ctrl3: u8) -> u16 {
    ((ctrl2 as u16 | ((ctrl3 as u16) << 8)) >> 1) & 0x7FFF
}

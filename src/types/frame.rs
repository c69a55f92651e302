//! Reassembled power-protocol frames.

use bytes::Bytes;
use chrono::{DateTime, FixedOffset};

use super::PowerRecord;

/// One frame reconstructed from a start line and its continuation lines.
///
/// The assembler never rejects an under-length frame; consumers read
/// [`PowerFrame::is_complete`] to classify truncated captures.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerFrame {
    /// Transfer direction (`Sending` or `Received`)
    pub direction: String,
    /// Timestamp of the start record
    pub timestamp: DateTime<FixedOffset>,
    /// Frame length advertised by the start line, if any
    pub expected_length: Option<usize>,
    /// Assembled frame bytes in arrival order
    pub data: Bytes,
    /// The start record this frame was assembled from
    pub start: PowerRecord,
}

impl PowerFrame {
    /// Number of bytes actually assembled.
    #[inline]
    pub fn actual_length(&self) -> usize {
        self.data.len()
    }

    /// A frame is complete when no length was advertised, or at least
    /// that many bytes were assembled.
    #[inline]
    pub fn is_complete(&self) -> bool {
        match self.expected_length {
            Some(expected) => self.data.len() >= expected,
            None => true,
        }
    }
}

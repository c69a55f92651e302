//! Error types for trace log reconstruction.

use std::borrow::Cow;
use thiserror::Error;

/// Result type alias for trace log operations.
pub type Result<T> = std::result::Result<T, TraceError>;

/// Trace reconstruction error types.
///
/// Uses `Cow<'static, str>` to avoid allocations for static error messages.
#[derive(Debug, Error)]
pub enum TraceError {
    /// Log line lacks the expected tab structure or its timestamp is
    /// unparseable. Recovered locally by the line parsers.
    #[error("Invalid header: {0}")]
    HeaderInvalid(Cow<'static, str>),

    /// A protocol-specific field could not be located in the message tail.
    /// Recovered locally; the field keeps its default.
    #[error("Field missing: {0}")]
    FieldMissing(Cow<'static, str>),

    /// An APDU or information-element body is shorter than its declared
    /// structure requires.
    #[error("Payload too short: {0}")]
    PayloadTooShort(Cow<'static, str>),

    /// A decoder was invoked with a type identification outside its
    /// support set.
    #[error("Unsupported type ID: {0}")]
    UnsupportedType(u8),

    /// A decoded field value cannot be represented, e.g. a CP56Time2a
    /// byte pattern that forms no calendar date.
    #[error("Value out of range: {0}")]
    OutOfRange(Cow<'static, str>),

    /// I/O failure in the file-backed log buffer.
    #[error("Buffer I/O error: {0}")]
    BufferIo(#[from] std::io::Error),

    /// A persisted record could not be serialised or deserialised.
    #[error("Persist error: {0}")]
    Persist(#[from] serde_json::Error),
}

impl TraceError {
    /// Create a header error with a static message (zero allocation).
    #[inline]
    pub const fn header_static(msg: &'static str) -> Self {
        Self::HeaderInvalid(Cow::Borrowed(msg))
    }

    /// Create a header error with a dynamic message.
    #[inline]
    pub fn header(msg: impl Into<String>) -> Self {
        Self::HeaderInvalid(Cow::Owned(msg.into()))
    }

    /// Create a field-missing error with a static message (zero allocation).
    #[inline]
    pub const fn field_static(msg: &'static str) -> Self {
        Self::FieldMissing(Cow::Borrowed(msg))
    }

    /// Create a payload error with a static message (zero allocation).
    #[inline]
    pub const fn short_static(msg: &'static str) -> Self {
        Self::PayloadTooShort(Cow::Borrowed(msg))
    }

    /// Create a payload error with a dynamic message.
    #[inline]
    pub fn short(msg: impl Into<String>) -> Self {
        Self::PayloadTooShort(Cow::Owned(msg.into()))
    }

    /// Create an out-of-range error with a static message (zero allocation).
    #[inline]
    pub const fn range_static(msg: &'static str) -> Self {
        Self::OutOfRange(Cow::Borrowed(msg))
    }

    /// Check if this error is recovered inside the pipeline (never
    /// surfaced past the top-level parser or APDU decoder).
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::HeaderInvalid(_)
                | Self::FieldMissing(_)
                | Self::PayloadTooShort(_)
                | Self::UnsupportedType(_)
                | Self::OutOfRange(_)
        )
    }
}

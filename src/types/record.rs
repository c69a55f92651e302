//! Log record types.
//!
//! Every log line maps onto a [`LogRecord`] carrying the common tab-delimited
//! header, extended by a protocol-specific record for Modbus and IEC 104
//! trace lines. Records do not mutate after the line parsers build them.

use bytes::Bytes;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// Common header fields shared by every trace line.
///
/// Textual fields default to the empty string, never a null-like value;
/// only the payload may be absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogRecord {
    /// Line timestamp with UTC offset, millisecond precision
    pub timestamp: DateTime<FixedOffset>,
    /// Time-zone label as logged (e.g. `+08:00`)
    pub tz_label: String,
    /// Log level (e.g. `TRACE`)
    pub level: String,
    /// Emitting module (e.g. `CORE`)
    pub module: String,
    /// Thread id, hex with `0x` prefix or bracketed decimal
    pub thread_id: String,
    /// Source tag (e.g. `IOServer`)
    pub source: String,
    /// Function tag
    pub function: String,
    /// File name field
    pub file_name: String,
    /// File path field
    pub file_path: String,
    /// Source line number; 0 when missing
    pub source_line: i32,
    /// Message text after the header
    pub message: String,
    /// Raw payload bytes scanned from the tail, if any
    pub payload: Option<Bytes>,
}

impl Default for LogRecord {
    fn default() -> Self {
        Self {
            timestamp: DateTime::<Utc>::UNIX_EPOCH.fixed_offset(),
            tz_label: String::new(),
            level: String::new(),
            module: String::new(),
            thread_id: String::new(),
            source: String::new(),
            function: String::new(),
            file_name: String::new(),
            file_path: String::new(),
            source_line: 0,
            message: String::new(),
            payload: None,
        }
    }
}

impl LogRecord {
    /// Payload bytes, or an empty slice when absent.
    #[inline]
    pub fn payload_bytes(&self) -> &[u8] {
        self.payload.as_deref().unwrap_or(&[])
    }
}

/// A Modbus request-reply trace line.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModbusRecord {
    /// Common header fields
    #[serde(flatten)]
    pub header: LogRecord,
    /// Action token (`Request`, `Reply()`, `Raw Receive`, ...)
    pub action: String,
    /// Device control block tag (`DCB=...`), empty when absent
    pub dcb: String,
    /// Transaction id tag (`ID=...`, hex string), empty when absent
    pub transaction_id: String,
    /// Declared byte length, if the line carries one
    pub expected_length: Option<usize>,
}

/// An IEC 60870-5-104 trace line.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerRecord {
    /// Common header fields
    #[serde(flatten)]
    pub header: LogRecord,
    /// Channel index (`Channel (n)`), -1 when absent
    pub channel: i32,
    /// Protocol sequence number, -1 when absent
    pub sequence_number: i64,
    /// Delayed-ACK flag (`DelayACK:1`)
    pub delay_ack: bool,
    /// Action token (`Sending`, `Received`, or an engine operation)
    pub action: String,
    /// Declared frame length, if advertised in the tail
    pub expected_length: Option<usize>,
}

impl PowerRecord {
    /// A record opens a new frame when it advertises a direction and a
    /// positive expected length.
    #[inline]
    pub fn is_frame_start(&self) -> bool {
        (self.action == "Sending" || self.action == "Received")
            && self.expected_length.is_some_and(|len| len > 0)
    }

    /// A record with no action is a continuation candidate.
    #[inline]
    pub fn is_continuation(&self) -> bool {
        self.action.is_empty() && self.header.payload.as_ref().is_some_and(|p| !p.is_empty())
    }
}

/// One parsed log line, tagged by protocol.
///
/// The `$type` discriminator survives the persisted JSON-lines format;
/// unknown discriminators deserialise to the `Plain` shape without failing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "$type")]
pub enum LogEntry {
    /// Modbus trace line
    #[serde(rename = "ModbusLogEntry")]
    Modbus(ModbusRecord),
    /// IEC 104 trace line
    #[serde(rename = "PowerLogEntry")]
    Power(PowerRecord),
    /// A line matching neither protocol fingerprint
    #[serde(rename = "LogEntry")]
    Plain(LogRecord),
}

impl LogEntry {
    /// Common header of whichever variant this entry holds.
    #[inline]
    pub fn header(&self) -> &LogRecord {
        match self {
            Self::Modbus(rec) => &rec.header,
            Self::Power(rec) => &rec.header,
            Self::Plain(rec) => rec,
        }
    }

    /// The persisted `$type` discriminator for this variant.
    #[inline]
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Modbus(_) => "ModbusLogEntry",
            Self::Power(_) => "PowerLogEntry",
            Self::Plain(_) => "LogEntry",
        }
    }
}

impl<'de> Deserialize<'de> for LogEntry {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        let value = serde_json::Value::deserialize(deserializer)?;
        let tag = value.get("$type").and_then(|t| t.as_str()).unwrap_or("");
        match tag {
            "ModbusLogEntry" => ModbusRecord::deserialize(&value)
                .map(Self::Modbus)
                .map_err(D::Error::custom),
            "PowerLogEntry" => PowerRecord::deserialize(&value)
                .map(Self::Power)
                .map_err(D::Error::custom),
            // Unknown discriminators degrade to the base record shape.
            _ => LogRecord::deserialize(&value)
                .map(Self::Plain)
                .map_err(D::Error::custom),
        }
    }
}

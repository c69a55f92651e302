//! # voltage_tracelog
//!
//! Reconstruction of Modbus and IEC 60870-5-104 traffic from SCADA
//! gateway debug logs.
//!
//! Industrial gateways dump the frames they exchange as human-readable
//! trace lines: a fixed tab-delimited header followed by protocol fields
//! and hex dumps. This crate turns such text back into fully decoded
//! application-level events through a three-stage pipeline:
//!
//! 1. **Line parsing** - a selector fingerprints each raw line and routes
//!    it to the Modbus or IEC 104 extractor, which fills a typed record
//!    with zero-allocation span parsing over the line.
//! 2. **Frame assembly** - consecutive continuation lines carrying raw
//!    hex bytes are stitched into complete APDUs, honouring the advertised
//!    expected length and tolerating truncation.
//! 3. **APDU decoding** - each reassembled frame classifies as I/S/U;
//!    I-frame ASDUs dispatch by type identification to information-element
//!    decoders aware of the VSQ sequence layout.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use voltage_tracelog::{decode_apdu, parse_line, FrameAssembler, LogEntry};
//!
//! let records = log_text.lines().filter_map(|line| match parse_line(line) {
//!     LogEntry::Power(rec) => Some(rec),
//!     _ => None,
//! });
//!
//! for frame in FrameAssembler::new(records) {
//!     let received = frame.timestamp.to_utc();
//!     for event in decode_apdu(&frame.data, Some(received)) {
//!         println!("IOA {}: {:?}", event.ioa, event.value);
//!     }
//! }
//! ```
//!
//! ## Pipeline contract
//!
//! The text-to-result path never fails on trace content: a malformed line
//! yields a record with whatever fields could be recovered, and a
//! malformed APDU yields an empty result list. Each pipeline runs
//! single-threaded over its own records; the assembler is a sequential
//! state machine and must not observe reordered input.
//!
//! ## Frame format
//!
//! ```text
//! APCI (6 bytes):
//! +--------+--------+--------+--------+--------+--------+
//! | 0x68   | Length | Control Field (4 bytes)           |
//! +--------+--------+--------+--------+--------+--------+
//! ```
//!
//! I-frames append an ASDU (TypeID, VSQ, COT, CA, information objects);
//! multi-byte fields are little-endian and IOAs are 24-bit.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod assembler;
pub mod buffer;
pub mod decoder;
pub mod elements;
pub mod error;
pub mod header;
pub mod hex;
pub mod logline;
pub mod types;

// Re-export main types
pub use assembler::FrameAssembler;
pub use buffer::{create_buffer, BufferMode, FileLogBuffer, LogBuffer, MemoryLogBuffer};
pub use decoder::{decode_apdu, dispatch};
pub use error::{Result, TraceError};
pub use logline::{parse_line, parse_modbus_line, parse_power_line};
pub use types::*;

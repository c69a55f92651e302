//! Power frame reassembly.
//!
//! A transfer shows up in the trace as one start line (`Sending` /
//! `Received` with an advertised byte count) followed by continuation
//! lines whose tails are raw hex dumps. The assembler walks records in
//! log-arrival order and stitches continuations onto the open frame until
//! the advertised length is reached, a new start appears, or input ends.
//! Under-length frames are still emitted; consumers classify them through
//! [`PowerFrame::is_complete`].

use bytes::Bytes;
use chrono::Timelike;
use tracing::debug;

use crate::types::{PowerFrame, PowerRecord};

/// Streaming assembler over an ordered record sequence.
///
/// Lazily yields [`PowerFrame`]s as boundaries are detected. The caller
/// guarantees arrival order; the assembler is a sequential state machine
/// and must not observe reordered records.
#[derive(Debug)]
pub struct FrameAssembler<I> {
    records: I,
    open: Option<OpenFrame>,
}

/// Frame under assembly.
#[derive(Debug)]
struct OpenFrame {
    start: PowerRecord,
    buffer: Vec<u8>,
    /// Source line number the continuation rows must come from, bound on
    /// first sight.
    data_line: Option<i32>,
}

impl OpenFrame {
    fn new(start: PowerRecord) -> Self {
        let capacity = start.expected_length.unwrap_or(0);
        Self {
            start,
            buffer: Vec::with_capacity(capacity),
            data_line: None,
        }
    }

    /// A continuation is eligible when its coarse minute-of-hour matches
    /// the start line (the logs are second-precision and a frame may cross
    /// a sub-minute boundary) and it comes from the bound source line.
    fn accepts(&self, rec: &PowerRecord) -> bool {
        if rec.header.timestamp.minute() != self.start.header.timestamp.minute() {
            return false;
        }
        match self.data_line {
            Some(line) => line == rec.header.source_line,
            None => true,
        }
    }

    fn append(&mut self, rec: &PowerRecord) {
        if self.data_line.is_none() {
            self.data_line = Some(rec.header.source_line);
        }
        self.buffer.extend_from_slice(rec.header.payload_bytes());
    }

    fn is_filled(&self) -> bool {
        self.start
            .expected_length
            .is_some_and(|expected| self.buffer.len() >= expected)
    }

    fn into_frame(self) -> PowerFrame {
        PowerFrame {
            direction: self.start.action.clone(),
            timestamp: self.start.header.timestamp,
            expected_length: self.start.expected_length,
            data: Bytes::from(self.buffer),
            start: self.start,
        }
    }
}

impl<I> FrameAssembler<I>
where
    I: Iterator<Item = PowerRecord>,
{
    /// Create an assembler over an ordered record stream.
    pub fn new(records: impl IntoIterator<Item = PowerRecord, IntoIter = I>) -> Self {
        Self {
            records: records.into_iter(),
            open: None,
        }
    }
}

impl<I> Iterator for FrameAssembler<I>
where
    I: Iterator<Item = PowerRecord>,
{
    type Item = PowerFrame;

    fn next(&mut self) -> Option<PowerFrame> {
        loop {
            let Some(rec) = self.records.next() else {
                // Input exhausted: flush whatever is still open.
                return self.open.take().map(OpenFrame::into_frame);
            };

            if rec.is_frame_start() {
                let previous = self.open.take();
                if previous.is_some() {
                    debug!(
                        direction = %rec.action,
                        "new start while a frame was open, emitting under-length frame"
                    );
                }
                self.open = Some(OpenFrame::new(rec));
                if let Some(open) = previous {
                    return Some(open.into_frame());
                }
                continue;
            }

            // Data with no open frame is an orphan.
            let Some(open) = self.open.as_mut() else {
                continue;
            };

            if !rec.is_continuation() || !open.accepts(&rec) {
                continue;
            }

            open.append(&rec);
            if open.is_filled() {
                return self.open.take().map(OpenFrame::into_frame);
            }
        }
    }
}

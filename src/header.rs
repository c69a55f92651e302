//! Common log-line header extraction.
//!
//! Gateway trace lines share a fixed tab-delimited header of ten fields
//! followed by a protocol-dependent message tail. Extraction walks the line
//! once with borrowed subslices; nothing is allocated besides the owned
//! strings stored into the record.

use chrono::{FixedOffset, NaiveDateTime, Offset, Utc};
use tracing::debug;

use crate::error::{Result, TraceError};
use crate::types::LogRecord;

/// Number of tab-delimited header fields before the message tail.
const HEADER_FIELDS: usize = 10;

/// Timestamp layout of field 1 (naive; the offset comes from field 2).
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Extract the common header from one log line.
///
/// Fills the header fields of `rec` and returns the message tail view,
/// which downstream protocol extractors scan for their own fields. The
/// returned view borrows from `line` and keeps any interior tabs (the hex
/// dump sections that follow the message live in the same tail).
///
/// Fails with `HeaderInvalid` when the line has fewer than ten tab-separated
/// header fields or its timestamp does not parse; the record keeps whatever
/// was filled before the failure.
pub fn extract_header<'a>(line: &'a str, rec: &mut LogRecord) -> Result<&'a str> {
    let mut fields = line.splitn(HEADER_FIELDS + 1, '\t');

    let ts_text = fields
        .next()
        .ok_or_else(|| TraceError::header_static("empty line"))?;
    let tz_text = fields
        .next()
        .ok_or_else(|| TraceError::header_static("missing time-zone field"))?;

    rec.tz_label = tz_text.trim().to_string();

    let naive = NaiveDateTime::parse_from_str(ts_text.trim(), TIMESTAMP_FORMAT)
        .map_err(|e| TraceError::header(format!("timestamp {:?}: {}", ts_text, e)))?;
    // An unreadable offset label degrades to UTC; the label text is kept.
    let offset = parse_offset_label(rec.tz_label.as_str()).unwrap_or_else(|| {
        debug!(label = %rec.tz_label, "unparseable offset label, assuming +00:00");
        Utc.fix()
    });
    rec.timestamp = naive
        .and_local_timezone(offset)
        .single()
        .ok_or_else(|| TraceError::header_static("ambiguous local timestamp"))?;

    let mut bracketed = [""; HEADER_FIELDS - 2];
    for slot in bracketed.iter_mut() {
        *slot = strip_brackets(
            fields
                .next()
                .ok_or_else(|| TraceError::header_static("too few header fields"))?,
        );
    }
    let [level, module, thread_id, source, function, file_name, file_path, line_no] = bracketed;

    rec.level = level.to_string();
    rec.module = module.to_string();
    rec.thread_id = thread_id.to_string();
    rec.source = source.to_string();
    rec.function = function.to_string();
    rec.file_name = file_name.to_string();
    rec.file_path = file_path.to_string();
    rec.source_line = line_no.parse().unwrap_or(0);

    let tail = fields
        .next()
        .ok_or_else(|| TraceError::header_static("missing message tail"))?;

    // Message text is everything after the first colon, or the whole tail.
    rec.message = match tail.split_once(':') {
        Some((_, msg)) => msg.trim().to_string(),
        None => tail.trim().to_string(),
    };

    Ok(tail)
}

/// Strip surrounding brackets and padding from a header field.
fn strip_brackets(field: &str) -> &str {
    field
        .trim()
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(field.trim())
        .trim()
}

/// Parse a `+08:00` / `-05:30` style offset label.
fn parse_offset_label(label: &str) -> Option<FixedOffset> {
    let (sign, rest) = match label.as_bytes().first()? {
        b'+' => (1, &label[1..]),
        b'-' => (-1, &label[1..]),
        _ => (1, label),
    };
    let (hours, minutes) = rest.split_once(':')?;
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

//! Protocol-specific log-line parsing.
//!
//! The selector fingerprints a raw line and routes it to the Modbus or
//! power (IEC 104) extractor. Both extractors are best-effort: a field
//! that cannot be located keeps its default, and a line whose header does
//! not parse still yields a defaulted record. Nothing here returns an
//! error to the caller.

use bytes::Bytes;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::header::extract_header;
use crate::hex::{scan_hex_gated, scan_hex_greedy};
use crate::types::{LogEntry, LogRecord, ModbusRecord, PowerRecord};

/// Matches `<count> bytes` in a power tail, e.g. `Sending 6 bytes of data`.
static BYTES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d+)\s+bytes").expect("bytes pattern is valid")
});

/// Route one raw log line to its protocol parser.
///
/// Lines mentioning `IOServer` or `DCB=` parse as Modbus, lines mentioning
/// `[iec870ip` as power; everything else becomes a plain record with only
/// the common header filled.
pub fn parse_line(raw: &str) -> LogEntry {
    let line = raw.trim_end_matches(['\r', '\n']);

    if line.contains("IOServer") || line.contains("DCB=") {
        LogEntry::Modbus(parse_modbus_line(line))
    } else if line.contains("[iec870ip") {
        LogEntry::Power(parse_power_line(line))
    } else {
        let mut rec = LogRecord::default();
        if let Err(e) = extract_header(line, &mut rec) {
            debug!(error = %e, "unrouted line with invalid header");
        }
        LogEntry::Plain(rec)
    }
}

/// Parse a Modbus trace line.
///
/// On a header failure the record is returned with defaults and no
/// protocol fields are extracted.
pub fn parse_modbus_line(line: &str) -> ModbusRecord {
    let mut rec = ModbusRecord::default();
    let tail = match extract_header(line, &mut rec.header) {
        Ok(tail) => tail,
        Err(e) => {
            debug!(error = %e, "modbus line header invalid");
            return rec;
        }
    };

    rec.action = modbus_action(tail);
    rec.dcb = tagged_token(tail, "DCB=");
    rec.transaction_id = tagged_token(tail, "ID=");
    rec.expected_length = declared_length(tail);
    rec.header.payload = Some(Bytes::from(scan_hex_gated(tail)));
    rec
}

/// Parse a power (IEC 104) trace line.
///
/// All extractions are independent and best-effort.
pub fn parse_power_line(line: &str) -> PowerRecord {
    let mut rec = PowerRecord {
        channel: -1,
        sequence_number: -1,
        ..Default::default()
    };
    let tail = match extract_header(line, &mut rec.header) {
        Ok(tail) => tail,
        Err(e) => {
            debug!(error = %e, "power line header invalid");
            return rec;
        }
    };

    rec.channel = channel_index(tail);
    rec.sequence_number = sequence_number(tail);
    rec.delay_ack = delay_ack(tail);
    rec.action = power_action(tail);
    rec.expected_length = advertised_length(tail);
    rec.header.payload = Some(Bytes::from(scan_hex_greedy(tail)));
    rec
}

/// Modbus action token: the tail prefix up to the first `,` or tab.
///
/// `Reply()` is returned verbatim; anything else reduces to its first
/// whitespace-delimited token.
fn modbus_action(tail: &str) -> String {
    let end = tail.find([',', '\t']).unwrap_or(tail.len());
    let prefix = tail[..end].trim();
    if prefix.starts_with("Reply()") {
        return "Reply()".to_string();
    }
    prefix
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Value of a `TAG=value` field, ended by space, tab or comma.
fn tagged_token(tail: &str, tag: &str) -> String {
    match tail.find(tag) {
        Some(pos) => {
            let after = &tail[pos + tag.len()..];
            let end = after.find([' ', '\t', ',']).unwrap_or(after.len());
            after[..end].to_string()
        }
        None => String::new(),
    }
}

/// Decimal value after the `Length` keyword, ended by space or tab.
fn declared_length(tail: &str) -> Option<usize> {
    let pos = tail.find("Length")?;
    let after = tail[pos + "Length".len()..].trim_start();
    let end = after.find([' ', '\t']).unwrap_or(after.len());
    after[..end].parse().ok()
}

/// Channel index from `Channel (n)`; -1 when absent.
fn channel_index(tail: &str) -> i32 {
    let field = tail.find("Channel (").and_then(|pos| {
        let after = &tail[pos + "Channel (".len()..];
        let end = after.find(')')?;
        after[..end].trim().parse().ok()
    });
    field.unwrap_or(-1)
}

/// Sequence number from `SequenceNumber:`, ended by comma; -1 when absent.
fn sequence_number(tail: &str) -> i64 {
    let field = tail.find("SequenceNumber:").and_then(|pos| {
        let after = &tail[pos + "SequenceNumber:".len()..];
        let end = after.find(',').unwrap_or(after.len());
        after[..end].trim().parse().ok()
    });
    field.unwrap_or(-1)
}

/// Delayed-ACK flag: the first character after `DelayACK:` is `1`.
fn delay_ack(tail: &str) -> bool {
    tail.find("DelayACK:")
        .map(|pos| tail[pos + "DelayACK:".len()..].trim_start().starts_with('1'))
        .unwrap_or(false)
}

/// Power action token.
///
/// The substring before the first `:` names engine operations; transfer
/// lines carry the direction after a channel prefix, so a `Sending` or
/// `Received` literal anywhere in the tail takes precedence over a prefix
/// that is not itself a direction.
fn power_action(tail: &str) -> String {
    let candidate = tail
        .split_once(':')
        .map(|(head, _)| head.trim())
        .unwrap_or_default();
    if candidate == "Sending" || candidate == "Received" {
        return candidate.to_string();
    }
    for direction in ["Sending", "Received"] {
        if tail.contains(direction) {
            return direction.to_string();
        }
    }
    candidate.to_string()
}

/// Advertised frame length of a power line, two heuristics with the
/// `bytes of data` form winning.
fn advertised_length(tail: &str) -> Option<usize> {
    let mut length = None;

    if tail.contains("Sending") || tail.contains("Received") {
        if let Some(caps) = BYTES_RE.captures(tail) {
            length = caps[1].parse().ok();
        }
    }

    if let Some(pos) = tail.find("bytes of data") {
        let before = tail[..pos].trim_end();
        let digits_from = before
            .rfind(|c: char| !c.is_ascii_digit())
            .map(|i| i + 1)
            .unwrap_or(0);
        if digits_from < before.len() {
            if let Ok(value) = before[digits_from..].parse() {
                length = Some(value);
            }
        }
    }

    length
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modbus_line() -> String {
        [
            "2023-03-17 07:18:24.250",
            "+08:00",
            "[TRACE]",
            "[CORE       ]",
            "[0x11fc]",
            "[IOServer        ]",
            "[(GLOBAL)        ]",
            "[DrvDebug()]",
            "[dsp_fmt.cpp]",
            "[533 ]",
            "Request, DCB=0x1093b93c, ID=0x00de Length 12\t00 DE 00 00 00 06 FF 03 00 00 00 2D                   ...........-\t",
        ]
        .join("\t")
    }

    fn power_line(tail: &str) -> String {
        [
            "2023-03-17 07:18:24.250",
            "+08:00",
            "[TRACE]",
            "[NET        ]",
            "[0x2210]",
            "[iec870ip       ]",
            "[(GLOBAL)       ]",
            "[ChannelIo()]",
            "[iec_chan.cpp]",
            "[214 ]",
            tail,
        ]
        .join("\t")
    }

    #[test]
    fn test_selector_routes_by_fingerprint() {
        assert!(matches!(parse_line(&modbus_line()), LogEntry::Modbus(_)));
        assert!(matches!(
            parse_line(&power_line("Channel (0) : Sending 6 bytes of data")),
            LogEntry::Power(_)
        ));
        let other = modbus_line().replace("IOServer", "OtherSrv").replace("DCB=", "XCB=");
        assert!(matches!(parse_line(&other), LogEntry::Plain(_)));
    }

    #[test]
    fn test_modbus_request_round_trip() {
        let rec = parse_modbus_line(&modbus_line());

        assert_eq!(rec.header.level, "TRACE");
        assert_eq!(rec.header.thread_id, "0x11fc");
        assert_eq!(rec.action, "Request");
        assert_eq!(rec.dcb, "0x1093b93c");
        assert_eq!(rec.transaction_id, "0x00de");
        assert_eq!(rec.expected_length, Some(12));
        assert_eq!(
            rec.header.payload_bytes(),
            &[0x00, 0xDE, 0x00, 0x00, 0x00, 0x06, 0xFF, 0x03, 0x00, 0x00, 0x00, 0x2D]
        );
    }

    #[test]
    fn test_modbus_reply_action_kept_verbatim() {
        let line = modbus_line().replace("Request,", "Reply(), ");
        let rec = parse_modbus_line(&line);
        assert_eq!(rec.action, "Reply()");
    }

    #[test]
    fn test_modbus_action_first_token() {
        let line = modbus_line().replace("Request, DCB=", "Raw Receive DCB=");
        let rec = parse_modbus_line(&line);
        assert_eq!(rec.action, "Raw");
    }

    #[test]
    fn test_modbus_missing_fields_stay_default() {
        let line = modbus_line().replace("DCB=0x1093b93c, ", "").replace("ID=0x00de ", "");
        let rec = parse_modbus_line(&line);
        assert_eq!(rec.dcb, "");
        assert_eq!(rec.transaction_id, "");
        // Length and payload are still present
        assert_eq!(rec.expected_length, Some(12));
        assert_eq!(rec.header.payload_bytes().len(), 12);
    }

    #[test]
    fn test_modbus_invalid_header_yields_defaults() {
        let rec = parse_modbus_line("IOServer no tabs at all");
        assert_eq!(rec.action, "");
        assert_eq!(rec.expected_length, None);
        assert!(rec.header.payload.is_none());
    }

    #[test]
    fn test_power_sending_start_line() {
        let rec = parse_power_line(&power_line("Channel (0) : Sending 6 bytes of data"));

        assert_eq!(rec.channel, 0);
        assert_eq!(rec.action, "Sending");
        assert_eq!(rec.expected_length, Some(6));
    }

    #[test]
    fn test_power_action_received_without_colon() {
        let rec = parse_power_line(&power_line("Received 12 bytes"));
        assert_eq!(rec.action, "Received");
        assert_eq!(rec.expected_length, Some(12));
    }

    #[test]
    fn test_power_engine_op_action() {
        let rec = parse_power_line(&power_line("Connect : channel up"));
        assert_eq!(rec.action, "Connect");
        assert_eq!(rec.expected_length, None);
    }

    #[test]
    fn test_power_continuation_has_empty_action_and_bytes() {
        let rec = parse_power_line(&power_line("68 04 01 00 58 6A                  h....j"));
        assert_eq!(rec.action, "");
        assert_eq!(rec.expected_length, None);
        // Greedy scan picks up the frame bytes at the front of the dump
        assert!(rec.header.payload_bytes().starts_with(&[0x68, 0x04, 0x01, 0x00, 0x58, 0x6A]));
    }

    #[test]
    fn test_power_sequence_and_delay_ack() {
        let rec = parse_power_line(&power_line("Ack : SequenceNumber: 4021, DelayACK: 1"));
        assert_eq!(rec.sequence_number, 4021);
        assert!(rec.delay_ack);

        let rec = parse_power_line(&power_line("Ack : SequenceNumber: 17, DelayACK: 0"));
        assert_eq!(rec.sequence_number, 17);
        assert!(!rec.delay_ack);
    }

    #[test]
    fn test_power_bytes_of_data_wins_over_regex() {
        // Both heuristics fire; the `bytes of data` token is preferred
        let rec = parse_power_line(&power_line("Received 4 bytes, total 6 bytes of data"));
        assert_eq!(rec.expected_length, Some(6));
    }

    #[test]
    fn test_power_defaults_when_fields_absent() {
        let rec = parse_power_line(&power_line("Connect : channel up"));
        assert_eq!(rec.channel, -1);
        assert_eq!(rec.sequence_number, -1);
        assert!(!rec.delay_ack);
    }

    #[test]
    fn test_direction_iff_positive_length() {
        // Transfer lines produce both a direction and a length; engine
        // lines produce neither.
        for tail in ["Channel (0) : Sending 6 bytes of data", "Received 12 bytes"] {
            let rec = parse_power_line(&power_line(tail));
            let is_dir = rec.action == "Sending" || rec.action == "Received";
            assert!(is_dir && rec.expected_length.is_some_and(|n| n > 0));
        }
        for tail in ["Connect : channel up", "68 04 01 00 58 6A"] {
            let rec = parse_power_line(&power_line(tail));
            let is_dir = rec.action == "Sending" || rec.action == "Received";
            assert!(!is_dir && rec.expected_length.is_none());
        }
    }
}

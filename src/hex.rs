//! Hex dump scanning.
//!
//! Trace lines carry raw frame bytes as two-character hex pairs mixed with
//! separators and an ASCII gutter. Two scan variants exist: the greedy scan
//! used for IEC tails collects every pair to the end of the view; the
//! length-gated scan used for Modbus tails locates the declared byte count
//! first and caps collection at it. Both are table-free and allocate only
//! the output vector.

/// Convert an ASCII hex digit to its nibble value.
#[inline]
fn hex_val(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Scan hex pairs, skipping non-hex bytes, up to an optional cap.
fn scan(view: &str, cap: Option<usize>) -> Vec<u8> {
    let bytes = view.as_bytes();
    let mut out = Vec::with_capacity(cap.unwrap_or(0));
    let mut i = 0;

    while i + 1 < bytes.len() {
        if cap.is_some_and(|limit| out.len() >= limit) {
            break;
        }
        match (hex_val(bytes[i]), hex_val(bytes[i + 1])) {
            (Some(hi), Some(lo)) => {
                out.push((hi << 4) | lo);
                i += 2;
            }
            _ => i += 1,
        }
    }

    out
}

/// Greedy scan: collect every two-hex-char pair in the view.
///
/// Used for IEC tails, where the whole continuation line is a hex dump.
pub fn scan_hex_greedy(view: &str) -> Vec<u8> {
    scan(view, None)
}

/// Length-gated scan: locate the declared byte count after the literal
/// ` Length` keyword, then collect at most that many pairs from the bytes
/// after the next tab.
///
/// Any missing piece (no keyword, no parseable count, no tab-separated dump
/// section) produces an empty vector, never an error.
pub fn scan_hex_gated(tail: &str) -> Vec<u8> {
    let Some(keyword) = tail.find(" Length") else {
        return Vec::new();
    };
    let after = &tail[keyword + " Length".len()..];

    // Decimal run after the keyword, bounded by the end of this tab section.
    let section = &after[..after.find('\t').unwrap_or(after.len())];
    let digits = section.trim_start();
    let run_len = digits.bytes().take_while(u8::is_ascii_digit).count();
    let Ok(count) = digits[..run_len].parse::<usize>() else {
        return Vec::new();
    };

    // The dump lives in the next tab section.
    match after.find('\t') {
        Some(tab) => scan(&after[tab + 1..], Some(count)),
        None => Vec::new(),
    }
}

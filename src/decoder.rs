//! APDU decoding and payload dispatch.
//!
//! Entry point of the third pipeline stage: a reassembled frame comes in,
//! zero or more decoded events come out. Malformed frames, unknown type
//! identifications and short payloads all decode to an empty list; the
//! pipeline never fails on trace content.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::elements::{
    decode_control_command, decode_double_point, decode_interrogation, decode_no_quality,
    decode_normalized, decode_packed_single_point, decode_scaled, decode_short_float,
    decode_single_point, decode_time_sync,
};
use crate::error::{Result, TraceError};
use crate::types::{
    AsduHeader, DecodedResult, FrameClass, ResultValue, TypeId, MIN_APDU_LENGTH, START_BYTE,
};

/// Decode one reassembled APDU into its application-level events.
///
/// `received_at` stamps every produced result (typically the reception
/// time recovered from the start log line). The call never fails: frames
/// that violate the APCI preconditions, carry a type identification
/// outside the dispatch table, or truncate an element body produce an
/// empty list.
pub fn decode_apdu(frame: &[u8], received_at: Option<DateTime<Utc>>) -> Vec<DecodedResult> {
    match try_decode(frame, received_at) {
        Ok(results) => results,
        Err(e) if matches!(e, TraceError::UnsupportedType(_)) => {
            debug!(error = %e, "APDU with unrouted type identification");
            Vec::new()
        }
        Err(e) => {
            warn!(error = %e, frame_len = frame.len(), "APDU rejected");
            Vec::new()
        }
    }
}

fn try_decode(frame: &[u8], received_at: Option<DateTime<Utc>>) -> Result<Vec<DecodedResult>> {
    if frame.len() < MIN_APDU_LENGTH {
        return Err(TraceError::short_static("APDU shorter than APCI"));
    }
    if frame[0] != START_BYTE || frame[1] as usize != frame.len() - 2 {
        return Err(TraceError::short_static(
            "length prefix inconsistent with frame",
        ));
    }

    match FrameClass::classify(&frame[2..6]) {
        FrameClass::SFrame { recv_seq } => Ok(vec![DecodedResult::link(
            ResultValue::SFrame { receive_seq: recv_seq },
            received_at,
        )]),
        FrameClass::UFrame { function, action } => Ok(vec![DecodedResult::link(
            ResultValue::UFrame { function, action },
            received_at,
        )]),
        FrameClass::Invalid => {
            debug!(ctrl0 = frame[2], "unrecognised control field");
            Ok(Vec::new())
        }
        FrameClass::IFrame => {
            let asdu = &frame[6..];
            let (header, consumed) = AsduHeader::parse(asdu)?;
            dispatch(&header, &asdu[consumed..], received_at)
        }
    }
}

/// Route an ASDU to its information-element decoder by type identification.
///
/// TypeID 20 is canonically a packed single-point frame; the plain
/// single-point decoder accepts it only when invoked directly.
pub fn dispatch(
    header: &AsduHeader,
    payload: &[u8],
    received_at: Option<DateTime<Utc>>,
) -> Result<Vec<DecodedResult>> {
    match header.type_id {
        TypeId::PackedSinglePoint => decode_packed_single_point(header, payload, received_at),

        TypeId::SinglePoint | TypeId::SinglePointTime24 | TypeId::SinglePointTime56 => {
            decode_single_point(header, payload, received_at)
        }

        TypeId::DoublePoint | TypeId::DoublePointTime24 | TypeId::DoublePointTime56 => {
            decode_double_point(header, payload, received_at)
        }

        TypeId::MeasuredNormalized | TypeId::MeasuredNormalizedTime24 => {
            decode_normalized(header, payload, received_at)
        }

        TypeId::MeasuredScaled | TypeId::MeasuredScaledTime24 => {
            decode_scaled(header, payload, received_at)
        }

        TypeId::MeasuredFloat | TypeId::MeasuredFloatTime24 => {
            decode_short_float(header, payload, received_at)
        }

        TypeId::MeasuredNoQuality => decode_no_quality(header, payload, received_at),

        TypeId::SingleCommand
        | TypeId::DoubleCommand
        | TypeId::RegulatingStep
        | TypeId::SingleCommandTime56
        | TypeId::DoubleCommandTime56 => decode_control_command(header, payload, received_at),

        TypeId::InterrogationCommand | TypeId::CounterInterrogation => {
            decode_interrogation(header, payload, received_at)
        }

        TypeId::ClockSync => decode_time_sync(header, payload, received_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LinkAction, LinkFunction};

    #[test]
    fn test_u_frame_startdt_confirm() {
        let results = decode_apdu(&[0x68, 0x04, 0x0B, 0x00, 0x00, 0x00], None);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].type_id, None);
        assert_eq!(
            results[0].value,
            ResultValue::UFrame {
                function: LinkFunction::StartDt,
                action: LinkAction::Confirm,
            }
        );
    }

    #[test]
    fn test_s_frame_receive_seq() {
        let results = decode_apdu(&[0x68, 0x04, 0x01, 0x00, 0x58, 0x6A], None);

        assert_eq!(results.len(), 1);
        let expected = ((0x58u16 | (0x6Au16 << 8)) >> 1) & 0x7FFF;
        assert_eq!(
            results[0].value,
            ResultValue::SFrame { receive_seq: expected }
        );
    }

    #[test]
    fn test_i_frame_single_point() {
        // I-frame, TypeID=1, one object, COT=3, CA=1, IOA=1, SIQ=0x01
        let frame = [
            0x68, 0x0E, 0x00, 0x00, 0x00, 0x00, // APCI
            0x01, 0x01, 0x03, 0x00, 0x01, 0x00, // ASDU header
            0x01, 0x00, 0x00, 0x01, // IOA=1, SIQ
        ];
        let results = decode_apdu(&frame, None);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].type_id, Some(TypeId::SinglePoint));
        assert_eq!(results[0].common_address, 1);
        assert_eq!(results[0].ioa, 1);
        assert_eq!(results[0].cot.cause(), 3);
        assert_eq!(
            results[0].value,
            ResultValue::Status { state: 1, valid: true }
        );
    }

    #[test]
    fn test_i_frame_clock_sync() {
        let frame = [
            0x68, 0x14, 0x02, 0x00, 0x00, 0x00, // APCI (I-frame)
            0x67, 0x01, 0x06, 0x00, 0x01, 0x00, // TypeID=103, COT=6 (act), CA=1
            0x01, 0x00, 0x00, // IOA=1
            0x6C, 0xE8, 0x3B, 0x17, 0x1F, 0x0C, 0x19, // CP56Time2a
        ];
        let results = decode_apdu(&frame, None);

        assert_eq!(results.len(), 1);
        match results[0].value {
            ResultValue::TimeSync { sync_time } => {
                assert_eq!(sync_time.to_rfc3339(), "2025-12-31T23:59:59.500+00:00");
            }
            ref other => panic!("expected time sync, got {:?}", other),
        }
    }

    #[test]
    fn test_dispatch_routes_type_20_to_packed() {
        // TypeID=20, 16 points in sequence, base IOA=0x10, states AA 55
        let frame = [
            0x68, 0x0F, 0x00, 0x00, 0x00, 0x00, // APCI
            0x14, 0x90, 0x03, 0x00, 0x01, 0x00, // TypeID=20, VSQ=SQ|16
            0x10, 0x00, 0x00, 0xAA, 0x55,
        ];
        let results = decode_apdu(&frame, None);

        assert_eq!(results.len(), 16);
        assert_eq!(results[0].ioa, 0x10);
        assert_eq!(results[15].ioa, 0x1F);
    }

    #[test]
    fn test_unknown_type_id_is_empty() {
        // TypeID=70 (end of init) is outside the dispatch table
        let frame = [
            0x68, 0x0A, 0x00, 0x00, 0x00, 0x00, 0x46, 0x01, 0x04, 0x00, 0x01, 0x00,
        ];
        assert!(decode_apdu(&frame, None).is_empty());
    }

    #[test]
    fn test_precondition_violations_are_empty() {
        // Too short
        assert!(decode_apdu(&[0x68, 0x02, 0x01], None).is_empty());
        // Wrong start byte
        assert!(decode_apdu(&[0x69, 0x04, 0x01, 0x00, 0x00, 0x00], None).is_empty());
        // Length prefix disagrees with the input
        assert!(decode_apdu(&[0x68, 0x09, 0x01, 0x00, 0x00, 0x00], None).is_empty());
        // Empty input
        assert!(decode_apdu(&[], None).is_empty());
    }

    #[test]
    fn test_unrecognised_u_frame_is_empty() {
        assert!(decode_apdu(&[0x68, 0x04, 0xC3, 0x00, 0x00, 0x00], None).is_empty());
    }

    #[test]
    fn test_truncated_element_body_is_empty() {
        // Declares two objects but carries one
        let frame = [
            0x68, 0x0A, 0x00, 0x00, 0x00, 0x00, // APCI
            0x01, 0x02, 0x03, 0x00, 0x01, 0x00, // TypeID=1, count=2
            // No information objects at all
        ];
        assert!(decode_apdu(&frame, None).is_empty());
    }

    #[test]
    fn test_received_at_stamps_results() {
        let at = DateTime::parse_from_rfc3339("2023-03-17T07:18:24.250Z")
            .unwrap()
            .with_timezone(&Utc);
        let results = decode_apdu(&[0x68, 0x04, 0x07, 0x00, 0x00, 0x00], Some(at));

        assert_eq!(results[0].timestamp, Some(at));
    }
}

//! Information-element decoders.
//!
//! One decoder per information-element family, each walking the ASDU
//! payload under the shared VSQ contract: with SQ=1 a single 3-byte base
//! IOA precedes the elements and element `i` addresses `base + i`; with
//! SQ=0 every element carries its own 3-byte IOA. A decoder invoked with a
//! type identification outside its support set fails with an unsupported
//! type error (a programmer bug at the dispatch layer), and a payload too
//! short for its declared object count fails without a partial result list.

use chrono::{DateTime, Utc};

use crate::error::{Result, TraceError};
use crate::types::{
    AsduHeader, Cp56Time2a, DecodedResult, Ioa, ResultValue, TypeId, Vsq,
};

/// Payload cursor implementing the sequence/individual IOA contract.
struct ElementWalker<'a> {
    data: &'a [u8],
    offset: usize,
    sequence: bool,
    base: u32,
    index: u32,
}

impl<'a> ElementWalker<'a> {
    fn new(data: &'a [u8], vsq: Vsq) -> Result<Self> {
        let mut walker = Self {
            data,
            offset: 0,
            sequence: vsq.sequence,
            base: 0,
            index: 0,
        };
        if vsq.sequence && vsq.count > 0 {
            walker.base = walker.read_ioa()?;
        }
        Ok(walker)
    }

    fn read_ioa(&mut self) -> Result<u32> {
        let remaining = self.data.get(self.offset..).unwrap_or(&[]);
        let ioa = Ioa::from_bytes(remaining)?;
        self.offset += 3;
        Ok(ioa.value())
    }

    /// Effective IOA of the next element.
    fn next_ioa(&mut self) -> Result<u32> {
        let ioa = if self.sequence {
            self.base + self.index
        } else {
            self.read_ioa()?
        };
        self.index += 1;
        Ok(ioa)
    }

    /// Consume the next `n` body bytes.
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.offset + n;
        let slice = self
            .data
            .get(self.offset..end)
            .ok_or_else(|| TraceError::short_static("element body past end of payload"))?;
        self.offset = end;
        Ok(slice)
    }
}

/// Reject a dispatch outside the decoder's support set.
fn ensure_supported(type_id: TypeId, supported: &[TypeId]) -> Result<()> {
    if supported.contains(&type_id) {
        Ok(())
    } else {
        Err(TraceError::UnsupportedType(type_id.as_u8()))
    }
}

/// Build a result carrying the ASDU header fields.
fn result_for(
    header: &AsduHeader,
    ioa: u32,
    received_at: Option<DateTime<Utc>>,
    value: ResultValue,
) -> DecodedResult {
    DecodedResult {
        type_id: Some(header.type_id),
        common_address: header.common_address,
        ioa,
        cot: header.cot,
        timestamp: received_at,
        value,
    }
}

/// Decode single-point status elements (SIQ body).
///
/// Also accepts TypeID 20 when invoked directly; the dispatcher routes 20
/// to [`decode_packed_single_point`] instead.
pub fn decode_single_point(
    header: &AsduHeader,
    payload: &[u8],
    received_at: Option<DateTime<Utc>>,
) -> Result<Vec<DecodedResult>> {
    ensure_supported(
        header.type_id,
        &[
            TypeId::SinglePoint,
            TypeId::SinglePointTime24,
            TypeId::SinglePointTime56,
            TypeId::PackedSinglePoint,
        ],
    )?;

    let count = header.vsq.count as usize;
    let mut walker = ElementWalker::new(payload, header.vsq)?;
    let mut results = Vec::with_capacity(count);

    for _ in 0..count {
        let ioa = walker.next_ioa()?;
        let siq = walker.take(1)?[0];
        results.push(result_for(
            header,
            ioa,
            received_at,
            ResultValue::Status {
                state: siq & 0x01,
                valid: (siq & 0x80) == 0,
            },
        ));
    }

    Ok(results)
}

/// Decode double-point status elements (DIQ body).
pub fn decode_double_point(
    header: &AsduHeader,
    payload: &[u8],
    received_at: Option<DateTime<Utc>>,
) -> Result<Vec<DecodedResult>> {
    ensure_supported(
        header.type_id,
        &[
            TypeId::DoublePoint,
            TypeId::DoublePointTime24,
            TypeId::DoublePointTime56,
        ],
    )?;

    let count = header.vsq.count as usize;
    let mut walker = ElementWalker::new(payload, header.vsq)?;
    let mut results = Vec::with_capacity(count);

    for _ in 0..count {
        let ioa = walker.next_ioa()?;
        let diq = walker.take(1)?[0];
        results.push(result_for(
            header,
            ioa,
            received_at,
            ResultValue::Status {
                state: diq & 0x03,
                valid: (diq & 0x80) == 0,
            },
        ));
    }

    Ok(results)
}

/// Decode packed single-point elements.
///
/// The object count names points, not bytes: each state byte contributes
/// up to eight points, LSB first. Points carry no quality bits and are
/// always valid.
pub fn decode_packed_single_point(
    header: &AsduHeader,
    payload: &[u8],
    received_at: Option<DateTime<Utc>>,
) -> Result<Vec<DecodedResult>> {
    ensure_supported(header.type_id, &[TypeId::PackedSinglePoint])?;

    let count = header.vsq.count as usize;
    let mut results = Vec::with_capacity(count);
    if count == 0 {
        return Ok(results);
    }

    let status = |state: u8| ResultValue::Status { state, valid: true };

    if header.vsq.sequence {
        // One base IOA, then ceil(count / 8) state bytes.
        let base = Ioa::from_bytes(payload)?.value();
        let states = &payload[3..];
        for point in 0..count {
            let byte = states
                .get(point / 8)
                .copied()
                .ok_or_else(|| TraceError::short_static("packed state bytes past payload end"))?;
            let state = (byte >> (point % 8)) & 0x01;
            results.push(result_for(header, base + point as u32, received_at, status(state)));
        }
    } else {
        // Each entry is a 3-byte IOA plus one state byte.
        let mut offset = 0;
        let mut emitted = 0;
        while emitted < count {
            let ioa = Ioa::from_bytes(payload.get(offset..).unwrap_or(&[]))?.value();
            offset += 3;
            let byte = payload
                .get(offset)
                .copied()
                .ok_or_else(|| TraceError::short_static("packed state byte past payload end"))?;
            offset += 1;

            let points = (count - emitted).min(8);
            for bit in 0..points {
                let state = (byte >> bit) & 0x01;
                results.push(result_for(header, ioa + bit as u32, received_at, status(state)));
            }
            emitted += points;
        }
    }

    Ok(results)
}

/// Decode normalized measurements (2-byte signed LE plus QDS).
///
/// The raw value maps onto -1.0..+1.0 by division with 32768.
pub fn decode_normalized(
    header: &AsduHeader,
    payload: &[u8],
    received_at: Option<DateTime<Utc>>,
) -> Result<Vec<DecodedResult>> {
    ensure_supported(
        header.type_id,
        &[TypeId::MeasuredNormalized, TypeId::MeasuredNormalizedTime24],
    )?;
    measurements(header, payload, received_at, |walker| {
        let body = walker.take(3)?;
        let raw = i16::from_le_bytes([body[0], body[1]]);
        Ok((raw as f64 / 32768.0, (body[2] & 0x80) == 0))
    })
}

/// Decode scaled measurements (2-byte signed LE plus QDS).
pub fn decode_scaled(
    header: &AsduHeader,
    payload: &[u8],
    received_at: Option<DateTime<Utc>>,
) -> Result<Vec<DecodedResult>> {
    ensure_supported(
        header.type_id,
        &[TypeId::MeasuredScaled, TypeId::MeasuredScaledTime24],
    )?;
    measurements(header, payload, received_at, |walker| {
        let body = walker.take(3)?;
        let raw = i16::from_le_bytes([body[0], body[1]]);
        Ok((raw as f64, (body[2] & 0x80) == 0))
    })
}

/// Decode short floating point measurements (IEEE 754 LE plus QDS).
pub fn decode_short_float(
    header: &AsduHeader,
    payload: &[u8],
    received_at: Option<DateTime<Utc>>,
) -> Result<Vec<DecodedResult>> {
    ensure_supported(
        header.type_id,
        &[TypeId::MeasuredFloat, TypeId::MeasuredFloatTime24],
    )?;
    measurements(header, payload, received_at, |walker| {
        let body = walker.take(5)?;
        let raw = f32::from_le_bytes([body[0], body[1], body[2], body[3]]);
        Ok((raw as f64, (body[4] & 0x80) == 0))
    })
}

/// Decode normalized measurements without a quality descriptor
/// (2-byte signed LE, always valid).
pub fn decode_no_quality(
    header: &AsduHeader,
    payload: &[u8],
    received_at: Option<DateTime<Utc>>,
) -> Result<Vec<DecodedResult>> {
    ensure_supported(header.type_id, &[TypeId::MeasuredNoQuality])?;
    measurements(header, payload, received_at, |walker| {
        let body = walker.take(2)?;
        let raw = i16::from_le_bytes([body[0], body[1]]);
        Ok((raw as f64 / 32768.0, true))
    })
}

/// Shared measurement walk; `read_body` consumes one element body and
/// yields the value with its validity.
fn measurements(
    header: &AsduHeader,
    payload: &[u8],
    received_at: Option<DateTime<Utc>>,
    read_body: impl Fn(&mut ElementWalker<'_>) -> Result<(f64, bool)>,
) -> Result<Vec<DecodedResult>> {
    let count = header.vsq.count as usize;
    let mut walker = ElementWalker::new(payload, header.vsq)?;
    let mut results = Vec::with_capacity(count);

    for _ in 0..count {
        let ioa = walker.next_ioa()?;
        let (value, valid) = read_body(&mut walker)?;
        results.push(result_for(
            header,
            ioa,
            received_at,
            ResultValue::Measurement { value, valid },
        ));
    }

    Ok(results)
}

/// Decode control commands (SCO/DCO/RCO body).
///
/// Single commands carry a one-bit state, double and regulating-step
/// commands a two-bit state; bit 7 selects between select and execute.
pub fn decode_control_command(
    header: &AsduHeader,
    payload: &[u8],
    received_at: Option<DateTime<Utc>>,
) -> Result<Vec<DecodedResult>> {
    ensure_supported(
        header.type_id,
        &[
            TypeId::SingleCommand,
            TypeId::DoubleCommand,
            TypeId::RegulatingStep,
            TypeId::SingleCommandTime56,
            TypeId::DoubleCommandTime56,
        ],
    )?;

    let state_mask = match header.type_id {
        TypeId::SingleCommand | TypeId::SingleCommandTime56 => 0x01,
        _ => 0x03,
    };

    let count = header.vsq.count as usize;
    let mut walker = ElementWalker::new(payload, header.vsq)?;
    let mut results = Vec::with_capacity(count);

    for _ in 0..count {
        let ioa = walker.next_ioa()?;
        let sco = walker.take(1)?[0];
        results.push(result_for(
            header,
            ioa,
            received_at,
            ResultValue::ControlCommand {
                command_value: sco & state_mask,
                is_select: (sco & 0x80) != 0,
            },
        ));
    }

    Ok(results)
}

/// Decode interrogation commands (QOI body).
pub fn decode_interrogation(
    header: &AsduHeader,
    payload: &[u8],
    received_at: Option<DateTime<Utc>>,
) -> Result<Vec<DecodedResult>> {
    ensure_supported(
        header.type_id,
        &[TypeId::InterrogationCommand, TypeId::CounterInterrogation],
    )?;

    let count = header.vsq.count as usize;
    let mut walker = ElementWalker::new(payload, header.vsq)?;
    let mut results = Vec::with_capacity(count);

    for _ in 0..count {
        let ioa = walker.next_ioa()?;
        let qoi = walker.take(1)?[0];
        results.push(result_for(
            header,
            ioa,
            received_at,
            ResultValue::Interrogation { qoi },
        ));
    }

    Ok(results)
}

/// Decode clock synchronization commands (CP56Time2a body).
pub fn decode_time_sync(
    header: &AsduHeader,
    payload: &[u8],
    received_at: Option<DateTime<Utc>>,
) -> Result<Vec<DecodedResult>> {
    ensure_supported(header.type_id, &[TypeId::ClockSync])?;

    let count = header.vsq.count as usize;
    let mut walker = ElementWalker::new(payload, header.vsq)?;
    let mut results = Vec::with_capacity(count);

    for _ in 0..count {
        let ioa = walker.next_ioa()?;
        let time = Cp56Time2a::from_bytes(walker.take(7)?)?;
        let sync_time = time
            .to_datetime_utc()
            .ok_or_else(|| TraceError::range_static("CP56Time2a forms no calendar date"))?;
        results.push(result_for(
            header,
            ioa,
            received_at,
            ResultValue::TimeSync { sync_time },
        ));
    }

    Ok(results)
}

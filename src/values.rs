//! Stored value types, literal parsing and canonical string rendering.
//!
//! Fixed-width values are stored big-endian so that byte order matches
//! numeric order.

use std::fmt::Write as _;
use std::net::Ipv4Addr;

use chrono::{DateTime, NaiveDateTime};

use crate::error::{fatal, FilterError};

/// Rendering layout of ISO8601 timestamps: `2006-01-02T15:04:05.000Z`.
pub const ISO8601_TIMESTAMP_LEN: usize = 24;

const ISO8601_PARSE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Encoding of the values of one column within a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueType {
    String = 1,
    Dict = 2,
    Uint8 = 3,
    Uint16 = 4,
    Uint32 = 5,
    Uint64 = 6,
    Float64 = 7,
    IPv4 = 8,
    TimestampISO8601 = 9,
}

impl ValueType {
    /// Decode an on-disk tag, aborting on unknown tags.
    ///
    /// Unknown tags mean on-disk corruption or reader/writer version skew.
    pub fn must_from_tag(part_path: &str, tag: u8) -> ValueType {
        match ValueType::try_from(tag) {
            Ok(vt) => vt,
            Err(_) => fatal(part_path, format_args!("unknown valueType={}", tag)),
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Width of the binary encoding, or `None` for string-like types.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            ValueType::String | ValueType::Dict => None,
            ValueType::Uint8 => Some(1),
            ValueType::Uint16 => Some(2),
            ValueType::Uint32 | ValueType::IPv4 => Some(4),
            ValueType::Uint64 | ValueType::Float64 | ValueType::TimestampISO8601 => Some(8),
        }
    }

    pub fn is_uint(self) -> bool {
        matches!(
            self,
            ValueType::Uint8 | ValueType::Uint16 | ValueType::Uint32 | ValueType::Uint64
        )
    }

    /// Largest value representable by an unsigned type.
    pub(crate) fn uint_max(self) -> u64 {
        match self {
            ValueType::Uint8 => u8::MAX as u64,
            ValueType::Uint16 => u16::MAX as u64,
            ValueType::Uint32 => u32::MAX as u64,
            _ => u64::MAX,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Dict => "dict",
            ValueType::Uint8 => "uint8",
            ValueType::Uint16 => "uint16",
            ValueType::Uint32 => "uint32",
            ValueType::Uint64 => "uint64",
            ValueType::Float64 => "float64",
            ValueType::IPv4 => "ipv4",
            ValueType::TimestampISO8601 => "iso8601",
        }
    }
}

impl TryFrom<u8> for ValueType {
    type Error = FilterError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        Ok(match tag {
            1 => ValueType::String,
            2 => ValueType::Dict,
            3 => ValueType::Uint8,
            4 => ValueType::Uint16,
            5 => ValueType::Uint32,
            6 => ValueType::Uint64,
            7 => ValueType::Float64,
            8 => ValueType::IPv4,
            9 => ValueType::TimestampISO8601,
            _ => return Err(FilterError::UnknownValueType(tag)),
        })
    }
}

/// Parse a non-empty run of decimal digits.
pub fn try_parse_u64(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|c| c.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Parse a decimal floating-point number; infinities and NaN are rejected.
pub fn try_parse_f64(s: &str) -> Option<f64> {
    if s.is_empty() {
        return None;
    }
    let valid = s
        .bytes()
        .all(|c| c.is_ascii_digit() || matches!(c, b'.' | b'+' | b'-' | b'e' | b'E'));
    if !valid {
        return None;
    }
    s.parse::<f64>().ok().filter(|f| f.is_finite())
}

/// Parse a dotted-quad IPv4 address into its numeric form.
pub fn try_parse_ipv4(s: &str) -> Option<u32> {
    if s.len() < "0.0.0.0".len() || s.len() > "255.255.255.255".len() {
        return None;
    }
    let mut n = 0u32;
    let mut octets = 0;
    for part in s.split('.') {
        if part.is_empty() || part.len() > 3 || !part.bytes().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let octet: u32 = part.parse().ok()?;
        if octet > 255 {
            return None;
        }
        n = (n << 8) | octet;
        octets += 1;
    }
    if octets != 4 {
        return None;
    }
    Some(n)
}

/// Parse `YYYY-MM-DDTHH:MM:SS.sssZ` into unix nanoseconds.
pub fn try_parse_timestamp_iso8601(s: &str) -> Option<u64> {
    if !has_iso8601_layout(s.as_bytes()) {
        return None;
    }
    let t = NaiveDateTime::parse_from_str(s, ISO8601_PARSE_FORMAT).ok()?;
    let nsecs = t.and_utc().timestamp_nanos_opt()?;
    u64::try_from(nsecs).ok()
}

/// Check that every field of `YYYY-MM-DDTHH:MM:SS.sssZ` has its fixed width.
fn has_iso8601_layout(b: &[u8]) -> bool {
    b.len() == ISO8601_TIMESTAMP_LEN
        && b.iter().enumerate().all(|(i, &c)| match i {
            4 | 7 => c == b'-',
            10 => c == b'T',
            13 | 16 => c == b':',
            19 => c == b'.',
            23 => c == b'Z',
            _ => c.is_ascii_digit(),
        })
}

pub fn marshal_ipv4(n: u32) -> [u8; 4] {
    n.to_be_bytes()
}

/// Encode an unsigned number with the width of `vt`. The caller guarantees
/// that `n` fits.
pub(crate) fn marshal_uint(vt: ValueType, n: u64, dst: &mut Vec<u8>) {
    match vt {
        ValueType::Uint8 => dst.push(n as u8),
        ValueType::Uint16 => dst.extend_from_slice(&(n as u16).to_be_bytes()),
        ValueType::Uint32 => dst.extend_from_slice(&(n as u32).to_be_bytes()),
        _ => dst.extend_from_slice(&n.to_be_bytes()),
    }
}

/// Decode a fixed-width unsigned value whose length has been verified.
pub(crate) fn unmarshal_uint(v: &[u8]) -> u64 {
    v.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

pub(crate) fn unmarshal_f64(v: &[u8]) -> f64 {
    f64::from_bits(unmarshal_uint(v))
}

/// Verify that a binary value has the width its column type declares.
///
/// A mismatch is storage corruption and aborts the evaluation.
#[inline]
pub(crate) fn must_fixed_width<'a>(part_path: &str, vt: ValueType, v: &'a [u8]) -> &'a [u8] {
    let want = vt.fixed_width().unwrap_or(0);
    if v.len() != want {
        fatal(
            part_path,
            format_args!(
                "unexpected length for binary representation of {}: got {}; want {}",
                vt.name(),
                v.len(),
                want
            ),
        );
    }
    v
}

pub fn append_float64_string(dst: &mut String, f: f64) {
    let _ = write!(dst, "{}", f);
}

pub fn append_ipv4_string(dst: &mut String, n: u32) {
    let _ = write!(dst, "{}", Ipv4Addr::from(n));
}

pub fn append_timestamp_iso8601_string(dst: &mut String, nsecs: u64) {
    let secs = (nsecs / 1_000_000_000) as i64;
    let subsec = (nsecs % 1_000_000_000) as u32;
    if let Some(t) = DateTime::from_timestamp(secs, subsec) {
        let _ = write!(dst, "{}", t.format(ISO8601_PARSE_FORMAT));
    }
}

/// Render a verified binary value of a fixed-width type in its canonical form.
pub(crate) fn append_binary_value_string(dst: &mut String, vt: ValueType, v: &[u8]) {
    match vt {
        ValueType::Uint8 | ValueType::Uint16 | ValueType::Uint32 | ValueType::Uint64 => {
            let _ = write!(dst, "{}", unmarshal_uint(v));
        }
        ValueType::Float64 => append_float64_string(dst, unmarshal_f64(v)),
        ValueType::IPv4 => append_ipv4_string(dst, unmarshal_uint(v) as u32),
        ValueType::TimestampISO8601 => append_timestamp_iso8601_string(dst, unmarshal_uint(v)),
        ValueType::String | ValueType::Dict => dst.push_str(&String::from_utf8_lossy(v)),
    }
}

//! Range filters: numeric, lexicographic, length and IPv4.

use std::fmt;

use crate::bitmap::Bitmap;
use crate::block::{BlockSearch, ColumnHeader};
use crate::matchers::{match_ipv4_range, match_len_range, match_range, match_string_range, to_u64_range};
use crate::values::{append_ipv4_string, unmarshal_f64, unmarshal_uint, must_fixed_width, ValueType, ISO8601_TIMESTAMP_LEN};

use super::{
    match_values_dict, quote_field_name_if_needed, quote_token_if_needed, visit_rendered_values, visit_strings,
    visit_values,
};

/// `field:range[min, max]`: the numeric field value lies in the closed range.
///
/// Open bounds are expressed by the caller through the adjacent representable
/// value; `string_repr` keeps the original bracket notation for display.
#[derive(Debug)]
pub struct RangeFilter {
    field_name: String,
    min_value: f64,
    max_value: f64,
    string_repr: String,
}

impl RangeFilter {
    pub fn new(field_name: impl Into<String>, min_value: f64, max_value: f64, string_repr: impl Into<String>) -> Self {
        RangeFilter {
            field_name: field_name.into(),
            min_value,
            max_value,
            string_repr: string_repr.into(),
        }
    }

    /// Closed range rendered as `range[min, max]`.
    pub fn closed(field_name: impl Into<String>, min_value: f64, max_value: f64) -> Self {
        let repr = format!("[{}, {}]", min_value, max_value);
        RangeFilter::new(field_name, min_value, max_value, repr)
    }

    pub fn apply(&self, bs: &dyn BlockSearch, bm: &mut Bitmap) {
        let (min_value, max_value) = (self.min_value, self.max_value);
        if min_value > max_value {
            bm.reset_bits();
            return;
        }

        let v = bs.const_column_value(&self.field_name);
        if !v.is_empty() {
            if !match_range(v, min_value, max_value) {
                bm.reset_bits();
            }
            return;
        }

        let ch = match bs.column_header(&self.field_name) {
            Some(ch) => ch,
            None => {
                bm.reset_bits();
                return;
            }
        };

        match ch.value_type {
            ValueType::String => visit_strings(bs, ch, bm, |v| match_range(v, min_value, max_value)),
            ValueType::Dict => match_values_dict(bs, ch, bm, |v| match_range(v, min_value, max_value)),
            ValueType::Uint8 | ValueType::Uint16 | ValueType::Uint32 | ValueType::Uint64 => {
                self.match_uint(bs, ch, bm)
            }
            ValueType::Float64 => self.match_float64(bs, ch, bm),
            ValueType::IPv4 | ValueType::TimestampISO8601 => bm.reset_bits(),
        }
    }

    fn match_uint(&self, bs: &dyn BlockSearch, ch: &ColumnHeader, bm: &mut Bitmap) {
        if self.max_value < 0.0 {
            bm.reset_bits();
            return;
        }
        let (min_value, max_value) = to_u64_range(self.min_value, self.max_value);
        if min_value > ch.max_value || max_value < ch.min_value {
            bm.reset_bits();
            return;
        }
        let (vt, part_path) = (ch.value_type, bs.part_path());
        visit_values(bs, ch, bm, |v| {
            let n = unmarshal_uint(must_fixed_width(part_path, vt, v));
            n >= min_value && n <= max_value
        });
    }

    fn match_float64(&self, bs: &dyn BlockSearch, ch: &ColumnHeader, bm: &mut Bitmap) {
        let (min_value, max_value) = (self.min_value, self.max_value);
        if min_value > f64::from_bits(ch.max_value) || max_value < f64::from_bits(ch.min_value) {
            bm.reset_bits();
            return;
        }
        let (vt, part_path) = (ch.value_type, bs.part_path());
        visit_values(bs, ch, bm, |v| {
            let f = unmarshal_f64(must_fixed_width(part_path, vt, v));
            f >= min_value && f <= max_value
        });
    }
}

impl fmt::Display for RangeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}range{}", quote_field_name_if_needed(&self.field_name), self.string_repr)
    }
}

/// `field:string_range(min, max)`: `min <= value < max` in byte order.
#[derive(Debug)]
pub struct StringRangeFilter {
    field_name: String,
    min_value: String,
    max_value: String,
}

impl StringRangeFilter {
    pub fn new(field_name: impl Into<String>, min_value: impl Into<String>, max_value: impl Into<String>) -> Self {
        StringRangeFilter {
            field_name: field_name.into(),
            min_value: min_value.into(),
            max_value: max_value.into(),
        }
    }

    pub fn apply(&self, bs: &dyn BlockSearch, bm: &mut Bitmap) {
        let (min_value, max_value) = (self.min_value.as_str(), self.max_value.as_str());
        if min_value > max_value {
            bm.reset_bits();
            return;
        }

        let v = bs.const_column_value(&self.field_name);
        if !v.is_empty() {
            if !match_string_range(v, min_value, max_value) {
                bm.reset_bits();
            }
            return;
        }

        let ch = match bs.column_header(&self.field_name) {
            Some(ch) => ch,
            None => {
                if !match_string_range("", min_value, max_value) {
                    bm.reset_bits();
                }
                return;
            }
        };

        match ch.value_type {
            ValueType::String => visit_strings(bs, ch, bm, |v| match_string_range(v, min_value, max_value)),
            ValueType::Dict => match_values_dict(bs, ch, bm, |v| match_string_range(v, min_value, max_value)),
            vt => {
                // Rendered numbers start with a digit; floats may also start with a sign.
                let lowest = if vt == ValueType::Float64 { "+" } else { "0" };
                if min_value > "9" || max_value < lowest {
                    bm.reset_bits();
                    return;
                }
                visit_rendered_values(bs, ch, bm, |v| match_string_range(v, min_value, max_value));
            }
        }
    }
}

impl fmt::Display for StringRangeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}string_range({}, {})",
            quote_field_name_if_needed(&self.field_name),
            quote_token_if_needed(&self.min_value),
            quote_token_if_needed(&self.max_value)
        )
    }
}

/// `field:len_range(min, max)`: the value length in code points is in the closed range.
#[derive(Debug)]
pub struct LenRangeFilter {
    field_name: String,
    min_len: u64,
    max_len: u64,
    string_repr: String,
}

impl LenRangeFilter {
    pub fn new(field_name: impl Into<String>, min_len: u64, max_len: u64, string_repr: impl Into<String>) -> Self {
        LenRangeFilter {
            field_name: field_name.into(),
            min_len,
            max_len,
            string_repr: string_repr.into(),
        }
    }

    /// Rendered as `len_range(min, max)`.
    pub fn closed(field_name: impl Into<String>, min_len: u64, max_len: u64) -> Self {
        let repr = format!("({}, {})", min_len, max_len);
        LenRangeFilter::new(field_name, min_len, max_len, repr)
    }

    pub fn apply(&self, bs: &dyn BlockSearch, bm: &mut Bitmap) {
        let (min_len, max_len) = (self.min_len, self.max_len);
        if min_len > max_len {
            bm.reset_bits();
            return;
        }

        let v = bs.const_column_value(&self.field_name);
        if !v.is_empty() {
            if !match_len_range(v, min_len, max_len) {
                bm.reset_bits();
            }
            return;
        }

        let ch = match bs.column_header(&self.field_name) {
            Some(ch) => ch,
            None => {
                if !match_len_range("", min_len, max_len) {
                    bm.reset_bits();
                }
                return;
            }
        };

        let ts_len = ISO8601_TIMESTAMP_LEN as u64;
        let may_match = match ch.value_type {
            ValueType::String | ValueType::Dict => true,
            ValueType::Uint8 | ValueType::Uint16 | ValueType::Uint32 | ValueType::Uint64 => {
                // Longer numbers are larger, so the bounds cap the rendered lengths.
                max_len >= decimal_len(ch.min_value) && min_len <= decimal_len(ch.max_value)
            }
            ValueType::Float64 => min_len <= 24 && max_len > 0,
            ValueType::IPv4 => min_len <= "255.255.255.255".len() as u64 && max_len >= "0.0.0.0".len() as u64,
            ValueType::TimestampISO8601 => {
                if min_len > ts_len || max_len < ts_len {
                    bm.reset_bits();
                }
                // Every timestamp renders with the same length.
                return;
            }
        };
        if !may_match {
            bm.reset_bits();
            return;
        }

        match ch.value_type {
            ValueType::String => visit_strings(bs, ch, bm, |v| match_len_range(v, min_len, max_len)),
            ValueType::Dict => match_values_dict(bs, ch, bm, |v| match_len_range(v, min_len, max_len)),
            _ => visit_rendered_values(bs, ch, bm, |v| match_len_range(v, min_len, max_len)),
        }
    }
}

fn decimal_len(n: u64) -> u64 {
    (n.checked_ilog10().unwrap_or(0) + 1) as u64
}

impl fmt::Display for LenRangeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}len_range{}", quote_field_name_if_needed(&self.field_name), self.string_repr)
    }
}

/// `field:ipv4_range(min, max)`: the value is an IPv4 address in the closed range.
#[derive(Debug)]
pub struct Ipv4RangeFilter {
    field_name: String,
    min_value: u32,
    max_value: u32,
}

impl Ipv4RangeFilter {
    pub fn new(field_name: impl Into<String>, min_value: u32, max_value: u32) -> Self {
        Ipv4RangeFilter {
            field_name: field_name.into(),
            min_value,
            max_value,
        }
    }

    pub fn apply(&self, bs: &dyn BlockSearch, bm: &mut Bitmap) {
        let (min_value, max_value) = (self.min_value, self.max_value);
        if min_value > max_value {
            bm.reset_bits();
            return;
        }

        let v = bs.const_column_value(&self.field_name);
        if !v.is_empty() {
            if !match_ipv4_range(v, min_value, max_value) {
                bm.reset_bits();
            }
            return;
        }

        let ch = match bs.column_header(&self.field_name) {
            Some(ch) => ch,
            None => {
                bm.reset_bits();
                return;
            }
        };

        match ch.value_type {
            ValueType::String => visit_strings(bs, ch, bm, |v| match_ipv4_range(v, min_value, max_value)),
            ValueType::Dict => match_values_dict(bs, ch, bm, |v| match_ipv4_range(v, min_value, max_value)),
            ValueType::IPv4 => {
                if ch.min_value > max_value as u64 || ch.max_value < min_value as u64 {
                    bm.reset_bits();
                    return;
                }
                let part_path = bs.part_path();
                visit_values(bs, ch, bm, |v| {
                    let n = unmarshal_uint(must_fixed_width(part_path, ValueType::IPv4, v)) as u32;
                    n >= min_value && n <= max_value
                });
            }
            _ => bm.reset_bits(),
        }
    }
}

impl fmt::Display for Ipv4RangeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut min = String::new();
        let mut max = String::new();
        append_ipv4_string(&mut min, self.min_value);
        append_ipv4_string(&mut max, self.max_value);
        write!(f, "{}ipv4_range({}, {})", quote_field_name_if_needed(&self.field_name), min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::InMemoryBlock;
    use crate::stream::StreamId;
    use crate::values::try_parse_timestamp_iso8601;

    fn run(f: impl Fn(&InMemoryBlock, &mut Bitmap), bs: &InMemoryBlock) -> Vec<usize> {
        let mut bm = Bitmap::new(bs.rows_count());
        f(bs, &mut bm);
        bm.set_indices()
    }

    #[test]
    fn test_range_uint() {
        let bs = InMemoryBlock::new("p", StreamId::default(), 4).with_uint16_column("n", &[1, 5, 10, 300]);
        let f = RangeFilter::closed("n", 1.5, 10.0);
        assert_eq!(run(|bs, bm| f.apply(bs, bm), &bs), vec![1, 2]);
        let f = RangeFilter::closed("n", -5.0, -1.0);
        assert!(run(|bs, bm| f.apply(bs, bm), &bs).is_empty());
        let f = RangeFilter::closed("n", 400.0, 500.0);
        assert!(run(|bs, bm| f.apply(bs, bm), &bs).is_empty());
        let f = RangeFilter::closed("n", 1.2, 1.8);
        assert!(run(|bs, bm| f.apply(bs, bm), &bs).is_empty());
    }

    #[test]
    fn test_range_float_and_strings() {
        let bs = InMemoryBlock::new("p", StreamId::default(), 3).with_float64_column("f", &[-1.5, 0.0, 2.25]);
        let f = RangeFilter::closed("f", -2.0, 0.0);
        assert_eq!(run(|bs, bm| f.apply(bs, bm), &bs), vec![0, 1]);

        let bs = InMemoryBlock::new("p", StreamId::default(), 3).with_string_column("s", &["12", "abc", "-3.5"]);
        let f = RangeFilter::closed("s", -4.0, 12.0);
        assert_eq!(run(|bs, bm| f.apply(bs, bm), &bs), vec![0, 2]);
    }

    #[test]
    fn test_range_other_types_and_reversed() {
        let bs = InMemoryBlock::new("p", StreamId::default(), 1).with_ipv4_column("ip", &[1]);
        let f = RangeFilter::closed("ip", 0.0, f64::MAX);
        assert!(run(|bs, bm| f.apply(bs, bm), &bs).is_empty());

        let bs = InMemoryBlock::new("p", StreamId::default(), 1).with_const_column("c", "5");
        let f = RangeFilter::closed("c", 6.0, 5.0);
        assert!(run(|bs, bm| f.apply(bs, bm), &bs).is_empty());
        let f = RangeFilter::closed("c", 5.0, 6.0);
        assert_eq!(run(|bs, bm| f.apply(bs, bm), &bs), vec![0]);
    }

    #[test]
    fn test_string_range() {
        let bs = InMemoryBlock::new("p", StreamId::default(), 4).with_string_column("s", &["apple", "banana", "cherry", ""]);
        let f = StringRangeFilter::new("s", "b", "c");
        assert_eq!(run(|bs, bm| f.apply(bs, bm), &bs), vec![1]);
        let f = StringRangeFilter::new("s", "", "b");
        assert_eq!(run(|bs, bm| f.apply(bs, bm), &bs), vec![0, 3]);

        let bs = InMemoryBlock::new("p", StreamId::default(), 3).with_uint16_column("n", &[100, 25, 3]);
        let f = StringRangeFilter::new("n", "2", "3");
        assert_eq!(run(|bs, bm| f.apply(bs, bm), &bs), vec![1]);
        let f = StringRangeFilter::new("n", "a", "z");
        assert!(run(|bs, bm| f.apply(bs, bm), &bs).is_empty());

        let bs = InMemoryBlock::new("p", StreamId::default(), 2).with_float64_column("f", &[-1.0, 2.0]);
        let f = StringRangeFilter::new("f", "-", "0");
        assert_eq!(run(|bs, bm| f.apply(bs, bm), &bs), vec![0]);

        let bs = InMemoryBlock::new("p", StreamId::default(), 2);
        let f = StringRangeFilter::new("missing", "", "a");
        assert_eq!(run(|bs, bm| f.apply(bs, bm), &bs), vec![0, 1]);
        let f = StringRangeFilter::new("missing", "a", "b");
        assert!(run(|bs, bm| f.apply(bs, bm), &bs).is_empty());
    }

    #[test]
    fn test_len_range() {
        let bs = InMemoryBlock::new("p", StreamId::default(), 3).with_string_column("s", &["ab", "日本語", "abcdef"]);
        let f = LenRangeFilter::closed("s", 2, 3);
        assert_eq!(run(|bs, bm| f.apply(bs, bm), &bs), vec![0, 1]);

        let bs = InMemoryBlock::new("p", StreamId::default(), 3).with_uint32_column("n", &[7, 42, 1000]);
        let f = LenRangeFilter::closed("n", 2, 3);
        assert_eq!(run(|bs, bm| f.apply(bs, bm), &bs), vec![1]);
        let f = LenRangeFilter::closed("n", 5, 9);
        assert!(run(|bs, bm| f.apply(bs, bm), &bs).is_empty());

        let bs = InMemoryBlock::new("p", StreamId::default(), 2).with_ipv4_column("ip", &[0x0101_0101, 0xc0a8_0a0a]);
        let f = LenRangeFilter::closed("ip", 7, 7);
        assert_eq!(run(|bs, bm| f.apply(bs, bm), &bs), vec![0]);
        let f = LenRangeFilter::closed("ip", 16, 20);
        assert!(run(|bs, bm| f.apply(bs, bm), &bs).is_empty());

        let ts = try_parse_timestamp_iso8601("2024-03-05T10:20:30.456Z").unwrap();
        let bs = InMemoryBlock::new("p", StreamId::default(), 2).with_timestamp_column("t", &[ts, ts]);
        let f = LenRangeFilter::closed("t", 0, 24);
        assert_eq!(run(|bs, bm| f.apply(bs, bm), &bs), vec![0, 1]);
        let f = LenRangeFilter::closed("t", 0, 23);
        assert!(run(|bs, bm| f.apply(bs, bm), &bs).is_empty());

        let bs = InMemoryBlock::new("p", StreamId::default(), 2);
        let f = LenRangeFilter::closed("missing", 0, 5);
        assert_eq!(run(|bs, bm| f.apply(bs, bm), &bs), vec![0, 1]);
        let f = LenRangeFilter::closed("missing", 1, 5);
        assert!(run(|bs, bm| f.apply(bs, bm), &bs).is_empty());
    }

    #[test]
    fn test_ipv4_range() {
        let bs = InMemoryBlock::new("p", StreamId::default(), 3).with_ipv4_column("ip", &[0x0a00_0001, 0x0a00_00ff, 0x0b00_0000]);
        let f = Ipv4RangeFilter::new("ip", 0x0a00_0000, 0x0a00_00ff);
        assert_eq!(run(|bs, bm| f.apply(bs, bm), &bs), vec![0, 1]);
        let f = Ipv4RangeFilter::new("ip", 0x0c00_0000, 0x0d00_0000);
        assert!(run(|bs, bm| f.apply(bs, bm), &bs).is_empty());

        let bs = InMemoryBlock::new("p", StreamId::default(), 3).with_string_column("s", &["10.0.0.5", "x", "9.0.0.1"]);
        let f = Ipv4RangeFilter::new("s", 0x0a00_0000, 0x0aff_ffff);
        assert_eq!(run(|bs, bm| f.apply(bs, bm), &bs), vec![0]);

        let bs = InMemoryBlock::new("p", StreamId::default(), 1).with_uint32_column("n", &[0x0a00_0001]);
        assert!(run(|bs, bm| f.apply(bs, bm), &bs).is_empty());
    }

    #[test]
    fn test_range_display() {
        assert_eq!(RangeFilter::new("f", 1.0, 2.0, "(1, 2]").to_string(), "f:range(1, 2]");
        assert_eq!(RangeFilter::closed("_msg", 1.5, 3.0).to_string(), "range[1.5, 3]");
        assert_eq!(StringRangeFilter::new("f", "a", "b c").to_string(), "f:string_range(a, \"b c\")");
        assert_eq!(LenRangeFilter::closed("f", 1, 5).to_string(), "f:len_range(1, 5)");
        assert_eq!(
            Ipv4RangeFilter::new("ip", 0x7f00_0000, 0x7fff_ffff).to_string(),
            "ip:ipv4_range(127.0.0.0, 127.255.255.255)"
        );
    }
}

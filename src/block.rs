//! Block search context: the per-block view a filter evaluates against.

use rustc_hash::FxHashMap;

use crate::bloom_filter::BloomFilter;
use crate::stream::StreamId;
use crate::tokenizer::tokenize_strings;
use crate::values::{
    append_binary_value_string, marshal_ipv4, marshal_uint, ValueType,
};

/// Maximum number of distinct values a dict column may hold.
pub const MAX_DICT_VALUES: usize = 256;

/// Distinct values of a dict column; rows reference them by one-byte index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValuesDict {
    pub values: Vec<String>,
}

/// Per-field metadata of a block.
///
/// `min_value`/`max_value` are reinterpreted per type: plain unsigned numbers
/// for uint/ipv4/timestamp columns and IEEE bits for float64 columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnHeader {
    pub name: String,
    pub value_type: ValueType,
    pub min_value: u64,
    pub max_value: u64,
    pub values_dict: ValuesDict,
}

impl ColumnHeader {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        ColumnHeader {
            name: name.into(),
            value_type,
            min_value: 0,
            max_value: 0,
            values_dict: ValuesDict::default(),
        }
    }
}

/// Resident block data consulted by filters.
///
/// Implementations never perform I/O from these methods: column bytes and bloom
/// filters are loaded before matching starts.
pub trait BlockSearch {
    /// Header for `name`, or `None` when the block has no such column.
    fn column_header(&self, name: &str) -> Option<&ColumnHeader>;

    /// Value shared by every row for `name`, or an empty string when the
    /// column is not constant.
    fn const_column_value(&self, name: &str) -> &str;

    /// Raw per-row values of the column described by `ch`, in row order.
    fn column_values(&self, ch: &ColumnHeader) -> &[Vec<u8>];

    /// Bloom filter of the column; an empty filter matches every token.
    fn bloom_filter(&self, ch: &ColumnHeader) -> &BloomFilter;

    fn rows_count(&self) -> usize;

    fn stream_id(&self) -> &StreamId;

    /// Location of the block for diagnostics.
    fn part_path(&self) -> &str;
}

#[derive(Debug, Clone)]
struct ColumnData {
    header: ColumnHeader,
    values: Vec<Vec<u8>>,
    bloom: BloomFilter,
}

/// In-memory [`BlockSearch`] over already decoded rows.
///
/// Column builders encode values the way the storage layer does, record
/// min/max bounds and index the tokens of every value's canonical string.
#[derive(Debug, Clone)]
pub struct InMemoryBlock {
    part_path: String,
    stream_id: StreamId,
    rows_count: usize,
    const_columns: FxHashMap<String, String>,
    columns: Vec<ColumnData>,
    column_idx: FxHashMap<String, usize>,
}

impl InMemoryBlock {
    pub fn new(part_path: impl Into<String>, stream_id: StreamId, rows_count: usize) -> Self {
        InMemoryBlock {
            part_path: part_path.into(),
            stream_id,
            rows_count,
            const_columns: FxHashMap::default(),
            columns: Vec::new(),
            column_idx: FxHashMap::default(),
        }
    }

    /// Add a column whose value is the same for every row.
    pub fn with_const_column(mut self, name: &str, value: &str) -> Self {
        self.const_columns.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_string_column(self, name: &str, values: &[&str]) -> Self {
        let bloom = BloomFilter::from_tokens(&tokenize_strings(Vec::new(), values));
        let header = ColumnHeader::new(name, ValueType::String);
        let encoded = values.iter().map(|v| v.as_bytes().to_vec()).collect();
        self.with_raw_column(header, encoded, bloom)
    }

    /// Add a dict column; rows are stored as indexes into the distinct values.
    ///
    /// Panics if there are more than [`MAX_DICT_VALUES`] distinct values.
    pub fn with_dict_column(self, name: &str, values: &[&str]) -> Self {
        let mut header = ColumnHeader::new(name, ValueType::Dict);
        let mut encoded = Vec::with_capacity(values.len());
        for v in values {
            let dict = &mut header.values_dict.values;
            let idx = match dict.iter().position(|d| d == v) {
                Some(idx) => idx,
                None => {
                    dict.push(v.to_string());
                    dict.len() - 1
                }
            };
            assert!(idx < MAX_DICT_VALUES, "too many distinct values for dict column {}", name);
            encoded.push(vec![idx as u8]);
        }
        self.with_raw_column(header, encoded, BloomFilter::default())
    }

    pub fn with_uint8_column(self, name: &str, values: &[u8]) -> Self {
        let values: Vec<u64> = values.iter().map(|&n| n as u64).collect();
        self.with_uint_column(name, ValueType::Uint8, &values)
    }

    pub fn with_uint16_column(self, name: &str, values: &[u16]) -> Self {
        let values: Vec<u64> = values.iter().map(|&n| n as u64).collect();
        self.with_uint_column(name, ValueType::Uint16, &values)
    }

    pub fn with_uint32_column(self, name: &str, values: &[u32]) -> Self {
        let values: Vec<u64> = values.iter().map(|&n| n as u64).collect();
        self.with_uint_column(name, ValueType::Uint32, &values)
    }

    pub fn with_uint64_column(self, name: &str, values: &[u64]) -> Self {
        self.with_uint_column(name, ValueType::Uint64, values)
    }

    fn with_uint_column(self, name: &str, vt: ValueType, values: &[u64]) -> Self {
        let encoded = values
            .iter()
            .map(|&n| {
                let mut buf = Vec::with_capacity(8);
                marshal_uint(vt, n, &mut buf);
                buf
            })
            .collect();
        let mut header = ColumnHeader::new(name, vt);
        header.min_value = values.iter().copied().min().unwrap_or(0);
        header.max_value = values.iter().copied().max().unwrap_or(0);
        self.with_binary_column(header, encoded)
    }

    pub fn with_float64_column(self, name: &str, values: &[f64]) -> Self {
        let encoded = values.iter().map(|f| f.to_bits().to_be_bytes().to_vec()).collect();
        let mut header = ColumnHeader::new(name, ValueType::Float64);
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !values.is_empty() {
            header.min_value = min.to_bits();
            header.max_value = max.to_bits();
        }
        self.with_binary_column(header, encoded)
    }

    pub fn with_ipv4_column(self, name: &str, values: &[u32]) -> Self {
        let encoded = values.iter().map(|&n| marshal_ipv4(n).to_vec()).collect();
        let mut header = ColumnHeader::new(name, ValueType::IPv4);
        header.min_value = values.iter().copied().min().unwrap_or(0) as u64;
        header.max_value = values.iter().copied().max().unwrap_or(0) as u64;
        self.with_binary_column(header, encoded)
    }

    /// Add an ISO8601 timestamp column from unix nanoseconds.
    pub fn with_timestamp_column(self, name: &str, values: &[u64]) -> Self {
        let encoded = values.iter().map(|n| n.to_be_bytes().to_vec()).collect();
        let mut header = ColumnHeader::new(name, ValueType::TimestampISO8601);
        header.min_value = values.iter().copied().min().unwrap_or(0);
        header.max_value = values.iter().copied().max().unwrap_or(0);
        self.with_binary_column(header, encoded)
    }

    fn with_binary_column(self, header: ColumnHeader, encoded: Vec<Vec<u8>>) -> Self {
        let mut buf = String::new();
        let mut tokens = Vec::new();
        for v in &encoded {
            buf.clear();
            append_binary_value_string(&mut buf, header.value_type, v);
            tokens = tokenize_strings(tokens, &[buf.as_str()]);
        }
        let bloom = BloomFilter::from_tokens(&tokens);
        self.with_raw_column(header, encoded, bloom)
    }

    /// Add a column from pre-encoded values and an explicit bloom filter.
    ///
    /// Panics if the number of values differs from the block's row count.
    pub fn with_raw_column(mut self, header: ColumnHeader, values: Vec<Vec<u8>>, bloom: BloomFilter) -> Self {
        assert_eq!(
            values.len(),
            self.rows_count,
            "column {} has {} values for a block of {} rows",
            header.name,
            values.len(),
            self.rows_count
        );
        self.column_idx.insert(header.name.clone(), self.columns.len());
        self.columns.push(ColumnData { header, values, bloom });
        self
    }

    fn column(&self, name: &str) -> Option<&ColumnData> {
        self.column_idx.get(name).map(|&idx| &self.columns[idx])
    }
}

impl BlockSearch for InMemoryBlock {
    fn column_header(&self, name: &str) -> Option<&ColumnHeader> {
        self.column(name).map(|c| &c.header)
    }

    fn const_column_value(&self, name: &str) -> &str {
        self.const_columns.get(name).map(String::as_str).unwrap_or("")
    }

    fn column_values(&self, ch: &ColumnHeader) -> &[Vec<u8>] {
        self.column(&ch.name).map(|c| c.values.as_slice()).unwrap_or(&[])
    }

    fn bloom_filter(&self, ch: &ColumnHeader) -> &BloomFilter {
        static EMPTY: BloomFilter = BloomFilter::empty();
        self.column(&ch.name).map(|c| &c.bloom).unwrap_or(&EMPTY)
    }

    fn rows_count(&self) -> usize {
        self.rows_count
    }

    fn stream_id(&self) -> &StreamId {
        &self.stream_id
    }

    fn part_path(&self) -> &str {
        &self.part_path
    }
}

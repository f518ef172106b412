#![allow(dead_code)]

use std::cell::Cell;

use logfilter::{Bitmap, BlockSearch, BloomFilter, ColumnHeader, Filter, InMemoryBlock, StreamId, TenantId};

pub fn stream_id(id: u128) -> StreamId {
    StreamId {
        tenant_id: TenantId {
            account_id: 0,
            project_id: 0,
        },
        id,
    }
}

/// Access-log block with one column of every value type.
pub fn access_log_block() -> InMemoryBlock {
    let ts = |s: &str| logfilter::values::try_parse_timestamp_iso8601(s).unwrap_or_default();
    InMemoryBlock::new("data/partitions/20240305/small/0001", stream_id(7), 4)
        .with_const_column("host", "web-01")
        .with_string_column(
            "_msg",
            &[
                "GET /api/users 200 OK",
                "POST /api/login failed for user=Alice",
                "GET /static/app.js",
                "connection reset by peer",
            ],
        )
        .with_dict_column("level", &["info", "warn", "info", "error"])
        .with_uint8_column("retries", &[0, 3, 0, 7])
        .with_uint16_column("status", &[200, 401, 304, 502])
        .with_uint32_column("bytes", &[5120, 87, 0, 1048576])
        .with_uint64_column("trace", &[12345678901234, 1, 42, 12345678900000])
        .with_float64_column("duration", &[0.25, 1.5, 0.003, 30.0])
        .with_ipv4_column("client_ip", &[0x0a00_0001, 0xc0a8_0105, 0x0a00_0002, 0x0808_0808])
        .with_timestamp_column(
            "time",
            &[
                ts("2024-03-05T10:20:30.000Z"),
                ts("2024-03-05T10:20:31.500Z"),
                ts("2024-03-05T11:00:00.000Z"),
                ts("2024-03-06T00:00:00.001Z"),
            ],
        )
}

/// Rows left after applying `f` to a fresh all-set bitmap.
pub fn matching_rows(f: impl Into<Filter>, bs: &InMemoryBlock) -> Vec<usize> {
    let f: Filter = f.into();
    let mut bm = Bitmap::new(bs.rows_count());
    f.apply(bs, &mut bm);
    bm.set_indices()
}

/// Block wrapper that counts column scans and can serve short columns.
pub struct CountingBlock {
    inner: InMemoryBlock,
    scans: Cell<usize>,
    values_limit: Option<usize>,
}

impl CountingBlock {
    pub fn new(inner: InMemoryBlock) -> Self {
        CountingBlock {
            inner,
            scans: Cell::new(0),
            values_limit: None,
        }
    }

    /// Serve at most `n` values per column.
    pub fn truncated(inner: InMemoryBlock, n: usize) -> Self {
        CountingBlock {
            values_limit: Some(n),
            ..CountingBlock::new(inner)
        }
    }

    /// Number of `column_values` calls since the last call.
    pub fn take_scans(&self) -> usize {
        self.scans.replace(0)
    }

    /// Rows left after applying `f` to a fresh all-set bitmap.
    pub fn matching_rows(&self, f: impl Into<Filter>) -> Vec<usize> {
        let f: Filter = f.into();
        let mut bm = Bitmap::new(self.rows_count());
        f.apply(self, &mut bm);
        bm.set_indices()
    }
}

impl BlockSearch for CountingBlock {
    fn column_header(&self, name: &str) -> Option<&ColumnHeader> {
        self.inner.column_header(name)
    }

    fn const_column_value(&self, name: &str) -> &str {
        self.inner.const_column_value(name)
    }

    fn column_values(&self, ch: &ColumnHeader) -> &[Vec<u8>] {
        self.scans.set(self.scans.get() + 1);
        let values = self.inner.column_values(ch);
        match self.values_limit {
            Some(n) if n < values.len() => &values[..n],
            _ => values,
        }
    }

    fn bloom_filter(&self, ch: &ColumnHeader) -> &BloomFilter {
        self.inner.bloom_filter(ch)
    }

    fn rows_count(&self) -> usize {
        self.inner.rows_count()
    }

    fn stream_id(&self) -> &StreamId {
        self.inner.stream_id()
    }

    fn part_path(&self) -> &str {
        self.inner.part_path()
    }
}

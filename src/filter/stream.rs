use std::fmt;
use std::sync::{Arc, OnceLock};

use rustc_hash::FxHashSet;

use crate::bitmap::Bitmap;
use crate::block::BlockSearch;
use crate::stream::{StreamFilter, StreamId, StreamIndex, TenantId};

/// `_stream:{...}`: keep blocks whose stream matches the selector.
///
/// The selector is resolved into stream ids through the index on first use;
/// later blocks only do a set lookup.
pub struct StreamIdFilter {
    filter: StreamFilter,
    tenant_ids: Vec<TenantId>,
    index: Arc<dyn StreamIndex>,
    stream_ids: OnceLock<FxHashSet<StreamId>>,
}

impl StreamIdFilter {
    pub fn new(filter: StreamFilter, tenant_ids: Vec<TenantId>, index: Arc<dyn StreamIndex>) -> Self {
        StreamIdFilter {
            filter,
            tenant_ids,
            index,
            stream_ids: OnceLock::new(),
        }
    }

    fn stream_ids(&self) -> &FxHashSet<StreamId> {
        self.stream_ids.get_or_init(|| {
            let ids: FxHashSet<StreamId> = self
                .index
                .search_stream_ids(&self.tenant_ids, &self.filter)
                .into_iter()
                .collect();
            tracing::debug!(filter = %self.filter, streams = ids.len(), "resolved stream filter");
            ids
        })
    }

    pub fn apply(&self, bs: &dyn BlockSearch, bm: &mut Bitmap) {
        if self.filter.is_empty() {
            return;
        }
        if !self.stream_ids().contains(bs.stream_id()) {
            bm.reset_bits();
        }
    }
}

impl fmt::Debug for StreamIdFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamIdFilter")
            .field("filter", &self.filter)
            .field("tenant_ids", &self.tenant_ids)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for StreamIdFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.filter.is_empty() {
            return Ok(());
        }
        write!(f, "_stream:{}", self.filter)
    }
}

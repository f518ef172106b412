mod common;

use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use common::{access_log_block, stream_id};
use logfilter::{
    apply_filters, Bitmap, BlockSearch, Filter, InMemoryBlock, PhraseFilter, StreamFilter, StreamId, StreamIdFilter,
    StreamIndex, StreamTagFilter, StreamTagOp, TenantId,
};

#[derive(Default)]
struct CountingIndex {
    calls: AtomicUsize,
}

impl StreamIndex for CountingIndex {
    fn search_stream_ids(&self, tenant_ids: &[TenantId], _filter: &StreamFilter) -> Vec<StreamId> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(tenant_ids, &[TenantId::default()]);
        vec![stream_id(7), stream_id(8)]
    }
}

fn app_selector(app: &str) -> StreamFilter {
    StreamFilter::new(vec![vec![StreamTagFilter {
        tag_name: "app".to_string(),
        op: StreamTagOp::Equal,
        value: app.to_string(),
    }]])
}

#[test]
fn test_stream_filter_shared_across_workers() -> Result<(), Box<dyn Error>> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let index = Arc::new(CountingIndex::default());
    let filter: Arc<Filter> = Arc::new(
        StreamIdFilter::new(app_selector("nginx"), vec![TenantId::default()], index.clone()).into(),
    );

    let handles: Vec<_> = (0..8u128)
        .map(|i| {
            let filter = Arc::clone(&filter);
            thread::spawn(move || {
                let bs = InMemoryBlock::new(format!("part/{}", i), stream_id(i + 4), 3);
                let mut bm = Bitmap::new(bs.rows_count());
                filter.apply(&bs, &mut bm);
                (i + 4, bm.ones_count())
            })
        })
        .collect();

    for h in handles {
        let (id, ones) = h.join().map_err(|_| "worker panicked")?;
        let want = if id == 7 || id == 8 { 3 } else { 0 };
        assert_eq!(ones, want, "stream {}", id);
    }
    assert_eq!(index.calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn test_stream_filter_combined_with_field_filters() -> Result<(), Box<dyn Error>> {
    let index = Arc::new(CountingIndex::default());
    let filters: Vec<Filter> = vec![
        StreamIdFilter::new(app_selector("nginx"), vec![TenantId::default()], index.clone()).into(),
        PhraseFilter::new("_msg", "GET").into(),
    ];
    let bs = access_log_block();
    let mut bm = Bitmap::new(bs.rows_count());
    apply_filters(&filters, &bs, &mut bm);
    assert_eq!(bm.set_indices(), vec![0, 2]);
    assert_eq!(filters[0].to_string(), r#"_stream:{app="nginx"}"#);
    Ok(())
}

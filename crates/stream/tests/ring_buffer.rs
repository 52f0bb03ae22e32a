//! Ring-buffer transport integration tests: sizing, accounting,
//! SPSC byte-exactness and the shared-buffer cache-maintenance contract.

#![allow(clippy::expect_used)] // Tests use expect() for readable assertions

use std::cell::RefCell;
use std::ops::Range;
use std::rc::Rc;

use stream::{CacheOps, CoreError, NullCache, RingBuffer, Sink, Source};

/// Records every cache operation for later inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CacheCall {
    Writeback(Range<usize>),
    Invalidate(Range<usize>),
}

#[derive(Clone, Default)]
struct RecordingCache {
    calls: Rc<RefCell<Vec<CacheCall>>>,
}

impl CacheOps for RecordingCache {
    fn writeback(&mut self, range: Range<usize>) {
        self.calls.borrow_mut().push(CacheCall::Writeback(range));
    }

    fn invalidate(&mut self, range: Range<usize>) {
        self.calls.borrow_mut().push(CacheCall::Invalidate(range));
    }
}

/// End-to-end accounting scenario: 384-byte buffer (3 x 128), writer
/// commits 200 bytes, reader releases 120. Free must be 304 and
/// available 80.
#[test]
fn accounting_after_commit_and_partial_read() {
    let mut rb = RingBuffer::new(128, 128, false, NullCache).expect("buffer must allocate");
    assert_eq!(rb.capacity(), 384);

    rb.get_buffer(200).expect("384 free at start");
    rb.commit(200);
    rb.get_data(120).expect("200 available");
    rb.release(120);

    assert_eq!(rb.free(), 304);
    assert_eq!(rb.available(), 80);
}

/// Every committed byte is read exactly once, in order, across many
/// wrap-arounds with mismatched producer/consumer block sizes.
#[test]
fn spsc_bytes_read_once_in_order() {
    let mut rb = RingBuffer::new(48, 64, false, NullCache).expect("buffer must allocate");
    let mut produced: u64 = 0;
    let mut consumed: u64 = 0;

    for round in 0..2000 {
        // Producer: variable chunk size, skip when short on space.
        let chunk = 1 + (round * 7) % 61;
        if rb.free() >= chunk {
            let mut bytes = vec![0u8; chunk];
            for b in bytes.iter_mut() {
                *b = (produced % 251) as u8;
                produced += 1;
            }
            let mut region = rb.get_buffer(chunk).expect("free space checked");
            region.write_wrapped(&bytes);
            rb.commit(chunk);
        }

        // Consumer: different cadence.
        let want = 1 + (round * 11) % 53;
        let take = want.min(rb.available());
        if take > 0 {
            let mut out = vec![0u8; take];
            rb.get_data(take).expect("availability checked").read_wrapped(&mut out);
            rb.release(take);
            for &b in &out {
                assert_eq!(b, (consumed % 251) as u8, "byte order broken at {consumed}");
                consumed += 1;
            }
        }
    }
    assert!(consumed > 0 && consumed <= produced);
}

/// Non-shared buffers must perform no cache maintenance at all.
#[test]
fn non_shared_buffer_performs_no_cache_ops() {
    let cache = RecordingCache::default();
    let calls = cache.calls.clone();
    let mut rb = RingBuffer::new(128, 128, false, cache).expect("buffer must allocate");

    rb.commit(100);
    rb.get_data(50).expect("data present");
    rb.release(50);
    rb.on_unbind();

    assert!(calls.borrow().is_empty());
}

/// Shared-buffer commit writes back the just-written region; a region
/// crossing the end of the store splits into exactly two writebacks
/// whose lengths sum to the commit size.
#[test]
fn shared_commit_writeback_splits_at_wrap() {
    let cache = RecordingCache::default();
    let calls = cache.calls.clone();
    let mut rb = RingBuffer::new(128, 128, true, cache).expect("buffer must allocate");
    let size = rb.capacity(); // 384

    // Move the write offset near the end, consuming as we go.
    rb.commit(300);
    rb.release(300);
    calls.borrow_mut().clear();

    // 120 bytes from offset 300 wrap 36 bytes past the end.
    rb.commit(120);
    let recorded = calls.borrow().clone();
    assert_eq!(
        recorded,
        vec![
            CacheCall::Writeback(300..size),
            CacheCall::Writeback(0..36),
        ]
    );
}

/// Shared-buffer reads invalidate the covered range before the data
/// pointer is handed out, split at the wrap like commits.
#[test]
fn shared_get_data_invalidates_with_wrap_split() {
    let cache = RecordingCache::default();
    let calls = cache.calls.clone();
    let mut rb = RingBuffer::new(128, 128, true, cache).expect("buffer must allocate");
    let size = rb.capacity();

    rb.commit(300);
    rb.release(280);
    rb.commit(150); // write offset now past the wrap
    calls.borrow_mut().clear();

    // Read offset is at 280; requesting 150 crosses the end by 46.
    rb.get_data(150).expect("150 available");
    let recorded = calls.borrow().clone();
    assert_eq!(
        recorded,
        vec![
            CacheCall::Invalidate(280..size),
            CacheCall::Invalidate(0..46),
        ]
    );
}

/// Unbind invalidates the entire backing region.
#[test]
fn shared_unbind_invalidates_whole_store() {
    let cache = RecordingCache::default();
    let calls = cache.calls.clone();
    let mut rb = RingBuffer::new(128, 128, true, cache).expect("buffer must allocate");
    let size = rb.capacity();
    calls.borrow_mut().clear();

    rb.on_unbind();
    assert_eq!(calls.borrow().clone(), vec![CacheCall::Invalidate(0..size)]);
}

/// Reset on a shared buffer invalidates, zeroes, then forces the zeroed
/// contents out with a writeback.
#[test]
fn shared_reset_invalidate_then_writeback() {
    let cache = RecordingCache::default();
    let calls = cache.calls.clone();
    let mut rb = RingBuffer::new(128, 128, true, cache).expect("buffer must allocate");
    let size = rb.capacity();
    rb.commit(64);
    calls.borrow_mut().clear();

    rb.reset();
    assert_eq!(
        calls.borrow().clone(),
        vec![
            CacheCall::Invalidate(0..size),
            CacheCall::Writeback(0..size),
        ]
    );
    assert_eq!(rb.available(), 0);
}

/// A failed acquisition leaves the buffer untouched.
#[test]
fn failed_requests_leave_offsets_unchanged() {
    let mut rb = RingBuffer::new(128, 128, false, NullCache).expect("buffer must allocate");
    rb.commit(40);

    assert_eq!(rb.get_data(41).err(), Some(CoreError::NoData));
    assert_eq!(rb.available(), 40);

    let free = rb.free();
    assert_eq!(rb.get_buffer(free + 1).err(), Some(CoreError::NoData));
    assert_eq!(rb.free(), free);
}

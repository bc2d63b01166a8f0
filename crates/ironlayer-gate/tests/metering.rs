// ironlayer-gate/tests/metering.rs
// ============================================================================
// Module: Metering Collector Tests
// Description: Tests for buffering, flush triggers, and lifecycle.
// ============================================================================
//! ## Overview
//! Validates event shape, the size-triggered flush, drain-before-await,
//! best-effort sink failure handling, and idempotent start/stop of the
//! background ticker.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use ironlayer_core::MeteringEvent;
use ironlayer_core::MeteringEventKind;
use ironlayer_core::TenantId;
use ironlayer_gate::MeteringCollector;
use ironlayer_gate::MeteringSink;
use ironlayer_gate::SinkError;

// ============================================================================
// SECTION: Recording Sink
// ============================================================================

/// A sink that records flushed batches and can be made to fail.
#[derive(Default)]
struct RecordingSink {
    /// Every flushed batch.
    batches: Mutex<Vec<Vec<MeteringEvent>>>,
    /// Flush invocation count.
    flushes: AtomicUsize,
    /// When set, flushes fail.
    failing: AtomicBool,
}

#[async_trait]
impl MeteringSink for RecordingSink {
    async fn flush(&self, events: Vec<MeteringEvent>) -> Result<(), SinkError> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::Flush("sink offline".to_string()));
        }
        self.batches
            .lock()
            .map_err(|_| SinkError::Flush("poisoned".to_string()))?
            .push(events);
        Ok(())
    }
}

/// Builds a collector over a fresh recording sink.
fn collector(max_buffer: usize) -> (MeteringCollector, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let collector = MeteringCollector::new(sink.clone(), max_buffer, Duration::from_secs(5));
    (collector, sink)
}

// ============================================================================
// SECTION: Buffering
// ============================================================================

/// Tests the collector starts empty and counts pending events.
#[tokio::test]
async fn test_pending_counts() {
    let (collector, _sink) = collector(100);
    assert_eq!(collector.pending(), 0);

    collector
        .record_simple(TenantId::new("alpha"), MeteringEventKind::PlanRun)
        .await;
    collector
        .record_simple(TenantId::new("alpha"), MeteringEventKind::AiCall)
        .await;
    assert_eq!(collector.pending(), 2);
}

/// Tests flushing drains the buffer and hands the batch to the sink.
#[tokio::test]
async fn test_flush_drains_buffer() {
    let (collector, sink) = collector(100);
    collector
        .record_simple(TenantId::new("alpha"), MeteringEventKind::PlanRun)
        .await;
    collector
        .record_simple(TenantId::new("alpha"), MeteringEventKind::PlanApply)
        .await;

    let drained = collector.flush().await;
    assert_eq!(drained, 2);
    assert_eq!(collector.pending(), 0);

    let batches = sink.batches.lock().unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 2);
}

/// Tests flushing an empty buffer skips the sink.
#[tokio::test]
async fn test_empty_flush_skips_sink() {
    let (collector, sink) = collector(100);
    assert_eq!(collector.flush().await, 0);
    assert_eq!(sink.flushes.load(Ordering::SeqCst), 0);
}

/// Tests the buffer auto-flushes at capacity.
#[tokio::test]
async fn test_auto_flush_at_capacity() {
    let (collector, sink) = collector(3);
    for _ in 0..2 {
        collector
            .record_simple(TenantId::new("alpha"), MeteringEventKind::ApiRequest)
            .await;
    }
    assert_eq!(sink.flushes.load(Ordering::SeqCst), 0);

    collector
        .record_simple(TenantId::new("alpha"), MeteringEventKind::ApiRequest)
        .await;
    assert_eq!(sink.flushes.load(Ordering::SeqCst), 1);
    assert_eq!(collector.pending(), 0);
}

// ============================================================================
// SECTION: Event Shape
// ============================================================================

/// Tests events carry evt- identifiers, quantities, and metadata.
#[tokio::test]
async fn test_event_shape() {
    let (collector, sink) = collector(100);
    let mut metadata = BTreeMap::new();
    metadata.insert("models".to_string(), "7".to_string());
    collector
        .record(
            TenantId::new("alpha"),
            MeteringEventKind::ModelLoaded,
            7,
            metadata,
        )
        .await;
    collector.flush().await;

    let batches = sink.batches.lock().unwrap();
    let event = &batches[0][0];
    assert!(event.event_id.starts_with("evt-"));
    assert_eq!(event.tenant_id.as_str(), "alpha");
    assert_eq!(event.event_type, MeteringEventKind::ModelLoaded);
    assert_eq!(event.quantity, 7);
    assert_eq!(event.metadata["models"], "7");
}

/// Tests event identifiers are unique.
#[tokio::test]
async fn test_event_ids_unique() {
    let (collector, sink) = collector(100);
    for _ in 0..5 {
        collector
            .record_simple(TenantId::new("alpha"), MeteringEventKind::PlanRun)
            .await;
    }
    collector.flush().await;

    let batches = sink.batches.lock().unwrap();
    let mut ids: Vec<&str> = batches[0].iter().map(|e| e.event_id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 5);
}

// ============================================================================
// SECTION: Failure Handling
// ============================================================================

/// Tests a failing sink drops the batch without blocking producers.
#[tokio::test]
async fn test_failing_sink_drops_events() {
    let (collector, sink) = collector(100);
    sink.failing.store(true, Ordering::SeqCst);

    collector
        .record_simple(TenantId::new("alpha"), MeteringEventKind::PlanRun)
        .await;
    let drained = collector.flush().await;
    assert_eq!(drained, 1);
    // The buffer was cleared before the sink ran; the events are gone.
    assert_eq!(collector.pending(), 0);
    assert!(sink.batches.lock().unwrap().is_empty());

    // Recording continues unaffected.
    sink.failing.store(false, Ordering::SeqCst);
    collector
        .record_simple(TenantId::new("alpha"), MeteringEventKind::PlanRun)
        .await;
    assert_eq!(collector.flush().await, 1);
}

// ============================================================================
// SECTION: Background Lifecycle
// ============================================================================

/// Tests the background ticker flushes on its cadence.
#[tokio::test]
async fn test_background_flush_ticks() {
    let sink = Arc::new(RecordingSink::default());
    let collector = MeteringCollector::new(sink.clone(), 100, Duration::from_millis(20));
    collector
        .record_simple(TenantId::new("alpha"), MeteringEventKind::PlanRun)
        .await;

    collector.start_background_flush();
    tokio::time::sleep(Duration::from_millis(80)).await;
    collector.stop_background_flush();

    assert_eq!(collector.pending(), 0);
    assert!(!sink.batches.lock().unwrap().is_empty());
}

/// Tests start and stop are both idempotent.
#[tokio::test]
async fn test_start_stop_idempotent() {
    let (collector, _sink) = collector(100);
    collector.start_background_flush();
    collector.start_background_flush();
    collector.stop_background_flush();
    collector.stop_background_flush();
}

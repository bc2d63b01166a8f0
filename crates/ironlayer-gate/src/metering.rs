// ironlayer-gate/src/metering.rs
// ============================================================================
// Module: Metering Collector
// Description: Buffered usage events with a background flusher.
// Purpose: Record tenant usage without back-pressuring the request path.
// Dependencies: ironlayer-core, tokio, async-trait, uuid
// ============================================================================

//! ## Overview
//! Usage events accumulate in an in-memory buffer with two flush triggers:
//! reaching `max_buffer_size`, and a background ticker every
//! `flush_interval_seconds`. The buffer is drained before the sink is
//! awaited, so a slow or failing sink never back-pressures producers; sink
//! failures are logged and the events dropped. This is best-effort
//! telemetry, not audit. Starting and stopping the background flusher are
//! both idempotent.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use ironlayer_core::MeteringEvent;
use ironlayer_core::MeteringEventKind;
use ironlayer_core::TenantId;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::warn;
use uuid::Uuid;

// ============================================================================
// SECTION: Sink
// ============================================================================

/// Sink failures.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink could not persist the batch.
    #[error("metering sink error: {0}")]
    Flush(String),
}

/// Destination for flushed event batches.
#[async_trait]
pub trait MeteringSink: Send + Sync {
    /// Persists one drained batch.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the batch cannot be persisted; the
    /// collector logs and drops the events.
    async fn flush(&self, events: Vec<MeteringEvent>) -> Result<(), SinkError>;
}

// ============================================================================
// SECTION: Collector
// ============================================================================

/// Shared collector state.
struct Inner {
    /// Pending events.
    buffer: Mutex<Vec<MeteringEvent>>,
    /// Flush destination.
    sink: Arc<dyn MeteringSink>,
    /// Buffer size that triggers an immediate flush.
    max_buffer_size: usize,
    /// Background ticker cadence.
    flush_interval: Duration,
    /// Background ticker handle; present while running.
    ticker: Mutex<Option<JoinHandle<()>>>,
}

/// Buffered usage event collector.
#[derive(Clone)]
pub struct MeteringCollector {
    /// Shared state.
    inner: Arc<Inner>,
}

impl MeteringCollector {
    /// Creates a collector over the given sink.
    #[must_use]
    pub fn new(
        sink: Arc<dyn MeteringSink>,
        max_buffer_size: usize,
        flush_interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                buffer: Mutex::new(Vec::new()),
                sink,
                max_buffer_size,
                flush_interval,
                ticker: Mutex::new(None),
            }),
        }
    }

    /// Records one usage event, flushing when the buffer fills.
    pub async fn record(
        &self,
        tenant_id: TenantId,
        event_type: MeteringEventKind,
        quantity: u64,
        metadata: BTreeMap<String, String>,
    ) {
        let event = MeteringEvent {
            event_id: format!("evt-{}", Uuid::new_v4()),
            tenant_id,
            event_type,
            quantity,
            metadata,
            timestamp: Utc::now(),
        };

        let should_flush = {
            let Ok(mut buffer) = self.inner.buffer.lock() else {
                return;
            };
            buffer.push(event);
            buffer.len() >= self.inner.max_buffer_size
        };

        if should_flush {
            self.flush().await;
        }
    }

    /// Records one event with quantity one and no metadata.
    pub async fn record_simple(&self, tenant_id: TenantId, event_type: MeteringEventKind) {
        self.record(tenant_id, event_type, 1, BTreeMap::new()).await;
    }

    /// Returns the number of buffered events.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.buffer.lock().map(|buffer| buffer.len()).unwrap_or(0)
    }

    /// Drains the buffer and hands the batch to the sink.
    ///
    /// The buffer is cleared before the sink is awaited. Returns the number
    /// of events drained; sink failures drop the batch with a warning.
    pub async fn flush(&self) -> usize {
        let batch = {
            let Ok(mut buffer) = self.inner.buffer.lock() else {
                return 0;
            };
            std::mem::take(&mut *buffer)
        };
        if batch.is_empty() {
            return 0;
        }
        let drained = batch.len();
        if let Err(err) = self.inner.sink.flush(batch).await {
            warn!(error = %err, dropped = drained, "metering flush failed; events dropped");
        }
        drained
    }

    /// Starts the background ticker. Calling twice does not create a
    /// second ticker.
    pub fn start_background_flush(&self) {
        let Ok(mut ticker) = self.inner.ticker.lock() else {
            return;
        };
        if ticker.is_some() {
            return;
        }
        let collector = self.clone();
        let interval = self.inner.flush_interval;
        *ticker = Some(tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                timer.tick().await;
                let drained = collector.flush().await;
                if drained > 0 {
                    debug!(drained, "metering background flush");
                }
            }
        }));
    }

    /// Stops the background ticker. Idempotent; part of graceful shutdown.
    pub fn stop_background_flush(&self) {
        let Ok(mut ticker) = self.inner.ticker.lock() else {
            return;
        };
        if let Some(handle) = ticker.take() {
            handle.abort();
        }
    }
}

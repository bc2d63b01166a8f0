// ironlayer-recon/src/scheduler.rs
// ============================================================================
// Module: Cooperative Scheduler
// Description: Single background task driving cron-scheduled jobs.
// Purpose: Run periodic reconciliation without a thread pool.
// Dependencies: tokio, chrono, crate::cron
// ============================================================================

//! ## Overview
//! One background task sleeps for the configured interval, wakes, checks
//! the cancellation flag, runs every enabled schedule whose `next_run_at`
//! has passed (sequentially, never in parallel), and updates `last_run_at`
//! and `next_run_at` from the schedule's cron expression. `start` is
//! idempotent: calling it twice never spawns a second loop. `stop` sets
//! the flag; the loop observes it on its next wake and exits.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::DateTime;
use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::info;
use tracing::warn;

use crate::cron::compute_next_run;

// ============================================================================
// SECTION: Schedule
// ============================================================================

/// One periodic job registration.
#[derive(Debug, Clone)]
pub struct Schedule {
    /// Schedule identifier.
    pub schedule_id: String,
    /// Cron expression within the supported grammar.
    pub cron: String,
    /// Whether the schedule runs.
    pub enabled: bool,
    /// Last execution time.
    pub last_run_at: Option<DateTime<Utc>>,
    /// Next due time; absent until first computed.
    pub next_run_at: Option<DateTime<Utc>>,
}

/// Work executed when a schedule is due.
#[async_trait::async_trait]
pub trait ScheduledJob: Send + Sync {
    /// Runs the job for one due schedule.
    ///
    /// # Errors
    ///
    /// Returns a message describing the failure; the scheduler logs it and
    /// keeps going.
    async fn run(&self, schedule_id: &str) -> Result<(), String>;
}

// ============================================================================
// SECTION: Scheduler
// ============================================================================

/// Shared scheduler state.
struct Inner {
    /// Registered schedules.
    schedules: Mutex<Vec<Schedule>>,
    /// Cancellation flag checked on each wake.
    stopping: AtomicBool,
    /// Loop task handle; present while started.
    handle: Mutex<Option<JoinHandle<()>>>,
    /// Sleep between wakes.
    check_interval: Duration,
}

/// The cooperative scheduler.
#[derive(Clone)]
pub struct Scheduler {
    /// Shared state.
    inner: Arc<Inner>,
}

impl Scheduler {
    /// Creates a scheduler with the given wake interval.
    #[must_use]
    pub fn new(check_interval: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                schedules: Mutex::new(Vec::new()),
                stopping: AtomicBool::new(false),
                handle: Mutex::new(None),
                check_interval,
            }),
        }
    }

    /// Registers a schedule, computing its first due time.
    pub fn register(&self, mut schedule: Schedule, now: DateTime<Utc>) {
        if schedule.next_run_at.is_none() {
            schedule.next_run_at = compute_next_run(&schedule.cron, now).ok();
        }
        if let Ok(mut schedules) = self.inner.schedules.lock() {
            schedules.push(schedule);
        }
    }

    /// Returns a copy of the registered schedules.
    #[must_use]
    pub fn schedules(&self) -> Vec<Schedule> {
        self.inner
            .schedules
            .lock()
            .map(|schedules| schedules.clone())
            .unwrap_or_default()
    }

    /// Starts the background loop. Idempotent.
    pub fn start(&self, job: Arc<dyn ScheduledJob>) {
        let Ok(mut handle) = self.inner.handle.lock() else {
            return;
        };
        if handle.is_some() {
            return;
        }
        self.inner.stopping.store(false, Ordering::SeqCst);

        let inner = Arc::clone(&self.inner);
        *handle = Some(tokio::spawn(async move {
            info!("scheduler loop started");
            loop {
                tokio::time::sleep(inner.check_interval).await;
                if inner.stopping.load(Ordering::SeqCst) {
                    info!("scheduler loop stopping");
                    break;
                }
                run_due_schedules(&inner, job.as_ref()).await;
            }
        }));
    }

    /// Signals the loop to stop at its next wake. Idempotent.
    pub fn stop(&self) {
        self.inner.stopping.store(true, Ordering::SeqCst);
    }

    /// Returns true when the loop has been started and not yet joined.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.inner
            .handle
            .lock()
            .map(|handle| handle.is_some())
            .unwrap_or(false)
    }

    /// Runs every due schedule once, outside the background loop.
    ///
    /// Used by the enterprise trigger endpoint and by tests; the loop calls
    /// the same path on each wake.
    pub async fn tick(&self, job: &dyn ScheduledJob) {
        run_due_schedules(&self.inner, job).await;
    }
}

// ============================================================================
// SECTION: Loop Body
// ============================================================================

/// Executes due schedules sequentially and advances their due times.
async fn run_due_schedules(inner: &Inner, job: &dyn ScheduledJob) {
    let now = Utc::now();
    let due: Vec<Schedule> = {
        let Ok(schedules) = inner.schedules.lock() else {
            return;
        };
        schedules
            .iter()
            .filter(|schedule| {
                schedule.enabled
                    && schedule.next_run_at.is_some_and(|next| next <= now)
            })
            .cloned()
            .collect()
    };

    for schedule in due {
        if let Err(message) = job.run(&schedule.schedule_id).await {
            warn!(schedule_id = %schedule.schedule_id, error = %message, "scheduled job failed");
        }
        let completed = Utc::now();
        let next = compute_next_run(&schedule.cron, completed).ok();
        if let Ok(mut schedules) = inner.schedules.lock()
            && let Some(entry) = schedules
                .iter_mut()
                .find(|entry| entry.schedule_id == schedule.schedule_id)
        {
            entry.last_run_at = Some(completed);
            entry.next_run_at = next;
        }
    }
}

use std::{collections::HashMap, sync::Arc, time::Duration};

use rand::Rng;
use shared::{
    domain::{FileId, FileRecord, FileStatus, RawFileInput},
    error::EngineError,
};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(200);
pub const DEFAULT_PROGRESS_STEP: u8 = 10;
pub const DEFAULT_PHASE_MIN: Duration = Duration::from_millis(2000);
pub const DEFAULT_PHASE_SPAN: Duration = Duration::from_millis(1000);
const BATCH_SETTLE_BASE: Duration = Duration::from_millis(2000);
const BATCH_SETTLE_PER_FILE: Duration = Duration::from_millis(500);
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Source of phase and batch-settle durations. Injectable so tests can pin
/// the otherwise randomized timings.
pub trait PhaseDurations: Send + Sync {
    /// Duration of one upload or process phase for a single record.
    fn phase_duration(&self) -> Duration;

    /// How long one intake call keeps the intake gate held, scaled by the
    /// number of files accepted together.
    fn batch_settle_duration(&self, file_count: usize) -> Duration {
        BATCH_SETTLE_BASE + BATCH_SETTLE_PER_FILE * file_count as u32
    }
}

/// Production duration source: uniform draw from `[min, min + span)`.
#[derive(Debug, Clone, Copy)]
pub struct RandomizedDurations {
    phase_min: Duration,
    phase_span: Duration,
}

impl RandomizedDurations {
    pub fn new(phase_min: Duration, phase_span: Duration) -> Self {
        Self {
            phase_min,
            phase_span,
        }
    }
}

impl Default for RandomizedDurations {
    fn default() -> Self {
        Self::new(DEFAULT_PHASE_MIN, DEFAULT_PHASE_SPAN)
    }
}

impl PhaseDurations for RandomizedDurations {
    fn phase_duration(&self) -> Duration {
        if self.phase_span.is_zero() {
            return self.phase_min;
        }
        let jitter = rand::thread_rng().gen_range(0..self.phase_span.as_millis() as u64);
        self.phase_min + Duration::from_millis(jitter)
    }
}

/// Deterministic duration source. Every phase and every batch-settle window
/// lasts exactly the given duration.
#[derive(Debug, Clone, Copy)]
pub struct FixedDurations(pub Duration);

impl PhaseDurations for FixedDurations {
    fn phase_duration(&self) -> Duration {
        self.0
    }

    fn batch_settle_duration(&self, _file_count: usize) -> Duration {
        self.0
    }
}

/// Notifications the engine broadcasts as its timers fire. Progress ticks and
/// status changes come from independently scheduled timers; the
/// `StatusChanged` event is the sole authority for a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    ProgressTicked { id: FileId, progress: u8 },
    StatusChanged { id: FileId, status: FileStatus },
    RecordRemoved { id: FileId },
}

/// Timing knobs for the progress ramp.
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    pub tick_period: Duration,
    pub progress_step: u8,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            tick_period: DEFAULT_TICK_PERIOD,
            progress_step: DEFAULT_PROGRESS_STEP,
        }
    }
}

struct PhaseTasks {
    tick: JoinHandle<()>,
    completion: JoinHandle<()>,
}

#[derive(Default)]
struct EngineInner {
    records: Vec<FileRecord>,
    phase_tasks: HashMap<FileId, PhaseTasks>,
    settle_tasks: Vec<JoinHandle<()>>,
    // Count of intake batches whose settle window is still open.
    open_intake_gates: usize,
}

/// Owns the file collection and drives each record through its upload and
/// process phases.
///
/// Each phase schedules two independent timers: a repeating tick that ramps
/// `progress` by a fixed step, and a one-shot completion timer that performs
/// the status transition and forces `progress` to 100. The two are not
/// synchronized; progress may reach 100 before or after completion fires.
///
/// All mutation of the collection goes through the single inner mutex, so a
/// tick or completion for one record is applied atomically and never
/// reordered against other writes to that record.
pub struct LifecycleEngine {
    durations: Arc<dyn PhaseDurations>,
    options: EngineOptions,
    inner: Mutex<EngineInner>,
    events: broadcast::Sender<EngineEvent>,
}

impl LifecycleEngine {
    pub fn new(durations: Arc<dyn PhaseDurations>) -> Arc<Self> {
        Self::with_options(durations, EngineOptions::default())
    }

    pub fn with_options(durations: Arc<dyn PhaseDurations>, options: EngineOptions) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            durations,
            options,
            inner: Mutex::new(EngineInner::default()),
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Accepts a batch of picked files. Each becomes a record in `Uploading`
    /// with progress 0 and gets its own independent upload phase; batches
    /// from separate calls never interfere. Returns the new ids in input
    /// order.
    pub async fn intake(self: &Arc<Self>, inputs: Vec<RawFileInput>) -> Vec<FileId> {
        if inputs.is_empty() {
            return Vec::new();
        }

        let file_count = inputs.len();
        let mut ids = Vec::with_capacity(file_count);
        {
            let mut inner = self.inner.lock().await;
            for input in inputs {
                let record = FileRecord::new(input);
                info!(id = %record.id, name = %record.name, "intake: upload phase starting");
                ids.push(record.id);
                inner.records.push(record);
            }
            inner.open_intake_gates += 1;
        }

        for id in &ids {
            self.spawn_phase(*id, FileStatus::Uploaded).await;
        }

        let settle = self.spawn_intake_settle(file_count);
        {
            let mut inner = self.inner.lock().await;
            inner.settle_tasks.retain(|task| !task.is_finished());
            inner.settle_tasks.push(settle);
        }
        ids
    }

    /// Moves an uploaded record into its process phase. Only legal from
    /// `Uploaded`; progress restarts at 0.
    pub async fn begin_processing(self: &Arc<Self>, id: FileId) -> Result<(), EngineError> {
        {
            let mut inner = self.inner.lock().await;
            let record = inner
                .records
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or(EngineError::NotFound { id })?;
            if record.status != FileStatus::Uploaded {
                return Err(EngineError::InvalidTransition {
                    id,
                    status: record.status,
                });
            }
            record.status = FileStatus::Processing;
            record.progress = 0;
        }

        info!(%id, "process phase starting");
        let _ = self.events.send(EngineEvent::StatusChanged {
            id,
            status: FileStatus::Processing,
        });
        self.spawn_phase(id, FileStatus::Processed).await;
        Ok(())
    }

    /// Removes a record. Rejected with `RecordBusy` while an upload or
    /// process phase owns it.
    pub async fn delete(&self, id: FileId) -> Result<(), EngineError> {
        {
            let mut inner = self.inner.lock().await;
            let index = inner
                .records
                .iter()
                .position(|r| r.id == id)
                .ok_or(EngineError::NotFound { id })?;
            let status = inner.records[index].status;
            if status.is_in_flight() {
                return Err(EngineError::RecordBusy { id, status });
            }
            inner.records.remove(index);
        }

        info!(%id, "record deleted");
        let _ = self.events.send(EngineEvent::RecordRemoved { id });
        Ok(())
    }

    /// Cloned view of the collection in insertion order.
    pub async fn snapshot(&self) -> Vec<FileRecord> {
        self.inner.lock().await.records.clone()
    }

    /// True once at least one record has reached `Processed`. Gates the
    /// collaborator's "return" action.
    pub async fn is_ready_to_exit(&self) -> bool {
        self.inner
            .lock()
            .await
            .records
            .iter()
            .any(|r| r.status == FileStatus::Processed)
    }

    /// True while any intake batch's settle window is still open. Gates the
    /// collaborator's upload control.
    pub async fn is_intake_in_flight(&self) -> bool {
        self.inner.lock().await.open_intake_gates > 0
    }

    /// Wholesale teardown: aborts every outstanding timer for every record
    /// so nothing mutates a collection the owner has discarded. Individual
    /// in-flight phases have no cancellation path short of this.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        let phase_count = inner.phase_tasks.len();
        for (_, tasks) in inner.phase_tasks.drain() {
            tasks.tick.abort();
            tasks.completion.abort();
        }
        for task in inner.settle_tasks.drain(..) {
            task.abort();
        }
        inner.open_intake_gates = 0;
        if phase_count > 0 {
            warn!(aborted_phases = phase_count, "engine shut down mid-phase");
        }
    }

    /// Schedules the two timers of one phase. The completion timer is the
    /// sole authority for the status transition; the tick timer only ramps
    /// progress and stops on its own once it hits 100.
    async fn spawn_phase(self: &Arc<Self>, id: FileId, completed_status: FileStatus) {
        let duration = self.durations.phase_duration();
        debug!(%id, ?duration, "phase scheduled");

        let tick_engine = Arc::clone(self);
        let step = self.options.progress_step;
        let period = self.options.tick_period;
        let tick = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // interval fires immediately; consume that so the first advance
            // lands one full period after phase start.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if tick_engine.advance_progress(id, step).await {
                    break;
                }
            }
        });

        let completion_engine = Arc::clone(self);
        let completion = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            completion_engine.complete_phase(id, completed_status).await;
        });

        let mut inner = self.inner.lock().await;
        inner
            .phase_tasks
            .insert(id, PhaseTasks { tick, completion });
    }

    /// One progress tick. Returns true when the ticker should stop: the
    /// record is gone, no longer in-flight, or already at 100.
    async fn advance_progress(&self, id: FileId, step: u8) -> bool {
        let progress = {
            let mut inner = self.inner.lock().await;
            let Some(record) = inner.records.iter_mut().find(|r| r.id == id) else {
                return true;
            };
            if !record.status.is_in_flight() {
                return true;
            }
            record.progress = record.progress.saturating_add(step).min(100);
            record.progress
        };
        let _ = self.events.send(EngineEvent::ProgressTicked { id, progress });
        progress >= 100
    }

    async fn complete_phase(&self, id: FileId, completed_status: FileStatus) {
        {
            let mut inner = self.inner.lock().await;
            if let Some(tasks) = inner.phase_tasks.remove(&id) {
                tasks.tick.abort();
            }
            let Some(record) = inner.records.iter_mut().find(|r| r.id == id) else {
                return;
            };
            record.status = completed_status;
            record.progress = 100;
        }

        info!(%id, status = %completed_status, "phase complete");
        let _ = self.events.send(EngineEvent::StatusChanged {
            id,
            status: completed_status,
        });
    }

    fn spawn_intake_settle(self: &Arc<Self>, file_count: usize) -> JoinHandle<()> {
        let duration = self.durations.batch_settle_duration(file_count);
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let mut inner = engine.inner.lock().await;
            inner.open_intake_gates = inner.open_intake_gates.saturating_sub(1);
        })
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

//! Execution engine: drives a job's items through a [`Worker`].
//!
//! ## Flow
//!
//! 1. Register the job id in the [`CancellationRegistry`], emit `preparing`
//! 2. Before starting each item, check the cancellation flag
//! 3. Run the worker; an error becomes that item's `Failure`, never the job's
//! 4. Emit `running` with the new completed count after every attempt
//! 5. Wait `inter_item_delay` between items (never before the first)
//! 6. Unregister, emit the terminal event, hand back the outcomes
//!
//! Cancellation is only observed at item boundaries; an in-flight worker call
//! always runs to completion.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info, warn};

use super::job::{Job, JobId, JobState};
use super::outcome::{Aggregate, ItemError, ItemOutcome, ItemRecord, Summary};
use super::progress::{ProgressEvent, ProgressSink};
use super::registry::{CancellationRegistry, Registration};
use super::worker::Worker;
use super::EngineError;
use crate::observability::Metrics;

/// Per-engine execution options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Pause between consecutive items, used to stay under upstream rate limits
    pub inter_item_delay: Duration,
    /// Items in flight at once; 1 is strictly sequential
    pub concurrency: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            inter_item_delay: Duration::ZERO,
            concurrency: 1,
        }
    }
}

impl EngineOptions {
    pub fn sequential(inter_item_delay: Duration) -> Self {
        Self {
            inter_item_delay,
            concurrency: 1,
        }
    }
}

/// Shared execution engine. Cloning is cheap and clones share one registry.
#[derive(Debug, Clone)]
pub struct Engine {
    registry: Arc<CancellationRegistry>,
    metrics: Arc<Metrics>,
    options: EngineOptions,
}

impl Engine {
    pub fn new(registry: Arc<CancellationRegistry>, metrics: Arc<Metrics>) -> Self {
        Self {
            registry,
            metrics,
            options: EngineOptions::default(),
        }
    }

    /// Same registry and metrics, different options
    pub fn with_options(&self, options: EngineOptions) -> Self {
        Self {
            registry: self.registry.clone(),
            metrics: self.metrics.clone(),
            options,
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn registry(&self) -> &Arc<CancellationRegistry> {
        &self.registry
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Request cooperative cancellation; `false` means the request was a no-op
    pub fn cancel(&self, job_id: &JobId) -> bool {
        self.registry.request_cancel(job_id)
    }

    /// Register a job without running it yet.
    ///
    /// Callers that hand the run to another task register first so that a
    /// cancel arriving before the task is scheduled is still honoured.
    /// Fails if another live job already holds the id.
    pub fn submit<I>(&self, job: Job<I>, owner: Option<&str>) -> Result<Submission<I>, EngineError> {
        let Some(registration) = Registration::claim(self.registry.clone(), job.id.clone(), owner)
        else {
            return Err(EngineError::DuplicateJob(job.id));
        };

        Ok(Submission {
            engine: self.clone(),
            job,
            registration,
        })
    }

    /// Register and run a job to its terminal state
    pub async fn run<W>(
        &self,
        job: Job<W::Input>,
        worker: &W,
        sink: &dyn ProgressSink,
    ) -> Result<JobReport<W::Output>, EngineError>
    where
        W: Worker + ?Sized,
    {
        Ok(self.submit(job, None)?.run(worker, sink).await)
    }
}

/// A registered job waiting to be run
#[derive(Debug)]
pub struct Submission<I> {
    engine: Engine,
    job: Job<I>,
    registration: Registration,
}

impl<I: Send + Sync> Submission<I> {
    pub fn job_id(&self) -> &JobId {
        &self.job.id
    }

    pub fn total(&self) -> usize {
        self.job.len()
    }

    pub async fn run<W>(self, worker: &W, sink: &dyn ProgressSink) -> JobReport<W::Output>
    where
        W: Worker<Input = I> + ?Sized,
    {
        let Submission {
            engine,
            job,
            mut registration,
        } = self;

        let total = job.len();
        let concurrency = engine.options.concurrency.max(1);
        let delay = engine.options.inter_item_delay;
        let mut state = JobState::Pending;

        engine.metrics.job_started();
        info!(job_id = %job.id, total, concurrency, "Job started");
        sink.emit(ProgressEvent::preparing(&job.id, total));

        let mut tally = Tally::new(&job.id, total, &engine.metrics, sink);
        let mut in_flight = FuturesUnordered::new();
        let mut next = 0;

        loop {
            while state != JobState::Cancelling && next < total && in_flight.len() < concurrency {
                if registration.is_cancelled() {
                    transition(&job.id, &mut state, JobState::Cancelling);
                    break;
                }

                let item = &job.items[next];
                in_flight.push(async move { (item.index, worker.process(item).await) });
                if state == JobState::Pending {
                    transition(&job.id, &mut state, JobState::Running);
                }
                next += 1;
            }

            let Some((index, result)) = in_flight.next().await else {
                break;
            };
            tally.record(index, worker.label(&job.items[index]), result);

            if state != JobState::Cancelling && next < total && !delay.is_zero() {
                // Keep polling items already in flight while pausing.
                let pause = tokio::time::sleep(delay);
                tokio::pin!(pause);
                loop {
                    tokio::select! {
                        _ = &mut pause => break,
                        Some((index, result)) = in_flight.next(), if !in_flight.is_empty() => {
                            tally.record(index, worker.label(&job.items[index]), result);
                        }
                    }
                }
            }
        }

        drop(in_flight);
        let completed = tally.completed;
        let items = tally.into_records();
        debug_assert_eq!(items.len(), completed);

        registration.release();

        if state == JobState::Cancelling {
            transition(&job.id, &mut state, JobState::Cancelled);
            engine.metrics.job_cancelled();
            info!(job_id = %job.id, completed, total, "Job cancelled");
            sink.emit(ProgressEvent::cancelled(&job.id, completed, total));
        } else {
            transition(&job.id, &mut state, JobState::Completed);
            engine.metrics.job_completed();
            let summary = summarize(&items);
            info!(
                job_id = %job.id,
                succeeded = summary.succeeded,
                failed = summary.failed,
                "Job completed"
            );
            sink.emit(ProgressEvent::completed(
                &job.id,
                total,
                summary.describe("items"),
            ));
        }

        JobReport {
            job_id: job.id,
            state,
            total,
            items,
        }
    }
}

fn summarize<T>(items: &[ItemRecord<T>]) -> Summary {
    let succeeded = items.iter().filter(|r| r.outcome.is_success()).count();
    Summary {
        succeeded,
        failed: items.len() - succeeded,
    }
}

fn transition(job_id: &JobId, state: &mut JobState, next: JobState) {
    debug!(%job_id, from = ?*state, to = ?next, "Job state transition");
    *state = next;
}

/// Outcome slots and the running completed count for one job
struct Tally<'a, T> {
    job_id: &'a JobId,
    total: usize,
    completed: usize,
    slots: Vec<Option<ItemOutcome<T>>>,
    metrics: &'a Metrics,
    sink: &'a dyn ProgressSink,
}

impl<'a, T> Tally<'a, T> {
    fn new(job_id: &'a JobId, total: usize, metrics: &'a Metrics, sink: &'a dyn ProgressSink) -> Self {
        Self {
            job_id,
            total,
            completed: 0,
            slots: std::iter::repeat_with(|| None).take(total).collect(),
            metrics,
            sink,
        }
    }

    fn record(&mut self, index: usize, label: String, result: Result<T, ItemError>) {
        self.completed += 1;

        let message = match &result {
            Ok(_) => {
                self.metrics.item_succeeded();
                debug!(job_id = %self.job_id, index, "Item succeeded");
                format!("{label} done ({}/{})", self.completed, self.total)
            }
            Err(err) => {
                self.metrics.item_failed();
                warn!(job_id = %self.job_id, index, reason = %err, "Item failed");
                format!("{label} failed: {err}")
            }
        };

        self.slots[index] = Some(ItemOutcome::from(result));
        self.sink.emit(ProgressEvent::running(
            self.job_id,
            self.completed,
            self.total,
            index,
            message,
        ));
    }

    fn into_records(self) -> Vec<ItemRecord<T>> {
        self.slots
            .into_iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.map(|outcome| ItemRecord { index, outcome }))
            .collect()
    }
}

/// Final state and outcomes of a job, ordered by item index.
///
/// A completed job has one record per item; a cancelled job has one per
/// attempted item and nothing for the rest.
#[derive(Debug, Clone)]
pub struct JobReport<T> {
    pub job_id: JobId,
    pub state: JobState,
    pub total: usize,
    pub items: Vec<ItemRecord<T>>,
}

impl<T> JobReport<T> {
    pub fn completed_count(&self) -> usize {
        self.items.len()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state == JobState::Cancelled
    }

    pub fn summary(&self) -> Summary {
        summarize(&self.items)
    }

    pub fn into_aggregate(self) -> Aggregate<T> {
        Aggregate::from_records(self.items)
    }

    /// Outcome of the only item of a single-item job
    pub fn into_single(self) -> Option<ItemOutcome<T>> {
        self.items.into_iter().next().map(|record| record.outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::job::WorkItem;
    use crate::engine::progress::{ChannelSink, NullSink, Phase};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    fn engine() -> Engine {
        Engine::new(Arc::new(CancellationRegistry::new()), Arc::new(Metrics::new()))
    }

    struct Echo;

    #[async_trait]
    impl Worker for Echo {
        type Input = u32;
        type Output = u32;

        async fn process(&self, item: &WorkItem<u32>) -> Result<u32, ItemError> {
            Ok(item.input * 10)
        }
    }

    /// Records when each item started
    #[derive(Default)]
    struct Clocked {
        started: Mutex<Vec<Instant>>,
    }

    #[async_trait]
    impl Worker for Clocked {
        type Input = ();
        type Output = ();

        async fn process(&self, _item: &WorkItem<()>) -> Result<(), ItemError> {
            self.started.lock().unwrap().push(Instant::now());
            Ok(())
        }
    }

    /// Sleeps per item and tracks how many items overlap
    #[derive(Default)]
    struct Overlap {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Worker for Overlap {
        type Input = u64;
        type Output = u64;

        async fn process(&self, item: &WorkItem<u64>) -> Result<u64, ItemError> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(item.input)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(item.input)
        }
    }

    #[tokio::test]
    async fn test_run_single_item_job() {
        let engine = engine();
        let job = Job::single(JobId::new("one"), 4);

        let report = engine.run(job, &Echo, &NullSink).await.unwrap();

        assert_eq!(report.state, JobState::Completed);
        assert_eq!(report.into_single(), Some(ItemOutcome::Success { payload: 40 }));
        assert_eq!(engine.registry().live_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_applies_between_items_only() {
        let engine = engine().with_options(EngineOptions::sequential(Duration::from_secs(1)));
        let worker = Clocked::default();
        let job = Job::new(JobId::new("clocked"), vec![(), (), ()]).unwrap();

        let begin = Instant::now();
        engine.run(job, &worker, &NullSink).await.unwrap();
        let finished = Instant::now();

        let started = worker.started.lock().unwrap().clone();
        assert_eq!(started.len(), 3);
        assert_eq!(started[0] - begin, Duration::ZERO);
        assert_eq!(started[1] - started[0], Duration::from_secs(1));
        assert_eq!(started[2] - started[1], Duration::from_secs(1));
        // No trailing pause after the last item
        assert_eq!(finished - started[2], Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_concurrency_keeps_index_order() {
        let engine = engine().with_options(EngineOptions {
            inter_item_delay: Duration::ZERO,
            concurrency: 2,
        });
        let worker = Overlap::default();
        let job = Job::new(JobId::new("parallel"), vec![30, 10, 20, 5]).unwrap();
        let (sink, mut rx) = ChannelSink::channel();

        let report = engine.run(job, &worker, &sink).await.unwrap();

        assert_eq!(worker.peak.load(Ordering::SeqCst), 2);
        let indices: Vec<usize> = report.items.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);

        let mut counts = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if event.phase == Phase::Running {
                counts.push(event.completed_count);
            }
        }
        assert_eq!(counts, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_submission_registers_before_run() {
        let engine = engine();
        let job = Job::new(JobId::new("queued"), vec![1, 2]).unwrap();

        let submission = engine.submit(job, Some("conn-1")).unwrap();
        assert!(engine.registry().is_live(submission.job_id()));
        assert!(engine.cancel(submission.job_id()));

        let report = submission.run(&Echo, &NullSink).await;
        assert!(report.is_cancelled());
        assert_eq!(report.completed_count(), 0);
        assert!(report.items.is_empty());
    }

    #[tokio::test]
    async fn test_dropped_submission_releases_registry() {
        let engine = engine();
        let job = Job::single(JobId::new("abandoned"), 1);

        drop(engine.submit(job, None).unwrap());

        assert_eq!(engine.registry().live_count(), 0);
    }

    #[tokio::test]
    async fn test_metrics_track_items_and_jobs() {
        let engine = engine();
        let job = Job::new(JobId::new("counted"), vec![1, 2, 3]).unwrap();

        engine.run(job, &Echo, &NullSink).await.unwrap();

        let snapshot = engine.metrics().snapshot();
        assert_eq!(snapshot.jobs_started, 1);
        assert_eq!(snapshot.jobs_completed, 1);
        assert_eq!(snapshot.items_succeeded, 3);
    }

    #[tokio::test]
    async fn test_duplicate_live_id_is_rejected() {
        let engine = engine();

        let first = engine
            .submit(Job::new(JobId::new("dup"), vec![1]).unwrap(), None)
            .unwrap();
        let err = engine
            .submit(Job::new(JobId::new("dup"), vec![1, 2, 3]).unwrap(), None)
            .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateJob(id) if id.as_str() == "dup"));

        first.run(&Echo, &NullSink).await;
        assert!(!engine.registry().is_live(&JobId::new("dup")));

        // The id is free again once its job is terminal
        let second = engine
            .submit(Job::new(JobId::new("dup"), vec![1, 2, 3]).unwrap(), None)
            .unwrap();
        assert!(engine.cancel(&JobId::new("dup")));
        let report = second.run(&Echo, &NullSink).await;
        assert!(report.is_cancelled());
        assert!(report.items.is_empty());
    }
}

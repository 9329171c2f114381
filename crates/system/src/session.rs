//! CPU sampling session.
//!
//! A [`Session`] owns an append-only series of [`Sample`]s and a background
//! tokio task that fills it once per interval. Reads never wait on the loop
//! beyond a short lock, so aggregates can be queried while sampling runs.

use crate::provider::{CpuUsageProvider, PlatformProvider};
use chrono::{DateTime, Local};
use meter_core::{sample, MeterError, ProviderKind, Result, Sample, Summary};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Interval used when the caller has no preference.
pub const DEFAULT_INTERVAL_MS: u64 = 1000;

const RUNNING: u64 = 1;

/// A CPU-usage recording session.
///
/// `start` launches the sampling loop and returns immediately; `stop` flips
/// the run flag without waiting. Samples persist across stop/start cycles;
/// only the elapsed counter is reset by `start`.
///
/// Changing the interval mid-run is allowed but makes
/// [`sample_count`](Self::sample_count) diverge from the series length.
/// Prefer a fresh session for a new interval.
pub struct Session<P: CpuUsageProvider = PlatformProvider> {
    shared: Arc<Shared>,
    provider: Arc<Mutex<P>>,
    provider_name: &'static str,
    run: Mutex<Option<Run>>,
}

/// State shared between the session handle and its sampling loop.
struct Shared {
    interval_ms: AtomicU64,
    /// `generation << 1 | running`. The generation is bumped on every `start`,
    /// so a failing loop can only clear the flag of its own run.
    run_state: AtomicU64,
    series: RwLock<Series>,
}

#[derive(Default)]
struct Series {
    samples: Vec<Sample>,
    elapsed_total: u64,
    started_at: Option<DateTime<Local>>,
}

/// Handle to one launched sampling loop.
struct Run {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Session<PlatformProvider> {
    /// Create a session bound to the best provider for this host.
    ///
    /// Fails with [`MeterError::PlatformUnsupported`] when no provider exists.
    pub fn new(interval_ms: u64) -> Result<Self> {
        Self::with_kind(interval_ms, ProviderKind::Auto)
    }

    /// Create a session with the default 1000 ms interval.
    pub fn with_defaults() -> Result<Self> {
        Self::new(DEFAULT_INTERVAL_MS)
    }

    /// Create a session bound to a specific backend.
    pub fn with_kind(interval_ms: u64, kind: ProviderKind) -> Result<Self> {
        check_interval(interval_ms)?;
        Self::with_provider(interval_ms, PlatformProvider::detect(kind)?)
    }
}

impl<P: CpuUsageProvider> Session<P> {
    /// Create a session around an already-constructed provider.
    pub fn with_provider(interval_ms: u64, provider: P) -> Result<Self> {
        check_interval(interval_ms)?;
        debug!(provider = provider.name(), interval_ms, "session created");

        Ok(Self {
            shared: Arc::new(Shared {
                interval_ms: AtomicU64::new(interval_ms),
                run_state: AtomicU64::new(0),
                series: RwLock::new(Series::default()),
            }),
            provider_name: provider.name(),
            provider: Arc::new(Mutex::new(provider)),
            run: Mutex::new(None),
        })
    }

    /// Reset the elapsed counter and launch the sampling loop.
    ///
    /// Returns without waiting for the first sample. Fails with
    /// [`MeterError::AlreadyRunning`] (and spawns nothing) if a run is active,
    /// or [`MeterError::NoRuntime`] outside a tokio runtime.
    pub fn start(&self) -> Result<()> {
        let mut run = lock(&self.run);

        if self.is_running() {
            warn!("start() called while sampling is already running; ignoring");
            return Err(MeterError::AlreadyRunning);
        }

        let runtime = Handle::try_current().map_err(|_| MeterError::NoRuntime)?;

        // A stopped loop may still be sleeping; make sure it never appends again.
        if let Some(prev) = run.take() {
            prev.token.cancel();
        }

        let generation = (self.shared.run_state.load(Ordering::SeqCst) >> 1) + 1;
        {
            let mut series = write(&self.shared.series);
            series.elapsed_total = 0;
            series.started_at = Some(Local::now());
        }
        self.shared
            .run_state
            .store(generation << 1 | RUNNING, Ordering::SeqCst);

        let token = CancellationToken::new();
        let handle = runtime.spawn(sample_loop(
            Arc::clone(&self.shared),
            Arc::clone(&self.provider),
            token.clone(),
            generation,
        ));
        *run = Some(Run { token, handle });

        info!(
            interval_ms = self.interval(),
            provider = self.provider_name,
            "sampling started"
        );
        Ok(())
    }

    /// Stop sampling. Does not wait for the loop; a tick already in flight
    /// may still land. Idempotent.
    pub fn stop(&self) {
        let prev = self.shared.run_state.fetch_and(!RUNNING, Ordering::SeqCst);
        let was_running = prev & RUNNING != 0;
        if let Some(run) = lock(&self.run).as_ref() {
            run.token.cancel();
        }
        if was_running {
            info!(samples = self.samples_len(), runtime_ms = self.runtime(), "sampling stopped");
        }
    }

    /// Stop sampling and wait for the loop task to exit.
    pub async fn shutdown(self) {
        self.stop();
        let run = lock(&self.run).take();
        if let Some(run) = run {
            if let Err(e) = run.handle.await {
                if e.is_panic() {
                    error!("sampling loop panicked: {e}");
                }
            }
        }
    }

    /// Change the interval used by future ticks. Existing samples keep their
    /// elapsed values.
    pub fn set_interval(&self, interval_ms: u64) -> Result<()> {
        check_interval(interval_ms)?;
        let old = self.shared.interval_ms.swap(interval_ms, Ordering::SeqCst);
        if old != interval_ms {
            info!(old_ms = old, new_ms = interval_ms, "sampling interval changed");
        }
        Ok(())
    }

    pub fn interval(&self) -> u64 {
        self.shared.interval_ms.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.shared.run_state.load(Ordering::SeqCst) & RUNNING != 0
    }

    /// Snapshot of every sample recorded so far, oldest first.
    pub fn samples(&self) -> Vec<Sample> {
        read(&self.shared.series).samples.clone()
    }

    pub fn average(&self) -> Result<f32> {
        sample::average(&read(&self.shared.series).samples)
    }

    pub fn max(&self) -> Result<f32> {
        sample::max(&read(&self.shared.series).samples)
    }

    pub fn min(&self) -> Result<f32> {
        sample::min(&read(&self.shared.series).samples)
    }

    /// Elapsed milliseconds of the current (or last) run.
    pub fn runtime(&self) -> u64 {
        read(&self.shared.series).elapsed_total
    }

    /// `runtime() / interval()`.
    ///
    /// Equals the number of samples of the current run while the interval is
    /// unchanged; it is not the length of [`samples`](Self::samples).
    pub fn sample_count(&self) -> u64 {
        self.runtime() / self.interval()
    }

    /// Aggregate snapshot, or [`MeterError::NoData`] if nothing was recorded.
    pub fn summary(&self) -> Result<Summary> {
        let interval_ms = self.interval();
        let series = read(&self.shared.series);
        Summary::from_samples(
            &series.samples,
            series.elapsed_total,
            interval_ms,
            series.started_at,
        )
    }

    fn samples_len(&self) -> usize {
        read(&self.shared.series).samples.len()
    }
}

impl<P: CpuUsageProvider> Drop for Session<P> {
    fn drop(&mut self) {
        self.shared.run_state.fetch_and(!RUNNING, Ordering::SeqCst);
        let run = self.run.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(run) = run.take() {
            run.token.cancel();
        }
    }
}

impl<P: CpuUsageProvider> std::fmt::Debug for Session<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("interval_ms", &self.interval())
            .field("running", &self.is_running())
            .field("runtime_ms", &self.runtime())
            .field("samples", &self.samples_len())
            .finish()
    }
}

/// One run of the sampling loop: query, append, advance, wait.
async fn sample_loop<P: CpuUsageProvider>(
    shared: Arc<Shared>,
    provider: Arc<Mutex<P>>,
    token: CancellationToken,
    generation: u64,
) {
    while !token.is_cancelled() {
        let reading = lock(&provider)
            .current_usage_percent()
            .and_then(check_reading);

        let usage = match reading {
            Ok(v) => v,
            Err(e) => {
                error!("CPU provider failed: {e}; stopping sampling");
                end_run(&shared, &token, generation);
                break;
            }
        };

        let interval_ms = shared.interval_ms.load(Ordering::SeqCst);
        {
            let mut series = write(&shared.series);
            if token.is_cancelled() {
                break;
            }
            let elapsed_ms = series.elapsed_total;
            let Some(next) = elapsed_ms.checked_add(interval_ms) else {
                error!(elapsed_ms, interval_ms, "elapsed counter overflow; stopping sampling");
                end_run(&shared, &token, generation);
                break;
            };
            series.samples.push(Sample::new(elapsed_ms, usage));
            series.elapsed_total = next;
            debug!(elapsed_ms, usage, "sample recorded");
        }

        tokio::select! {
            _ = token.cancelled() => break,
            _ = time::sleep(Duration::from_millis(interval_ms)) => {}
        }
    }

    debug!(generation, "sampling loop exited");
}

/// Mark `generation` as no longer running unless a newer run has started.
fn end_run(shared: &Shared, token: &CancellationToken, generation: u64) {
    let _ = shared.run_state.compare_exchange(
        generation << 1 | RUNNING,
        generation << 1,
        Ordering::SeqCst,
        Ordering::SeqCst,
    );
    token.cancel();
}

fn check_interval(interval_ms: u64) -> Result<()> {
    if interval_ms == 0 {
        return Err(MeterError::InvalidInterval(interval_ms));
    }
    Ok(())
}

fn check_reading(usage: f32) -> Result<f32> {
    if !usage.is_finite() {
        return Err(MeterError::Provider(format!("non-finite reading: {usage}")));
    }
    Ok(usage.clamp(0.0, 100.0))
}

// The series is append-only, so a panic mid-write cannot leave it torn;
// recover the guard instead of propagating poison.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(l: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    l.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(l: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    l.write().unwrap_or_else(PoisonError::into_inner)
}

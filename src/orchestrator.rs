use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread::JoinHandle;

use tracing::{debug, error, warn};

use crate::codec::{DEFAULT_PNG_QUALITY, ImageCodec, PngCodec};
use crate::delivery::{self, CaptureOutcome, CaptureTicket, ReplySink};
use crate::env_config;
use crate::error::{CaptureError, CaptureResult};
use crate::naming::NameCounterState;
use crate::options::{CaptureOptions, CompareOptions, CompareRequest};
use crate::pipeline::{self, SnapshotReady, WorkerEnv};
use crate::snapshot::ViewSnapshotProvider;
use crate::storage::{self, ArtifactStore, AssetSource, NoAssets};

const DEFAULT_MAX_WORKERS: usize = 4;

#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// Directory persisted artifacts are written to.
    pub storage_root: PathBuf,
    /// Size of the worker pool running file I/O and comparison.
    pub worker_threads: usize,
    /// PNG quality on the 0..=100 scale, used by the default codec.
    pub png_quality: u8,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            storage_root: storage::default_storage_root(),
            worker_threads: env_config::env_var_positive_usize(env_config::WORKERS_VAR)
                .unwrap_or_else(default_worker_threads),
            png_quality: env_config::env_var_bounded_u8(env_config::PNG_QUALITY_VAR, 100)
                .unwrap_or(DEFAULT_PNG_QUALITY),
        }
    }
}

fn default_worker_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(DEFAULT_MAX_WORKERS)
}

pub struct CaptureOrchestratorBuilder {
    provider: Option<Box<dyn ViewSnapshotProvider>>,
    codec: Option<Arc<dyn ImageCodec>>,
    assets: Arc<dyn AssetSource>,
    config: OrchestratorConfig,
}

impl CaptureOrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            codec: None,
            assets: Arc::new(NoAssets),
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_provider(mut self, provider: impl ViewSnapshotProvider + 'static) -> Self {
        self.provider = Some(Box::new(provider));
        self
    }

    /// Replace the default PNG codec. `png_quality` is ignored afterwards.
    pub fn with_codec(mut self, codec: Arc<dyn ImageCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Bundled assets consulted before the filesystem for baselines.
    pub fn with_assets(mut self, assets: Arc<dyn AssetSource>) -> Self {
        self.assets = assets;
        self
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.storage_root = root.into();
        self
    }

    pub fn worker_threads(mut self, worker_threads: usize) -> Self {
        self.config.worker_threads = worker_threads;
        self
    }

    pub fn png_quality(mut self, quality: u8) -> Self {
        self.config.png_quality = quality;
        self
    }

    pub fn build(self) -> CaptureResult<CaptureOrchestrator> {
        let Some(mut provider) = self.provider else {
            return Err(CaptureError::InvalidConfig(
                "a view snapshot provider is required".into(),
            ));
        };
        if self.config.worker_threads == 0 {
            return Err(CaptureError::InvalidConfig(
                "worker_threads must be > 0".into(),
            ));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.worker_threads)
            .thread_name(|i| format!("view-capture-worker-{i}"))
            .build()
            .map_err(|e| CaptureError::io("failed to build capture worker pool", e))?;

        let codec = self
            .codec
            .unwrap_or_else(|| Arc::new(PngCodec::new(self.config.png_quality)));
        let env = Arc::new(WorkerEnv {
            store: ArtifactStore::new(self.config.storage_root.clone()),
            codec,
            assets: self.assets,
        });

        let (jobs, job_rx) = mpsc::channel::<ViewJob>();
        let view_thread = std::thread::Builder::new()
            .name("view-capture-view".to_string())
            .spawn(move || {
                let mut names = NameCounterState::new();
                while let Ok(job) = job_rx.recv() {
                    run_view_job(job, provider.as_mut(), &mut names, &pool, &env);
                }
                debug!("view capture thread exiting");
            })
            .map_err(|e| CaptureError::io("failed to spawn view capture thread", e))?;

        Ok(CaptureOrchestrator {
            jobs: Some(jobs),
            view_thread: Some(view_thread),
            config: self.config,
        })
    }
}

impl Default for CaptureOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

struct ViewJob {
    options: CaptureOptions,
    compare: Option<CompareRequest>,
    sink: ReplySink,
}

/// Coordinates capture requests across the view thread and the worker pool.
///
/// Snapshots and output-name resolution happen on a single dedicated view
/// thread, strictly one request at a time. Each snapshot is then handed to
/// the worker pool, where any number of requests may be persisted and
/// compared concurrently. Requests never block the caller: each returns a
/// ticket that later yields the outcome.
///
/// Dropping the orchestrator lets the view thread finish the requests
/// already queued, then joins it.
pub struct CaptureOrchestrator {
    jobs: Option<mpsc::Sender<ViewJob>>,
    view_thread: Option<JoinHandle<()>>,
    config: OrchestratorConfig,
}

impl CaptureOrchestrator {
    pub fn builder() -> CaptureOrchestratorBuilder {
        CaptureOrchestratorBuilder::new()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn storage_root(&self) -> &Path {
        &self.config.storage_root
    }

    /// Capture the view and persist it. The final reply carries the file
    /// location.
    pub fn capture(&self, options: CaptureOptions) -> CaptureResult<CaptureTicket> {
        let (sink, ticket) = delivery::channel();
        self.submit(options, None, sink)?;
        Ok(ticket)
    }

    /// Capture the view and compare it against a baseline. The final reply
    /// carries the differing-pixel count and artifact locations.
    pub fn capture_and_compare(
        &self,
        options: CaptureOptions,
        compare: CompareOptions,
    ) -> CaptureResult<CaptureTicket> {
        let (sink, ticket) = delivery::channel();
        self.submit(options, Some(compare.into()), sink)?;
        Ok(ticket)
    }

    /// Async flavour of [`capture`](Self::capture).
    #[cfg(feature = "tokio-stream")]
    pub fn capture_async(
        &self,
        options: CaptureOptions,
    ) -> CaptureResult<delivery::AsyncCaptureTicket> {
        let (sink, ticket) = delivery::async_channel();
        self.submit(options, None, sink)?;
        Ok(ticket)
    }

    /// Async flavour of [`capture_and_compare`](Self::capture_and_compare).
    #[cfg(feature = "tokio-stream")]
    pub fn capture_and_compare_async(
        &self,
        options: CaptureOptions,
        compare: CompareOptions,
    ) -> CaptureResult<delivery::AsyncCaptureTicket> {
        let (sink, ticket) = delivery::async_channel();
        self.submit(options, Some(compare.into()), sink)?;
        Ok(ticket)
    }

    /// Check whether the view thread is still accepting requests.
    pub fn is_running(&self) -> bool {
        self.view_thread
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn submit(
        &self,
        options: CaptureOptions,
        compare: Option<CompareRequest>,
        sink: ReplySink,
    ) -> CaptureResult<()> {
        let jobs = self.jobs.as_ref().ok_or(CaptureError::WorkerDead)?;
        jobs.send(ViewJob {
            options,
            compare,
            sink,
        })
        .map_err(|_| CaptureError::WorkerDead)
    }
}

impl Drop for CaptureOrchestrator {
    fn drop(&mut self) {
        // Closing the channel ends the view loop once queued jobs are done.
        self.jobs.take();
        if let Some(handle) = self.view_thread.take() {
            let _ = handle.join();
        }
    }
}

fn run_view_job(
    job: ViewJob,
    provider: &mut dyn ViewSnapshotProvider,
    names: &mut NameCounterState,
    pool: &rayon::ThreadPool,
    env: &Arc<WorkerEnv>,
) {
    let ViewJob {
        options,
        compare,
        sink,
    } = job;

    let name = names.resolve(&options.file_name);
    debug!(label = %name.label(), comparing = compare.is_some(), "snapshot requested");

    let snapshot = match provider.snapshot() {
        Ok(snapshot) => snapshot,
        Err(err) => {
            warn!(label = %name.label(), error = %err, "view snapshot failed");
            sink.finish(CaptureOutcome::Failed(err));
            return;
        }
    };
    debug!(
        label = %name.label(),
        width = snapshot.width(),
        height = snapshot.height(),
        "snapshot ready"
    );

    if options.asynchronous {
        sink.provisional();
    }

    let ready = SnapshotReady {
        snapshot,
        name,
        region: options.region(),
        compare,
    };
    let env = Arc::clone(env);
    pool.spawn(move || {
        let label = ready.name.label();
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| {
            pipeline::process(ready, &env)
        })) {
            Ok(outcome) => outcome,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(label = %label, panic = %message, "capture worker panicked");
                CaptureOutcome::Failed(CaptureError::WorkerPanic(message))
            }
        };
        sink.finish(outcome);
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::{CaptureReply, CompareResult};
    use crate::frame::PixelBuffer;
    use crate::region::CaptureRegion;
    use crate::storage::MemoryAssets;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const FILL: u32 = 0xFF33_6699;

    struct MockProvider {
        width: u32,
        height: u32,
        calls: Arc<AtomicUsize>,
        fail_on: Option<usize>,
    }

    impl MockProvider {
        fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                calls: Arc::new(AtomicUsize::new(0)),
                fail_on: None,
            }
        }
    }

    impl ViewSnapshotProvider for MockProvider {
        fn snapshot(&mut self) -> CaptureResult<PixelBuffer> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on == Some(call) {
                return Err(CaptureError::Snapshot(anyhow::anyhow!("mock view detached")));
            }
            PixelBuffer::filled(self.width, self.height, FILL)
        }
    }

    fn orchestrator(root: &Path, provider: MockProvider) -> CaptureResult<CaptureOrchestrator> {
        CaptureOrchestrator::builder()
            .with_provider(provider)
            .storage_root(root)
            .worker_threads(2)
            .build()
    }

    fn write_baseline(dir: &Path, name: &str, buffer: &PixelBuffer) -> CaptureResult<String> {
        let bytes = PngCodec::default().encode(buffer)?;
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        Ok(path.to_string_lossy().into_owned())
    }

    fn expect_captured(outcome: CaptureOutcome) -> PathBuf {
        match outcome {
            CaptureOutcome::Captured { location } => location,
            other => panic!("expected capture, got {other:?}"),
        }
    }

    fn expect_compared(outcome: CaptureOutcome) -> CompareResult {
        match outcome {
            CaptureOutcome::Compared(result) => result,
            other => panic!("expected comparison, got {other:?}"),
        }
    }

    #[test]
    fn capture_only_numbers_files_per_name() -> CaptureResult<()> {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(dir.path(), MockProvider::new(100, 100))?;

        let outcome = orchestrator.capture(CaptureOptions::default())?.wait();
        assert!(outcome.is_success());
        let first = expect_captured(outcome);
        let second = expect_captured(orchestrator.capture(CaptureOptions::default())?.wait());

        assert!(first.to_string_lossy().ends_with("_0.png"));
        assert!(second.to_string_lossy().ends_with("_1.png"));
        assert_eq!(first, dir.path().join("screenshot_0.png"));
        assert!(first.exists() && second.exists());
        Ok(())
    }

    #[test]
    fn switching_names_resets_the_sequence() -> CaptureResult<()> {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(dir.path(), MockProvider::new(10, 10))?;

        let mut labels = Vec::new();
        for name in ["a", "b", "a"] {
            let location = expect_captured(orchestrator.capture(CaptureOptions::named(name))?.wait());
            labels.push(location.file_name().unwrap().to_string_lossy().into_owned());
        }
        assert_eq!(labels, vec!["a_0.png", "b_0.png", "a_0.png"]);
        Ok(())
    }

    #[test]
    fn identical_baseline_reports_zero_and_no_diff_file() -> CaptureResult<()> {
        let dir = tempfile::tempdir().unwrap();
        let baseline_dir = tempfile::tempdir().unwrap();
        let baseline = write_baseline(
            baseline_dir.path(),
            "home.png",
            &PixelBuffer::filled(100, 100, FILL)?,
        )?;
        let orchestrator = orchestrator(dir.path(), MockProvider::new(100, 100))?;

        let compare = CompareOptions::new(baseline).write_actual(true).write_diff(true);
        let result = expect_compared(
            orchestrator
                .capture_and_compare(CaptureOptions::named("home"), compare)?
                .wait(),
        );

        assert_eq!(result.differing_pixels, 0);
        assert_eq!(result.diff_location, None);
        assert_eq!(result.actual_location, Some(dir.path().join("home_0.png")));
        assert!(!dir.path().join("home_0_Diff.png").exists());
        Ok(())
    }

    #[test]
    fn smaller_baseline_is_a_size_mismatch() -> CaptureResult<()> {
        let dir = tempfile::tempdir().unwrap();
        let baseline_dir = tempfile::tempdir().unwrap();
        let baseline = write_baseline(
            baseline_dir.path(),
            "small.png",
            &PixelBuffer::filled(50, 50, FILL)?,
        )?;
        let orchestrator = orchestrator(dir.path(), MockProvider::new(100, 100))?;

        let outcome = orchestrator
            .capture_and_compare(
                CaptureOptions::named("home"),
                CompareOptions::new(baseline).write_diff(true),
            )?
            .wait();

        assert!(matches!(
            outcome,
            CaptureOutcome::Failed(CaptureError::SizeMismatch {
                actual: (100, 100),
                baseline: (50, 50)
            })
        ));
        assert!(!dir.path().join("home_0_Diff.png").exists());
        Ok(())
    }

    #[test]
    fn asynchronous_request_acknowledges_before_final_reply() -> CaptureResult<()> {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(dir.path(), MockProvider::new(20, 20))?;

        let ticket = orchestrator.capture(CaptureOptions::named("async").asynchronous(true))?;
        assert!(matches!(ticket.recv(), Ok(CaptureReply::CaptureTaken)));
        match ticket.recv() {
            Ok(CaptureReply::Final(outcome)) => {
                assert_eq!(expect_captured(outcome), dir.path().join("async_0.png"));
            }
            other => panic!("expected final reply, got {other:?}"),
        }
        assert!(ticket.recv().is_err());
        Ok(())
    }

    #[test]
    fn synchronous_request_sends_only_the_final_reply() -> CaptureResult<()> {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(dir.path(), MockProvider::new(20, 20))?;

        let ticket = orchestrator.capture(CaptureOptions::named("sync"))?;
        assert!(ticket.recv().is_ok_and(|reply| reply.is_final()));
        assert!(ticket.recv().is_err());
        Ok(())
    }

    #[test]
    fn missing_baseline_fails_without_disturbing_the_counter() -> CaptureResult<()> {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(dir.path(), MockProvider::new(10, 10))?;
        let missing = dir.path().join("missing.png").to_string_lossy().into_owned();

        let outcome = orchestrator
            .capture_and_compare(CaptureOptions::named("page"), CompareOptions::new(missing))?
            .wait();
        assert!(matches!(
            outcome,
            CaptureOutcome::Failed(CaptureError::ResourceNotFound(_))
        ));

        let next = expect_captured(orchestrator.capture(CaptureOptions::named("page"))?.wait());
        assert_eq!(next, dir.path().join("page_1.png"));
        Ok(())
    }

    #[test]
    fn snapshot_failure_is_reported_and_later_requests_proceed() -> CaptureResult<()> {
        let dir = tempfile::tempdir().unwrap();
        let mut provider = MockProvider::new(10, 10);
        provider.fail_on = Some(0);
        let orchestrator = orchestrator(dir.path(), provider)?;

        let outcome = orchestrator.capture(CaptureOptions::named("flaky"))?.wait();
        assert!(matches!(outcome, CaptureOutcome::Failed(CaptureError::Snapshot(_))));

        let next = expect_captured(orchestrator.capture(CaptureOptions::named("flaky"))?.wait());
        assert_eq!(next, dir.path().join("flaky_1.png"));
        Ok(())
    }

    #[test]
    fn sub_rect_capture_persists_only_the_region() -> CaptureResult<()> {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(dir.path(), MockProvider::new(100, 80))?;

        let options = CaptureOptions::named("crop").with_region(CaptureRegion::new(10, 20, 30, 15));
        let location = expect_captured(orchestrator.capture(options)?.wait());

        let written = PngCodec::default().decode(&std::fs::read(location).unwrap())?;
        assert_eq!(written.dimensions(), (30, 15));
        Ok(())
    }

    #[test]
    fn sub_rect_compare_uses_region_sized_baseline() -> CaptureResult<()> {
        let dir = tempfile::tempdir().unwrap();
        let baseline_dir = tempfile::tempdir().unwrap();
        let mut baseline = PixelBuffer::filled(30, 15, FILL)?.into_samples();
        for idx in [0, 17, 449] {
            baseline[idx] = 0xFF00_0000;
        }
        let baseline = write_baseline(
            baseline_dir.path(),
            "crop.png",
            &PixelBuffer::from_argb(30, 15, baseline)?,
        )?;
        let orchestrator = orchestrator(dir.path(), MockProvider::new(100, 80))?;

        let options = CaptureOptions::named("crop").with_region(CaptureRegion::new(10, 20, 30, 15));
        let result = expect_compared(
            orchestrator
                .capture_and_compare(options, CompareOptions::new(baseline).write_actual(true))?
                .wait(),
        );

        assert_eq!(result.differing_pixels, 3);
        assert_eq!(result.diff_location, None);
        let actual = result.actual_location.expect("actual written");
        let written = PngCodec::default().decode(&std::fs::read(actual).unwrap())?;
        assert_eq!(written.dimensions(), (30, 15));
        Ok(())
    }

    struct PanickingCodec;

    impl ImageCodec for PanickingCodec {
        fn decode(&self, bytes: &[u8]) -> CaptureResult<PixelBuffer> {
            PngCodec::default().decode(bytes)
        }

        fn encode(&self, _buffer: &PixelBuffer) -> CaptureResult<Vec<u8>> {
            panic!("encoder exploded");
        }

        fn extension(&self) -> &'static str {
            "png"
        }
    }

    #[test]
    fn codec_panic_is_delivered_as_failure() -> CaptureResult<()> {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = CaptureOrchestrator::builder()
            .with_provider(MockProvider::new(4, 4))
            .with_codec(Arc::new(PanickingCodec))
            .storage_root(dir.path())
            .worker_threads(1)
            .build()?;

        for _ in 0..2 {
            let outcome = orchestrator.capture(CaptureOptions::named("boom"))?.wait();
            assert!(!outcome.is_success());
            match outcome {
                CaptureOutcome::Failed(CaptureError::WorkerPanic(message)) => {
                    assert!(message.contains("encoder exploded"));
                }
                other => panic!("expected worker panic, got {other:?}"),
            }
        }
        assert!(orchestrator.is_running());
        Ok(())
    }

    #[test]
    fn bundled_asset_is_used_as_baseline() -> CaptureResult<()> {
        let dir = tempfile::tempdir().unwrap();
        let mut baseline = PixelBuffer::filled(4, 4, FILL)?.into_samples();
        baseline[5] = 0xFF00_0000;
        let baseline = PixelBuffer::from_argb(4, 4, baseline)?;
        let assets = MemoryAssets::new().with("baselines/grid.png", PngCodec::default().encode(&baseline)?);

        let orchestrator = CaptureOrchestrator::builder()
            .with_provider(MockProvider::new(4, 4))
            .with_assets(Arc::new(assets))
            .storage_root(dir.path())
            .worker_threads(1)
            .build()?;

        let compare = CompareOptions::new("baselines/grid.png").write_diff(true).binary(true);
        let result = expect_compared(
            orchestrator
                .capture_and_compare(CaptureOptions::named("grid"), compare)?
                .wait(),
        );
        assert_eq!(result.differing_pixels, 1);
        assert_eq!(result.actual_location, None);
        let diff_path = result.diff_location.expect("diff written");

        let diff = PngCodec::default().decode(&std::fs::read(diff_path).unwrap())?;
        for (idx, &px) in diff.samples().iter().enumerate() {
            let expected = if idx == 5 { 0xFFFF_FFFF } else { 0xFF00_0000 };
            assert_eq!(px, expected, "pixel {idx}");
        }
        Ok(())
    }

    #[test]
    fn concurrent_requests_get_distinct_sequences() -> CaptureResult<()> {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = Arc::new(orchestrator(dir.path(), MockProvider::new(16, 16))?);
        let locations = Arc::new(Mutex::new(Vec::new()));

        let submitters: Vec<_> = (0..4)
            .map(|_| {
                let orchestrator = Arc::clone(&orchestrator);
                let locations = Arc::clone(&locations);
                std::thread::spawn(move || {
                    for _ in 0..5 {
                        let ticket = orchestrator.capture(CaptureOptions::named("burst")).unwrap();
                        let location = expect_captured(ticket.wait());
                        locations.lock().unwrap().push(location);
                    }
                })
            })
            .collect();
        for handle in submitters {
            handle.join().unwrap();
        }

        let locations = locations.lock().unwrap();
        let unique: HashSet<_> = locations.iter().collect();
        assert_eq!(unique.len(), 20);
        for seq in 0..20 {
            assert!(unique.contains(&dir.path().join(format!("burst_{seq}.png"))));
        }
        Ok(())
    }

    #[test]
    fn builder_requires_a_provider_and_workers() {
        let err = CaptureOrchestrator::builder().build().err().unwrap();
        assert!(matches!(err, CaptureError::InvalidConfig(_)));

        let err = CaptureOrchestrator::builder()
            .with_provider(MockProvider::new(1, 1))
            .worker_threads(0)
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, CaptureError::InvalidConfig(_)));
    }

    #[cfg(feature = "tokio-stream")]
    #[tokio::test]
    async fn async_ticket_streams_both_replies() -> CaptureResult<()> {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(dir.path(), MockProvider::new(8, 8))?;

        let mut ticket =
            orchestrator.capture_async(CaptureOptions::named("tokio").asynchronous(true))?;
        assert!(matches!(ticket.next_reply().await, Some(CaptureReply::CaptureTaken)));
        let outcome = ticket.outcome().await;
        assert_eq!(expect_captured(outcome), dir.path().join("tokio_0.png"));
        Ok(())
    }
}

use super::metrics::{EngineMetrics, MetricsSnapshot};
use super::store::{DescriptorStore, FsDescriptorStore};
use crate::buffer::FrameBuffer;
use crate::common::Frame;
use crate::config::EngineSettings;
use crate::error::{AppError, ConfigurationError};
use crate::pipeline::{DescriptorSource, Pipeline, PipelineDescriptor, StepFactory, WorkerPool};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type ActivePipeline = Option<Arc<Pipeline>>;

struct Shared {
    input: Arc<FrameBuffer>,
    output: Arc<FrameBuffer>,
    factory: Arc<StepFactory>,
    store: Arc<dyn DescriptorStore>,
    pipeline: watch::Sender<ActivePipeline>,
    metrics: EngineMetrics,
    cancel_token: CancellationToken,
    idle_poll_interval: Duration,
    advertise_pipeline: bool,
}

/// Moves frames from the input buffer through the active pipeline into the
/// output buffer.
///
/// The engine starts idle: until the first pipeline is installed the loop
/// waits and leaves the input buffer untouched. The input buffer's
/// `pipeline_available` flag is owned by the engine and only raised once a
/// pipeline is installed. Cloning is cheap and every clone drives the same
/// engine.
#[derive(Clone)]
pub struct Engine {
    shared: Arc<Shared>,
    pool: WorkerPool,
}

impl Engine {
    /// Parse, build and install a pipeline. On any error the active pipeline
    /// is left as it was.
    pub async fn set_pipeline(&self, source: DescriptorSource) -> Result<(), ConfigurationError> {
        let text = match source {
            DescriptorSource::Inline(text) => text,
            DescriptorSource::Stored(reference) => self.shared.store.fetch(&reference).await?,
        };
        let descriptor = PipelineDescriptor::from_yaml(&text)?;
        self.set_pipeline_descriptor(descriptor).await
    }

    pub async fn set_pipeline_descriptor(&self, descriptor: PipelineDescriptor) -> Result<(), ConfigurationError> {
        // Building may load models, keep it off the async workers.
        let factory = Arc::clone(&self.shared.factory);
        let pipeline = tokio::task::spawn_blocking(move || Pipeline::configure(&factory, descriptor))
            .await
            .map_err(|e| ConfigurationError::Build(e.to_string()))??;

        info!(
            "Pipeline '{}' installed with {} steps",
            pipeline.configuration().name.as_deref().unwrap_or("unnamed"),
            pipeline.len()
        );
        self.shared.pipeline.send_replace(Some(Arc::new(pipeline)));
        self.shared.metrics.record_reconfiguration();
        self.shared
            .input
            .set_pipeline_available(self.shared.advertise_pipeline);
        Ok(())
    }

    /// Snapshot of the active pipeline's descriptor, `None` while idle.
    pub fn get_pipeline(&self) -> Option<PipelineDescriptor> {
        self.shared
            .pipeline
            .borrow()
            .as_ref()
            .map(|pipeline| pipeline.configuration().clone())
    }

    /// The active descriptor as YAML; an empty step list while idle.
    pub fn get_pipeline_yaml(&self) -> Result<String, ConfigurationError> {
        self.get_pipeline().unwrap_or_default().to_yaml()
    }

    pub fn is_configured(&self) -> bool {
        self.shared.pipeline.borrow().is_some()
    }

    pub fn input(&self) -> &Arc<FrameBuffer> {
        &self.shared.input
    }

    pub fn output(&self) -> &Arc<FrameBuffer> {
        &self.shared.output
    }

    pub fn step_timeout(&self) -> Duration {
        self.pool.step_timeout()
    }

    pub fn idle_poll_interval(&self) -> Duration {
        self.shared.idle_poll_interval
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.shared.cancel_token.clone()
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.cancel_token.is_cancelled()
    }

    pub fn shutdown(&self) {
        info!("Shutting down engine");
        self.shared.cancel_token.cancel();
    }

    pub fn spawn(&self) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move { engine.run().await })
    }

    /// Like [`Engine::spawn`], but a panicking loop is restarted with the
    /// pipeline it had.
    pub fn spawn_supervised(&self) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            loop {
                match engine.spawn().await {
                    Ok(()) => break,
                    Err(e) if e.is_panic() && !engine.is_shutdown() => {
                        error!("Engine loop panicked, restarting: {}", e);
                    }
                    Err(e) => {
                        error!("Engine loop ended abnormally: {}", e);
                        break;
                    }
                }
            }
        })
    }

    pub async fn run(&self) {
        info!("Starting frame processing loop.");
        let mut pool = self.pool.clone();
        let mut pipeline_rx = self.shared.pipeline.subscribe();
        let cancel_token = &self.shared.cancel_token;

        while !cancel_token.is_cancelled() {
            let current = pipeline_rx.borrow_and_update().clone();
            let Some(pipeline) = current else {
                debug!("No pipeline configured, waiting");
                tokio::select! {
                    _ = cancel_token.cancelled() => break,
                    changed = pipeline_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
                continue;
            };

            let Some(frame) = self.shared.input.get_frame() else {
                self.shared.metrics.record_idle_poll();
                tokio::select! {
                    _ = cancel_token.cancelled() => break,
                    _ = tokio::time::sleep(self.shared.idle_poll_interval) => {}
                }
                continue;
            };

            self.process_frame(&pipeline, frame, &mut pool).await;
        }
        info!("Frame processing loop stopped.");
    }

    async fn process_frame(&self, pipeline: &Pipeline, frame: Frame, pool: &mut WorkerPool) {
        let frame_id = frame.id();
        match pipeline.run(frame, pool).await {
            Ok(output) => {
                self.shared.metrics.record_processed();
                if !self.shared.output.add_frame(output) {
                    self.shared.metrics.record_output_rejected();
                    warn!("Output buffer full, dropped frame {}", frame_id);
                }
            }
            Err(e) => {
                self.shared.metrics.record_failed();
                warn!("Dropped frame {}: {}", frame_id, e);
            }
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("input", &self.shared.input.name())
            .field("output", &self.shared.output.name())
            .field("pipeline", &self.get_pipeline().map(|p| p.name))
            .field("pool", &self.pool)
            .finish()
    }
}

pub struct EngineBuilder {
    settings: EngineSettings,
    input: Option<Arc<FrameBuffer>>,
    output: Option<Arc<FrameBuffer>>,
    factory: Option<Arc<StepFactory>>,
    store: Option<Arc<dyn DescriptorStore>>,
    cancel_token: Option<CancellationToken>,
    idle_poll_interval: Option<Duration>,
    step_timeout: Option<Duration>,
}

impl EngineBuilder {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            input: None,
            output: None,
            factory: None,
            store: None,
            cancel_token: None,
            idle_poll_interval: None,
            step_timeout: None,
        }
    }

    pub fn input_buffer(mut self, input: Arc<FrameBuffer>) -> Self {
        self.input = Some(input);
        self
    }

    pub fn output_buffer(mut self, output: Arc<FrameBuffer>) -> Self {
        self.output = Some(output);
        self
    }

    pub fn factory(mut self, factory: Arc<StepFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn descriptor_store(mut self, store: Arc<dyn DescriptorStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn cancel_token(mut self, cancel_token: CancellationToken) -> Self {
        self.cancel_token = Some(cancel_token);
        self
    }

    // Sets the idle poll interval, this will override the configured value.
    pub fn idle_poll_interval(mut self, interval: Duration) -> Self {
        self.idle_poll_interval = Some(interval);
        self
    }

    // Sets the number of concurrent steps, this will override the configured value.
    pub fn worker_threads(mut self, worker_threads: usize) -> Self {
        self.settings.worker_threads = worker_threads;
        self
    }

    // Sets the per-step timeout, this will override the configured value.
    pub fn step_timeout(mut self, step_timeout: Duration) -> Self {
        self.step_timeout = Some(step_timeout);
        self
    }

    // Sets whether ingest may route into the engine, this will override the configured value.
    pub fn pipeline_enabled(mut self, enabled: bool) -> Self {
        self.settings.pipeline_enabled = enabled;
        self
    }

    pub fn build(self) -> Result<Engine, AppError> {
        let input = self
            .input
            .ok_or(AppError::Engine("Input buffer not set".to_string()))?;
        let output = self
            .output
            .ok_or(AppError::Engine("Output buffer not set".to_string()))?;
        let (pipeline, _) = watch::channel(None);
        let idle_poll_interval = self
            .idle_poll_interval
            .unwrap_or_else(|| self.settings.idle_poll_interval());
        let step_timeout = self
            .step_timeout
            .unwrap_or_else(|| self.settings.step_timeout());
        // Nothing can process frames until a pipeline is installed.
        input.set_pipeline_available(false);

        Ok(Engine {
            shared: Arc::new(Shared {
                input,
                output,
                factory: self.factory.unwrap_or_default(),
                store: self
                    .store
                    .unwrap_or_else(|| Arc::new(FsDescriptorStore::new())),
                pipeline,
                metrics: EngineMetrics::default(),
                cancel_token: self.cancel_token.unwrap_or_default(),
                idle_poll_interval,
                advertise_pipeline: self.settings.pipeline_enabled,
            }),
            pool: WorkerPool::new(self.settings.worker_threads, step_timeout),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::OverflowPolicy;
    use crate::common::codec::encoded_test_image;
    use image::ImageFormat;
    use std::time::Instant;

    fn builder() -> EngineBuilder {
        EngineBuilder::new(EngineSettings::default())
            .input_buffer(Arc::new(FrameBuffer::new("input", 8, OverflowPolicy::DropNewest)))
            .output_buffer(Arc::new(FrameBuffer::new("output", 8, OverflowPolicy::DropNewest)))
    }

    #[test]
    fn test_build_requires_buffers() {
        let result = EngineBuilder::new(EngineSettings::default()).build();
        assert!(matches!(result, Err(AppError::Engine(_))));
    }

    #[tokio::test]
    async fn test_starts_idle() {
        let engine = builder().build().unwrap();
        assert!(!engine.is_configured());
        assert_eq!(engine.get_pipeline(), None);
        assert_eq!(
            PipelineDescriptor::from_yaml(&engine.get_pipeline_yaml().unwrap()).unwrap(),
            PipelineDescriptor::default()
        );
    }

    #[test]
    fn test_builder_keeps_sub_millisecond_durations() {
        let engine = builder()
            .step_timeout(Duration::from_micros(500))
            .idle_poll_interval(Duration::from_micros(750))
            .build()
            .unwrap();
        assert_eq!(engine.step_timeout(), Duration::from_micros(500));
        assert_eq!(engine.idle_poll_interval(), Duration::from_micros(750));
    }

    #[test]
    fn test_builder_defaults_to_configured_durations() {
        let settings = EngineSettings::default();
        let engine = builder().build().unwrap();
        assert_eq!(engine.step_timeout(), settings.step_timeout());
        assert_eq!(engine.idle_poll_interval(), settings.idle_poll_interval());
    }

    #[tokio::test]
    async fn test_pipeline_available_follows_installed_pipeline() {
        let input = Arc::new(FrameBuffer::new("input", 8, OverflowPolicy::DropNewest));
        input.set_pipeline_available(true);
        let engine = builder().input_buffer(input).build().unwrap();
        assert!(!engine.input().pipeline_available());

        let result = engine
            .set_pipeline(DescriptorSource::Inline(
                "- type: function\n  function: no_such_function\n".to_string(),
            ))
            .await;
        assert!(result.is_err());
        assert!(!engine.input().pipeline_available());

        engine
            .set_pipeline(DescriptorSource::Inline("steps: []\n".to_string()))
            .await
            .unwrap();
        assert!(engine.input().pipeline_available());
    }

    #[tokio::test]
    async fn test_disabled_engine_never_advertises_pipeline() {
        let engine = builder().pipeline_enabled(false).build().unwrap();
        engine
            .set_pipeline(DescriptorSource::Inline("steps: []\n".to_string()))
            .await
            .unwrap();
        assert!(engine.is_configured());
        assert!(!engine.input().pipeline_available());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failed_set_keeps_active_pipeline() {
        let engine = builder().build().unwrap();
        engine
            .set_pipeline(DescriptorSource::Inline(
                "- type: function\n  function: enhance_image\n  params: {factor: 1.5}\n".to_string(),
            ))
            .await
            .unwrap();
        let before = engine.get_pipeline();

        let result = engine
            .set_pipeline(DescriptorSource::Inline(
                "- type: function\n  function: no_such_function\n".to_string(),
            ))
            .await;
        assert!(matches!(result, Err(ConfigurationError::UnknownFunction { .. })));
        assert_eq!(engine.get_pipeline(), before);
        assert_eq!(engine.metrics().reconfigurations, 1);

        // Frames still run on the pipeline that was active before the failed set.
        let task = engine.spawn();
        assert!(engine
            .input()
            .add_frame(Frame::new(encoded_test_image(8, 8, ImageFormat::Png))));
        let deadline = Instant::now() + Duration::from_secs(5);
        while engine.output().is_empty() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(engine.output().len(), 1);
        let metrics = engine.metrics();
        assert_eq!(metrics.frames_processed, 1);
        assert_eq!(metrics.frames_failed, 0);

        engine.shutdown();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_stops_idle_loop() {
        let engine = builder().build().unwrap();
        let handle = engine.spawn();
        engine.shutdown();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}

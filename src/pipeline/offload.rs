use super::steps::Step;
use crate::common::Frame;
use crate::error::StepError;
use futures::future::BoxFuture;
use std::any::Any;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::Semaphore;
use tower::timeout::error::Elapsed;
use tower::timeout::Timeout;
use tower::{BoxError, Service, ServiceBuilder, ServiceExt};

/// One step applied to one frame.
pub struct StepJob {
    pub step: Arc<dyn Step>,
    pub frame: Frame,
}

/// Runs a step on tokio's blocking thread pool so a slow, non-cooperative
/// step never stalls the async workers.
///
/// A worker slot is taken before the job starts and released only when
/// `process` returns, even if the caller has stopped waiting for it.
#[derive(Debug, Clone)]
pub struct BlockingStepService {
    slots: Arc<Semaphore>,
}

impl BlockingStepService {
    pub fn new(max_workers: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(max_workers.max(1))),
        }
    }

    pub fn available_workers(&self) -> usize {
        self.slots.available_permits()
    }
}

impl Service<StepJob> for BlockingStepService {
    type Response = Option<Frame>;
    type Error = StepError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, job: StepJob) -> Self::Future {
        let slots = Arc::clone(&self.slots);
        Box::pin(async move {
            let permit = slots
                .acquire_owned()
                .await
                .map_err(|e| StepError::WorkerPool(e.to_string()))?;
            let StepJob { step, frame } = job;
            tokio::task::spawn_blocking(move || {
                let _permit = permit;
                step.process(&frame)
            })
            .await
            .map_err(|e| {
                if e.is_panic() {
                    StepError::Panicked(panic_message(e.into_panic()))
                } else {
                    StepError::WorkerPool(e.to_string())
                }
            })?
        })
    }
}

/// Bounded offload capability for step execution.
///
/// At most `max_workers` steps run at once across every clone of the pool.
/// The caller waits at most `step_timeout` for a slot and the result
/// together. A timed-out step keeps its thread and its slot until it
/// returns; its result is discarded.
#[derive(Clone)]
pub struct WorkerPool {
    service: Timeout<BlockingStepService>,
    slots: BlockingStepService,
    step_timeout: Duration,
}

impl WorkerPool {
    pub fn new(max_workers: usize, step_timeout: Duration) -> Self {
        let slots = BlockingStepService::new(max_workers);
        let service = ServiceBuilder::new()
            .timeout(step_timeout)
            .service(slots.clone());
        Self {
            service,
            slots,
            step_timeout,
        }
    }

    pub async fn execute(&mut self, step: Arc<dyn Step>, frame: Frame) -> Result<Option<Frame>, StepError> {
        let step_timeout = self.step_timeout;
        let service = self
            .service
            .ready()
            .await
            .map_err(|e| into_step_error(e, step_timeout))?;
        service
            .call(StepJob { step, frame })
            .await
            .map_err(|e| into_step_error(e, step_timeout))
    }

    pub fn step_timeout(&self) -> Duration {
        self.step_timeout
    }

    pub fn available_workers(&self) -> usize {
        self.slots.available_workers()
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("step_timeout", &self.step_timeout)
            .field("available_workers", &self.available_workers())
            .finish()
    }
}

fn into_step_error(error: BoxError, step_timeout: Duration) -> StepError {
    if error.is::<Elapsed>() {
        return StepError::Timeout(step_timeout);
    }
    match error.downcast::<StepError>() {
        Ok(step_error) => *step_error,
        Err(other) => StepError::WorkerPool(other.to_string()),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

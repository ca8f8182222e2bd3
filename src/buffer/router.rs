use super::FrameBuffer;
use crate::common::Frame;
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Pipeline,
    Passthrough,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteOutcome {
    pub route: Route,
    pub accepted: bool,
}

/// Used by ingest adapters: frames enter the pipeline while the input buffer
/// advertises one, and go straight to the output buffer otherwise.
#[derive(Debug, Clone)]
pub struct IngestRouter {
    input: Arc<FrameBuffer>,
    output: Arc<FrameBuffer>,
}

impl IngestRouter {
    pub fn new(input: Arc<FrameBuffer>, output: Arc<FrameBuffer>) -> Self {
        Self { input, output }
    }

    pub fn route(&self, frame: Frame) -> RouteOutcome {
        let (route, buffer) = if self.input.pipeline_available() {
            (Route::Pipeline, &self.input)
        } else {
            (Route::Passthrough, &self.output)
        };
        let accepted = buffer.add_frame(frame);
        trace!(?route, accepted, "Routed ingest frame");
        RouteOutcome { route, accepted }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::OverflowPolicy;

    fn buffers() -> (Arc<FrameBuffer>, Arc<FrameBuffer>) {
        (
            Arc::new(FrameBuffer::new("input", 2, OverflowPolicy::DropNewest)),
            Arc::new(FrameBuffer::new("output", 2, OverflowPolicy::DropNewest)),
        )
    }

    #[test]
    fn test_passthrough_when_pipeline_unavailable() {
        let (input, output) = buffers();
        let router = IngestRouter::new(input.clone(), output.clone());

        let outcome = router.route(Frame::new(vec![1]));
        assert_eq!(outcome, RouteOutcome { route: Route::Passthrough, accepted: true });
        assert!(input.is_empty());
        assert_eq!(output.len(), 1);
    }

    #[test]
    fn test_routes_into_pipeline_when_available() {
        let (input, output) = buffers();
        input.set_pipeline_available(true);
        let router = IngestRouter::new(input.clone(), output.clone());

        router.route(Frame::new(vec![1]));
        router.route(Frame::new(vec![2]));
        let outcome = router.route(Frame::new(vec![3]));

        assert_eq!(outcome, RouteOutcome { route: Route::Pipeline, accepted: false });
        assert_eq!(input.len(), 2);
        assert!(output.is_empty());
    }
}

pub mod frame_buffer;
pub mod router;

pub use frame_buffer::{BufferStats, FrameBuffer, OverflowPolicy};
pub use router::{IngestRouter, Route, RouteOutcome};

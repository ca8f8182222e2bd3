pub mod control;
pub mod engine;
pub mod metrics;
pub mod store;

pub use control::{ControlCommand, ControlHandle};
pub use engine::{Engine, EngineBuilder};
pub use metrics::{EngineMetrics, MetricsSnapshot};
pub use store::{DescriptorStore, FsDescriptorStore};

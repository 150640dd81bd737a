pub mod config;
pub mod generator;
pub mod handlers;
pub mod metrics;
pub mod router;

pub use config::ExporterConfig;
pub use generator::{GeneratorConfig, GeneratorHandle, TrafficGenerator};
pub use metrics::{MetricsRegistry, SystemCollector, TrafficRecorder};
pub use router::{ExporterState, exporter_router};

pub mod collectors;
pub mod probe;
pub mod registry;
pub mod types;

pub use collectors::{process::ProcessCollector, system::SystemCollector, traffic::TrafficRecorder};
pub use probe::{HostProbe, SysinfoProbe};
pub use registry::{Collector, MetricsRegistry};
pub use types::{CollectedMetric, MetricDescriptor, MetricSample, MetricType, MetricValue};

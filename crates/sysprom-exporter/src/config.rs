use std::{path::PathBuf, time::Duration};

pub const DEFAULT_PORT: u16 = 9091;
pub const DEFAULT_CPU_WINDOW: Duration = Duration::from_secs(1);
pub const DEFAULT_GENERATOR_INTERVAL: Duration = Duration::from_secs(2);
pub const MIN_GENERATOR_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct ExporterConfig {
    pub host: String,
    pub port: u16,
    /// Mount point reported by `system_disk_usage_percent`.
    pub disk_path: PathBuf,
    pub cpu_window: Duration,
    pub generator_enabled: bool,
    pub generator_interval: Duration,
    /// Feed served requests into the traffic recorder.
    pub track_requests: bool,
}

impl ExporterConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            disk_path: PathBuf::from("/"),
            cpu_window: DEFAULT_CPU_WINDOW,
            generator_enabled: true,
            generator_interval: DEFAULT_GENERATOR_INTERVAL,
            track_requests: false,
        }
    }
}

use std::{path::PathBuf, sync::Arc, time::Duration};

use crate::metrics::{
    collectors::skipped,
    probe::HostProbe,
    registry::Collector,
    types::{CollectedMetric, MetricDescriptor, MetricType, MetricValue},
};

/// Host resource gauges, sampled fresh on every scrape.
pub struct SystemCollector {
    probe: Arc<dyn HostProbe>,
    disk_path: PathBuf,
    cpu_window: Duration,
    cpu_usage: MetricDescriptor,
    memory_used: MetricDescriptor,
    disk_usage: MetricDescriptor,
    network_sent: MetricDescriptor,
    network_received: MetricDescriptor,
}

impl SystemCollector {
    pub fn new(
        probe: Arc<dyn HostProbe>,
        disk_path: impl Into<PathBuf>,
        cpu_window: Duration,
    ) -> Self {
        Self {
            probe,
            disk_path: disk_path.into(),
            cpu_window,
            cpu_usage: MetricDescriptor::new(
                "system_cpu_usage_percent",
                "Current CPU usage in percent",
                MetricType::Gauge,
                &[],
            ),
            memory_used: MetricDescriptor::new(
                "system_memory_used_bytes",
                "Currently used memory in bytes",
                MetricType::Gauge,
                &[],
            ),
            disk_usage: MetricDescriptor::new(
                "system_disk_usage_percent",
                "Disk usage percentage for root partition",
                MetricType::Gauge,
                &["path"],
            ),
            network_sent: MetricDescriptor::new(
                "system_network_sent_bytes_total",
                "Total bytes sent over network",
                MetricType::Counter,
                &["interface"],
            ),
            network_received: MetricDescriptor::new(
                "system_network_received_bytes_total",
                "Total bytes received over network",
                MetricType::Counter,
                &["interface"],
            ),
        }
    }
}

impl Collector for SystemCollector {
    fn describe(&self) -> Vec<MetricDescriptor> {
        vec![
            self.cpu_usage.clone(),
            self.memory_used.clone(),
            self.disk_usage.clone(),
            self.network_sent.clone(),
            self.network_received.clone(),
        ]
    }

    fn collect(&self) -> Vec<CollectedMetric> {
        let mut collected = Vec::new();

        match self.probe.cpu_usage_percent(self.cpu_window) {
            Ok(percent) => collected.push(CollectedMetric::single(
                &self.cpu_usage,
                MetricValue::Gauge(percent),
            )),
            Err(err) => skipped(&self.cpu_usage, &err),
        }

        match self.probe.memory_used_bytes() {
            Ok(used) => collected.push(CollectedMetric::single(
                &self.memory_used,
                MetricValue::Gauge(used as f64),
            )),
            Err(err) => skipped(&self.memory_used, &err),
        }

        match self.probe.disk_usage(&self.disk_path) {
            Ok(usage) => {
                let mount = usage.mount.to_string_lossy().into_owned();
                let mut family = CollectedMetric::new(&self.disk_usage);
                family.push(&[mount.as_str()], MetricValue::Gauge(usage.used_percent));
                collected.push(family);
            }
            Err(err) => skipped(&self.disk_usage, &err),
        }

        match self.probe.network_counters() {
            Ok(counters) => {
                let mut sent = CollectedMetric::new(&self.network_sent);
                let mut received = CollectedMetric::new(&self.network_received);
                for counter in counters {
                    let interface = counter.name.as_str();
                    sent.push(&[interface], MetricValue::Counter(counter.bytes_sent as f64));
                    received.push(
                        &[interface],
                        MetricValue::Counter(counter.bytes_received as f64),
                    );
                }
                collected.push(sent);
                collected.push(received);
            }
            Err(err) => {
                skipped(&self.network_sent, &err);
                skipped(&self.network_received, &err);
            }
        }

        collected
    }
}

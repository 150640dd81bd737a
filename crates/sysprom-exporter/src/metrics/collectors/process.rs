use std::{path::Path, time::Instant};

use sysprom_common::error::{Result, SyspromError};

use crate::metrics::{
    collectors::skipped,
    registry::Collector,
    types::{CollectedMetric, MetricDescriptor, MetricType, MetricValue},
};

pub struct ProcessCollector {
    start_time: Instant,
    uptime_seconds: MetricDescriptor,
    resident_memory_bytes: MetricDescriptor,
}

impl ProcessCollector {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            uptime_seconds: MetricDescriptor::new(
                "process_uptime_seconds",
                "Process uptime in seconds",
                MetricType::Gauge,
                &[],
            ),
            resident_memory_bytes: MetricDescriptor::new(
                "process_resident_memory_bytes",
                "Resident memory size of the process in bytes",
                MetricType::Gauge,
                &[],
            ),
        }
    }
}

impl Default for ProcessCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for ProcessCollector {
    fn describe(&self) -> Vec<MetricDescriptor> {
        vec![self.uptime_seconds.clone(), self.resident_memory_bytes.clone()]
    }

    fn collect(&self) -> Vec<CollectedMetric> {
        let mut collected = vec![CollectedMetric::single(
            &self.uptime_seconds,
            MetricValue::Gauge(self.start_time.elapsed().as_secs_f64()),
        )];

        match read_resident_memory_bytes(PROC_STATUS_PATH) {
            Ok(resident_bytes) => collected.push(CollectedMetric::single(
                &self.resident_memory_bytes,
                MetricValue::Gauge(resident_bytes as f64),
            )),
            Err(err) => skipped(&self.resident_memory_bytes, &err),
        }

        collected
    }
}

const PROC_STATUS_PATH: &str = "/proc/self/status";

#[cfg(target_os = "linux")]
fn read_resident_memory_bytes(status_path: impl AsRef<Path>) -> Result<u64> {
    let status = std::fs::read_to_string(status_path)?;
    parse_vm_rss(&status)
}

#[cfg(not(target_os = "linux"))]
fn read_resident_memory_bytes(_status_path: impl AsRef<Path>) -> Result<u64> {
    Err(SyspromError::Probe("resident memory is only read on linux".to_string()))
}

#[cfg_attr(not(any(target_os = "linux", test)), allow(dead_code))]
fn parse_vm_rss(status: &str) -> Result<u64> {
    let rest = status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))
        .ok_or_else(|| SyspromError::Probe("VmRSS missing from process status".to_string()))?;

    rest.split_whitespace()
        .next()
        .and_then(|value| value.parse::<u64>().ok())
        .and_then(|kb| kb.checked_mul(1024))
        .ok_or_else(|| SyspromError::Probe(format!("malformed VmRSS line: {}", rest.trim())))
}

#[cfg(test)]
mod tests {
    use crate::metrics::{registry::Collector, types::MetricValue};

    use sysprom_common::error::SyspromError;

    use super::{ProcessCollector, parse_vm_rss};

    #[test]
    fn parses_vm_rss_in_bytes() {
        let status = "Name:\tsysprom\nVmPeak:\t  9000 kB\nVmRSS:\t  2048 kB\nThreads:\t4\n";
        assert_eq!(parse_vm_rss(status).unwrap(), 2048 * 1024);
    }

    #[test]
    fn missing_or_malformed_vm_rss_is_rejected() {
        assert!(matches!(
            parse_vm_rss("Name:\tsysprom\n"),
            Err(SyspromError::Probe(_))
        ));
        assert!(matches!(
            parse_vm_rss("VmRSS:\tlots kB\n"),
            Err(SyspromError::Probe(_))
        ));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn unreadable_status_file_surfaces_io_error() {
        let err = super::read_resident_memory_bytes("/definitely/not/a/proc/status").unwrap_err();
        assert!(matches!(err, SyspromError::Io(_)), "unexpected error: {err}");
        assert!(err.is_recoverable());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn resident_memory_is_reported_on_linux() {
        let collected = ProcessCollector::new().collect();
        assert!(
            collected
                .iter()
                .any(|family| family.descriptor.name == "process_resident_memory_bytes")
        );
    }

    #[test]
    fn uptime_is_always_reported() {
        let collected = ProcessCollector::new().collect();
        let uptime = collected
            .iter()
            .find(|family| family.descriptor.name == "process_uptime_seconds")
            .unwrap();

        match uptime.samples[0].value {
            MetricValue::Gauge(seconds) => assert!(seconds >= 0.0),
            ref other => panic!("unexpected value: {other:?}"),
        }
    }
}

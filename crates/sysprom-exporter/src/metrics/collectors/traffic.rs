use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use crate::metrics::{
    registry::Collector,
    types::{CollectedMetric, MetricDescriptor, MetricType, MetricValue},
};

/// Default request latency buckets, in seconds.
pub const DEFAULT_BUCKETS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

type SeriesKey = (String, String);

#[derive(Debug, Clone)]
struct RequestSeries {
    requests: u64,
    /// Per-bucket counts, not cumulative. The extra trailing slot is `+Inf`.
    bucket_counts: Vec<u64>,
    count: u64,
    sum: f64,
}

impl RequestSeries {
    fn new(bucket_len: usize) -> Self {
        Self {
            requests: 0,
            bucket_counts: vec![0; bucket_len + 1],
            count: 0,
            sum: 0.0,
        }
    }
}

/// Point-in-time view of one `(path, method)` series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSnapshot {
    pub requests: u64,
    /// Cumulative, ending with `+Inf`.
    pub buckets: Vec<(f64, u64)>,
    pub count: u64,
    pub sum: f64,
}

/// Request counters and latency histograms keyed by path and method.
///
/// Constructing a recorder starts nothing; synthetic traffic comes from
/// [`crate::generator::TrafficGenerator`].
pub struct TrafficRecorder {
    buckets: Vec<f64>,
    series: Mutex<BTreeMap<SeriesKey, RequestSeries>>,
    requests_total: MetricDescriptor,
    request_duration_seconds: MetricDescriptor,
}

impl TrafficRecorder {
    pub fn new() -> Self {
        Self::with_buckets(&DEFAULT_BUCKETS)
    }

    pub fn with_buckets(buckets: &[f64]) -> Self {
        let mut sorted_buckets = buckets
            .iter()
            .copied()
            .filter(|bound| bound.is_finite())
            .collect::<Vec<_>>();
        sorted_buckets.sort_by(|left, right| left.total_cmp(right));
        sorted_buckets.dedup();

        Self {
            buckets: sorted_buckets,
            series: Mutex::new(BTreeMap::new()),
            requests_total: MetricDescriptor::new(
                "http_requests_total",
                "Total number of HTTP requests",
                MetricType::Counter,
                &["path", "method"],
            ),
            request_duration_seconds: MetricDescriptor::new(
                "http_request_duration_seconds",
                "Duration of HTTP requests in seconds",
                MetricType::Histogram,
                &["path", "method"],
            ),
        }
    }

    /// Counts one request and observes its duration under a single lock.
    pub fn record(&self, path: &str, method: &str, duration: Duration) {
        let seconds = duration.as_secs_f64();
        let bucket_index = self
            .buckets
            .iter()
            .position(|bound| seconds <= *bound)
            .unwrap_or(self.buckets.len());

        let mut series = self.lock_series();
        let entry = series
            .entry((path.to_string(), method.to_string()))
            .or_insert_with(|| RequestSeries::new(self.buckets.len()));

        entry.requests = entry.requests.saturating_add(1);
        entry.bucket_counts[bucket_index] = entry.bucket_counts[bucket_index].saturating_add(1);
        entry.count = entry.count.saturating_add(1);
        entry.sum += seconds;
    }

    pub fn snapshot(&self, path: &str, method: &str) -> Option<SeriesSnapshot> {
        let series = self.lock_series();
        series
            .get(&(path.to_string(), method.to_string()))
            .map(|entry| SeriesSnapshot {
                requests: entry.requests,
                buckets: self.cumulative_buckets(entry),
                count: entry.count,
                sum: entry.sum,
            })
    }

    /// Total requests recorded across every series.
    pub fn total_requests(&self) -> u64 {
        self.lock_series()
            .values()
            .map(|entry| entry.requests)
            .sum()
    }

    fn cumulative_buckets(&self, entry: &RequestSeries) -> Vec<(f64, u64)> {
        let mut cumulative = 0_u64;
        self.buckets
            .iter()
            .copied()
            .chain(std::iter::once(f64::INFINITY))
            .zip(entry.bucket_counts.iter())
            .map(|(bound, bucket_count)| {
                cumulative = cumulative.saturating_add(*bucket_count);
                (bound, cumulative)
            })
            .collect()
    }

    // Series hold plain counters, so a panic mid-update cannot leave them
    // in a state worth refusing to read.
    fn lock_series(&self) -> MutexGuard<'_, BTreeMap<SeriesKey, RequestSeries>> {
        self.series.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for TrafficRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for TrafficRecorder {
    fn describe(&self) -> Vec<MetricDescriptor> {
        vec![
            self.requests_total.clone(),
            self.request_duration_seconds.clone(),
        ]
    }

    fn collect(&self) -> Vec<CollectedMetric> {
        let mut requests = CollectedMetric::new(&self.requests_total);
        let mut durations = CollectedMetric::new(&self.request_duration_seconds);

        let series = self.lock_series();
        for ((path, method), entry) in series.iter() {
            let labels = [path.as_str(), method.as_str()];
            requests.push(&labels, MetricValue::Counter(entry.requests as f64));
            durations.push(
                &labels,
                MetricValue::Histogram {
                    buckets: self.cumulative_buckets(entry),
                    count: entry.count,
                    sum: entry.sum,
                },
            );
        }

        vec![requests, durations]
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread, time::Duration};

    use crate::metrics::{registry::Collector, types::MetricValue};

    use super::TrafficRecorder;

    #[test]
    fn repeated_records_accumulate() {
        let recorder = TrafficRecorder::new();
        for _ in 0..3 {
            recorder.record("/api/users", "GET", Duration::from_secs_f64(0.15));
        }

        let snapshot = recorder.snapshot("/api/users", "GET").unwrap();
        assert_eq!(snapshot.requests, 3);
        assert_eq!(snapshot.count, 3);
        assert!((snapshot.sum - 0.45).abs() < 1e-9);
        assert_eq!(snapshot.buckets.last(), Some(&(f64::INFINITY, 3)));
    }

    #[test]
    fn buckets_are_cumulative() {
        let recorder = TrafficRecorder::with_buckets(&[1.0, 0.1]);
        recorder.record("/p", "GET", Duration::from_millis(50));
        recorder.record("/p", "GET", Duration::from_millis(500));
        recorder.record("/p", "GET", Duration::from_secs(3));

        let snapshot = recorder.snapshot("/p", "GET").unwrap();
        assert_eq!(
            snapshot.buckets,
            vec![(0.1, 1), (1.0, 2), (f64::INFINITY, 3)]
        );
    }

    #[test]
    fn series_are_separate_per_label_pair() {
        let recorder = TrafficRecorder::new();
        recorder.record("/a", "GET", Duration::from_millis(10));
        recorder.record("/a", "POST", Duration::from_millis(10));
        recorder.record("/a", "POST", Duration::from_millis(10));

        assert_eq!(recorder.snapshot("/a", "GET").unwrap().requests, 1);
        assert_eq!(recorder.snapshot("/a", "POST").unwrap().requests, 2);
        assert!(recorder.snapshot("/b", "GET").is_none());
        assert_eq!(recorder.total_requests(), 3);
    }

    #[test]
    fn new_recorder_collects_empty_families() {
        let collected = TrafficRecorder::new().collect();
        assert_eq!(collected.len(), 2);
        assert!(collected.iter().all(|family| family.samples.is_empty()));
    }

    #[test]
    fn collect_reports_counter_and_histogram_per_series() {
        let recorder = TrafficRecorder::new();
        recorder.record("/api/orders", "POST", Duration::from_millis(120));

        let collected = recorder.collect();
        let requests = &collected[0];
        assert_eq!(requests.descriptor.name, "http_requests_total");
        assert_eq!(
            requests.samples[0].labels,
            vec![
                ("path".to_string(), "/api/orders".to_string()),
                ("method".to_string(), "POST".to_string()),
            ]
        );
        assert_eq!(requests.samples[0].value, MetricValue::Counter(1.0));

        match &collected[1].samples[0].value {
            MetricValue::Histogram { buckets, count, .. } => {
                assert_eq!(*count, 1);
                assert_eq!(buckets.len(), 12);
                assert_eq!(buckets[3], (0.05, 0));
                assert_eq!(buckets[5], (0.25, 1));
            }
            other => panic!("unexpected value: {other:?}"),
        }
    }

    #[test]
    fn concurrent_records_are_not_lost() {
        let recorder = Arc::new(TrafficRecorder::new());
        let handles = (0..8)
            .map(|_| {
                let recorder = Arc::clone(&recorder);
                thread::spawn(move || {
                    for _ in 0..250 {
                        recorder.record("/health", "GET", Duration::from_millis(1));
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = recorder.snapshot("/health", "GET").unwrap();
        assert_eq!(snapshot.requests, 2_000);
        assert_eq!(snapshot.count, 2_000);
        assert_eq!(snapshot.buckets.last(), Some(&(f64::INFINITY, 2_000)));
    }
}

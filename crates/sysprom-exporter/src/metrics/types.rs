#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
}

impl MetricType {
    pub fn as_prometheus_type(&self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Gauge => "gauge",
            Self::Histogram => "histogram",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricDescriptor {
    pub name: String,
    pub help: String,
    pub metric_type: MetricType,
    pub variable_labels: Vec<String>,
}

impl MetricDescriptor {
    pub fn new(name: &str, help: &str, metric_type: MetricType, variable_labels: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            help: help.to_string(),
            metric_type,
            variable_labels: variable_labels.iter().map(|label| (*label).to_string()).collect(),
        }
    }

    /// Pairs the variable label names with `values`, in declaration order.
    pub fn labels(&self, values: &[&str]) -> Vec<(String, String)> {
        self.variable_labels
            .iter()
            .zip(values.iter())
            .map(|(name, value)| (name.clone(), (*value).to_string()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Counter(f64),
    Gauge(f64),
    /// Bucket counts are cumulative; the last bucket is `+Inf` and equals `count`.
    Histogram {
        buckets: Vec<(f64, u64)>,
        count: u64,
        sum: f64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub labels: Vec<(String, String)>,
    pub value: MetricValue,
}

#[derive(Debug, Clone)]
pub struct CollectedMetric {
    pub descriptor: MetricDescriptor,
    pub samples: Vec<MetricSample>,
}

impl CollectedMetric {
    pub fn new(descriptor: &MetricDescriptor) -> Self {
        Self {
            descriptor: descriptor.clone(),
            samples: Vec::new(),
        }
    }

    pub fn single(descriptor: &MetricDescriptor, value: MetricValue) -> Self {
        Self {
            descriptor: descriptor.clone(),
            samples: vec![MetricSample {
                labels: Vec::new(),
                value,
            }],
        }
    }

    pub fn push(&mut self, label_values: &[&str], value: MetricValue) {
        self.samples.push(MetricSample {
            labels: self.descriptor.labels(label_values),
            value,
        });
    }
}

use std::{
    collections::HashSet,
    fmt::Write,
    sync::{Arc, RwLock},
};

use sysprom_common::error::{Result, SyspromError};

use crate::metrics::types::{CollectedMetric, MetricDescriptor, MetricValue};

pub const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// A source of metric families, asked for fresh values on every scrape.
pub trait Collector: Send + Sync {
    /// The fixed set of families this collector may emit.
    fn describe(&self) -> Vec<MetricDescriptor>;
    fn collect(&self) -> Vec<CollectedMetric>;
}

struct Registered {
    collector: Arc<dyn Collector>,
    names: HashSet<String>,
}

pub struct MetricsRegistry {
    collectors: RwLock<Vec<Registered>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            collectors: RwLock::new(Vec::new()),
        }
    }

    pub fn register(&self, collector: Arc<dyn Collector>) -> Result<()> {
        let names: HashSet<String> = collector
            .describe()
            .into_iter()
            .map(|descriptor| descriptor.name)
            .collect();

        let mut collectors = self.collectors.write().map_err(|_| {
            SyspromError::InternalError("failed to acquire metrics registry lock".to_string())
        })?;

        if let Some(name) = collectors
            .iter()
            .flat_map(|registered| registered.names.iter())
            .find(|name| names.contains(*name))
        {
            return Err(SyspromError::InvalidArgument(format!(
                "metric already registered: {name}"
            )));
        }

        collectors.push(Registered { collector, names });
        Ok(())
    }

    /// Runs every collector and returns the non-empty families sorted by name.
    pub fn gather(&self) -> Vec<CollectedMetric> {
        let collectors = match self.collectors.read() {
            Ok(guard) => guard,
            Err(_) => return Vec::new(),
        };

        let mut gathered = collectors
            .iter()
            .flat_map(|registered| {
                registered
                    .collector
                    .collect()
                    .into_iter()
                    .filter(move |family| registered.names.contains(&family.descriptor.name))
            })
            .filter(|family| !family.samples.is_empty())
            .collect::<Vec<_>>();

        gathered.sort_by(|left, right| left.descriptor.name.cmp(&right.descriptor.name));
        gathered
    }

    pub fn render_prometheus(&self) -> String {
        render_text(&self.gather())
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub fn render_text(families: &[CollectedMetric]) -> String {
    let mut output = String::new();

    for family in families {
        let name = &family.descriptor.name;
        let _ = writeln!(output, "# HELP {name} {}", escape_help(&family.descriptor.help));
        let _ = writeln!(
            output,
            "# TYPE {name} {}",
            family.descriptor.metric_type.as_prometheus_type()
        );

        for sample in &family.samples {
            match &sample.value {
                MetricValue::Counter(value) | MetricValue::Gauge(value) => {
                    render_sample_line(&mut output, name, &sample.labels, *value);
                }
                MetricValue::Histogram {
                    buckets,
                    count,
                    sum,
                } => {
                    let bucket_name = format!("{name}_bucket");
                    for (bound, cumulative) in buckets {
                        let mut labels = sample.labels.clone();
                        labels.push(("le".to_string(), format_bucket_bound(*bound)));
                        render_sample_line(&mut output, &bucket_name, &labels, *cumulative as f64);
                    }

                    render_sample_line(&mut output, &format!("{name}_sum"), &sample.labels, *sum);
                    render_sample_line(
                        &mut output,
                        &format!("{name}_count"),
                        &sample.labels,
                        *count as f64,
                    );
                }
            }
        }
    }

    output
}

fn render_sample_line(output: &mut String, name: &str, labels: &[(String, String)], value: f64) {
    output.push_str(name);

    if !labels.is_empty() {
        output.push('{');
        for (index, (key, value)) in labels.iter().enumerate() {
            if index > 0 {
                output.push(',');
            }
            let _ = write!(output, "{key}=\"{}\"", escape_label_value(value));
        }
        output.push('}');
    }

    output.push(' ');
    output.push_str(&format_metric_value(value));
    output.push('\n');
}

fn format_metric_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        let sign = if value > 0.0 { '+' } else { '-' };
        format!("{sign}Inf")
    } else if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

fn format_bucket_bound(value: f64) -> String {
    if value.is_infinite() {
        "+Inf".to_string()
    } else {
        value.to_string()
    }
}

fn escape_help(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\n', "\\n")
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::metrics::types::{CollectedMetric, MetricDescriptor, MetricType, MetricValue};

    use super::{Collector, MetricsRegistry, render_text};

    struct Fixed {
        descriptor: MetricDescriptor,
        samples: Vec<(&'static str, f64)>,
    }

    impl Fixed {
        fn gauge(name: &str, samples: Vec<(&'static str, f64)>) -> Arc<Self> {
            Arc::new(Self {
                descriptor: MetricDescriptor::new(name, "test gauge", MetricType::Gauge, &["k"]),
                samples,
            })
        }
    }

    impl Collector for Fixed {
        fn describe(&self) -> Vec<MetricDescriptor> {
            vec![self.descriptor.clone()]
        }

        fn collect(&self) -> Vec<CollectedMetric> {
            let mut family = CollectedMetric::new(&self.descriptor);
            for (label, value) in &self.samples {
                family.push(&[*label], MetricValue::Gauge(*value));
            }
            vec![family]
        }
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let registry = MetricsRegistry::new();
        registry.register(Fixed::gauge("dup", vec![])).unwrap();
        let err = registry.register(Fixed::gauge("dup", vec![])).unwrap_err();
        assert!(err.to_string().contains("metric already registered: dup"));
    }

    #[test]
    fn empty_families_are_omitted_and_order_is_by_name() {
        let registry = MetricsRegistry::new();
        registry.register(Fixed::gauge("zeta", vec![("a", 1.0)])).unwrap();
        registry.register(Fixed::gauge("empty", vec![])).unwrap();
        registry.register(Fixed::gauge("alpha", vec![("b", 2.5)])).unwrap();

        let names: Vec<String> = registry
            .gather()
            .into_iter()
            .map(|family| family.descriptor.name)
            .collect();
        assert_eq!(names, vec!["alpha".to_string(), "zeta".to_string()]);

        let text = registry.render_prometheus();
        assert!(!text.contains("empty"));
        assert!(text.contains("# HELP alpha test gauge\n# TYPE alpha gauge\nalpha{k=\"b\"} 2.5\n"));
        assert!(text.contains("zeta{k=\"a\"} 1\n"));
    }

    #[test]
    fn empty_registry_renders_empty_body() {
        assert_eq!(MetricsRegistry::new().render_prometheus(), "");
    }

    #[test]
    fn label_values_are_escaped() {
        let text = render_text(&Fixed::gauge("g", vec![("a\"b\\c\nd", 1.0)]).collect());
        assert!(text.contains("g{k=\"a\\\"b\\\\c\\nd\"} 1\n"));
    }

    #[test]
    fn histograms_render_bucket_sum_and_count_lines() {
        let descriptor = MetricDescriptor::new("h", "hist", MetricType::Histogram, &["path"]);
        let mut family = CollectedMetric::new(&descriptor);
        family.push(
            &["/x"],
            MetricValue::Histogram {
                buckets: vec![(0.1, 1), (1.0, 2), (f64::INFINITY, 3)],
                count: 3,
                sum: 2.25,
            },
        );

        let text = render_text(&[family]);
        assert!(text.contains("# TYPE h histogram\n"));
        assert!(text.contains("h_bucket{path=\"/x\",le=\"0.1\"} 1\n"));
        assert!(text.contains("h_bucket{path=\"/x\",le=\"1\"} 2\n"));
        assert!(text.contains("h_bucket{path=\"/x\",le=\"+Inf\"} 3\n"));
        assert!(text.contains("h_sum{path=\"/x\"} 2.25\n"));
        assert!(text.contains("h_count{path=\"/x\"} 3\n"));
    }
}

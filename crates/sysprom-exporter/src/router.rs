use std::{sync::Arc, time::Duration};

use axum::{Router, middleware, routing::get};
use sysprom_common::error::Result;

use crate::{
    config::ExporterConfig,
    handlers,
    metrics::{
        Collector, HostProbe, MetricsRegistry, ProcessCollector, SysinfoProbe, SystemCollector,
        TrafficRecorder,
    },
};

pub struct ExporterState {
    pub config: ExporterConfig,
    pub registry: Arc<MetricsRegistry>,
    pub recorder: Arc<TrafficRecorder>,
}

impl ExporterState {
    pub fn new(config: ExporterConfig) -> Result<Self> {
        Self::with_probe(config, Arc::new(SysinfoProbe::new()))
    }

    /// Builds the registry around an explicit host probe.
    pub fn with_probe(config: ExporterConfig, probe: Arc<dyn HostProbe>) -> Result<Self> {
        let registry = Arc::new(MetricsRegistry::new());
        let recorder = Arc::new(TrafficRecorder::new());

        registry.register(Arc::new(SystemCollector::new(
            probe,
            config.disk_path.clone(),
            config.cpu_window,
        )))?;
        registry.register(Arc::new(ProcessCollector::new()))?;
        let traffic: Arc<dyn Collector> = recorder.clone();
        registry.register(traffic)?;

        Ok(Self {
            config,
            registry,
            recorder,
        })
    }

    pub fn generator_interval(&self) -> Option<Duration> {
        self.config
            .generator_enabled
            .then_some(self.config.generator_interval)
    }
}

pub fn exporter_router(state: Arc<ExporterState>) -> Router {
    let router = Router::new()
        .route("/", get(handlers::health::index))
        .route("/health", get(handlers::health::health))
        .route(
            handlers::metrics::METRICS_PATH,
            get(handlers::metrics::prometheus_metrics),
        );

    let router = if state.config.track_requests {
        router.route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            handlers::metrics::track_requests,
        ))
    } else {
        router
    };

    router.with_state(state)
}

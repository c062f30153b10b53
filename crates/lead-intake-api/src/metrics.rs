//! Prometheus metrics for webhook traffic.
//!
//! Each [`ServiceMetrics`] owns its own registry so that several routers can
//! live in one process (tests build one per case).

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

/// Service metrics for observability
#[derive(Debug)]
pub struct ServiceMetrics {
    registry: Registry,

    pub webhook_requests_total: IntCounter,
    pub leads_created_total: IntCounter,
    pub webhook_rejections_total: IntCounterVec,
    pub webhook_duration_seconds: Histogram,
}

impl ServiceMetrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let webhook_requests_total = IntCounter::new(
            "lead_intake_webhook_requests_total",
            "Total webhook requests received",
        )?;
        let leads_created_total = IntCounter::new(
            "lead_intake_leads_created_total",
            "Leads created from webhook deliveries",
        )?;
        let webhook_rejections_total = IntCounterVec::new(
            Opts::new(
                "lead_intake_webhook_rejections_total",
                "Webhook requests that did not create a lead",
            ),
            &["reason"],
        )?;
        let webhook_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "lead_intake_webhook_duration_seconds",
                "Webhook processing time distribution",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;

        registry.register(Box::new(webhook_requests_total.clone()))?;
        registry.register(Box::new(leads_created_total.clone()))?;
        registry.register(Box::new(webhook_rejections_total.clone()))?;
        registry.register(Box::new(webhook_duration_seconds.clone()))?;

        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(Arc::new(Self {
            registry,
            webhook_requests_total,
            leads_created_total,
            webhook_rejections_total,
            webhook_duration_seconds,
        }))
    }

    pub fn record_lead_created(&self, duration: Duration) {
        self.webhook_requests_total.inc();
        self.leads_created_total.inc();
        self.webhook_duration_seconds
            .observe(duration.as_secs_f64());
    }

    pub fn record_rejection(&self, reason: &str, duration: Duration) {
        self.count_rejection(reason);
        self.webhook_duration_seconds
            .observe(duration.as_secs_f64());
    }

    /// Count a rejection that never reached the ingestion pipeline
    ///
    /// Nothing was timed, so the duration histogram is left alone.
    pub fn count_rejection(&self, reason: &str) {
        self.webhook_requests_total.inc();
        self.webhook_rejections_total
            .with_label_values(&[reason])
            .inc();
    }

    /// Render all metrics in the Prometheus text exposition format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;

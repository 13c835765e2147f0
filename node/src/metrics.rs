//! # Prometheus Metrics
//!
//! Sale activity as seen by the node: purchases, rejections by error code,
//! and the running totals of the coordinator. Scraped at `/metrics` on the
//! metrics port.
//!
//! All metrics live in a dedicated [`prometheus::Registry`] so they do not
//! collide with any default global registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, Gauge, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

use crowdsale_contracts::SaleSnapshot;

/// Metric handles for the node.
#[derive(Clone)]
pub struct SaleMetrics {
    registry: Registry,
    /// Successful purchases.
    pub purchases_total: IntCounter,
    /// Rejected calls, labelled by operation and error code.
    pub rejections_total: IntCounterVec,
    /// Units sold so far, fractional.
    pub units_sold: Gauge,
    /// Units still held by the sale.
    pub units_available: Gauge,
    /// Native coins held by the sale.
    pub native_balance: Gauge,
    /// Size of the allow-list.
    pub allowlist_size: IntGauge,
}

impl SaleMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("crowdsale".into()), None)?;

        let purchases_total =
            IntCounter::new("purchases_total", "Total number of successful purchases")?;
        registry.register(Box::new(purchases_total.clone()))?;

        let rejections_total = IntCounterVec::new(
            Opts::new("rejections_total", "Rejected calls by operation and error code"),
            &["operation", "code"],
        )?;
        registry.register(Box::new(rejections_total.clone()))?;

        let units_sold = Gauge::new("units_sold", "Units sold so far")?;
        registry.register(Box::new(units_sold.clone()))?;

        let units_available =
            Gauge::new("units_available", "Units still held by the sale")?;
        registry.register(Box::new(units_available.clone()))?;

        let native_balance =
            Gauge::new("native_balance", "Native coins held by the sale")?;
        registry.register(Box::new(native_balance.clone()))?;

        let allowlist_size = IntGauge::new("allowlist_size", "Number of approved addresses")?;
        registry.register(Box::new(allowlist_size.clone()))?;

        Ok(Self {
            registry,
            purchases_total,
            rejections_total,
            units_sold,
            units_available,
            native_balance,
            allowlist_size,
        })
    }

    /// Counts a rejected call.
    pub fn record_rejection(&self, operation: &str, code: &str) {
        self.rejections_total
            .with_label_values(&[operation, code])
            .inc();
    }

    /// Refreshes the gauges from a coordinator snapshot.
    pub fn observe(&self, snapshot: &SaleSnapshot, allowlist_size: usize) {
        self.units_sold.set(as_units(&snapshot.units_sold));
        self.units_available.set(as_units(&snapshot.unit_balance));
        self.native_balance.set(as_units(&snapshot.native_balance));
        self.allowlist_size
            .set(i64::try_from(allowlist_size).unwrap_or(i64::MAX));
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Whole-unit value as `f64`. Precision loss beyond ~15 significant digits
/// is acceptable for a gauge.
fn as_units(amount: &crowdsale_contracts::Amount) -> f64 {
    amount.format_units().parse().unwrap_or(f64::MAX)
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<SaleMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

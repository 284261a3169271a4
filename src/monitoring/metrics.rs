use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use metrics::{Unit, describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use once_cell::sync::OnceCell;

static EXPORTER: OnceCell<()> = OnceCell::new();
static PROMETHEUS_ENABLED: AtomicBool = AtomicBool::new(false);

pub const VENUE_QUOTE_TOTAL: &str = "swap_router_venue_quote_total";
pub const VENUE_QUOTE_LATENCY_MS: &str = "swap_router_venue_quote_latency_ms";
pub const BEST_ROUTE_TOTAL: &str = "swap_router_best_route_total";
pub const FEES_ATTACHED_TOTAL: &str = "swap_router_fees_attached_total";
pub const FEE_AMOUNT: &str = "swap_router_fee_amount";
pub const PLAN_ASSEMBLED_TOTAL: &str = "swap_router_plan_assembled_total";
pub const PLAN_COMMANDS: &str = "swap_router_plan_commands";

/// venue 询价通常在百毫秒级，长尾由超时截断。
const QUOTE_LATENCY_BUCKETS_MS: &[f64] = &[
    25.0, 50.0, 100.0, 250.0, 500.0, 1_000.0, 2_500.0, 5_000.0, 10_000.0,
];
/// 收费命令两两成对，再加 merge 与 venue 自身的命令。
const PLAN_COMMAND_BUCKETS: &[f64] = &[2.0, 4.0, 6.0, 8.0, 12.0, 16.0, 24.0, 32.0];

/// 安装 Prometheus exporter；重复调用只生效一次。
pub fn try_init_prometheus(listen: &str) -> Result<()> {
    EXPORTER
        .get_or_try_init(|| {
            let addr: SocketAddr = listen
                .parse()
                .with_context(|| format!("invalid prometheus listen address: {listen}"))?;
            PrometheusBuilder::new()
                .with_http_listener(addr)
                .set_buckets_for_metric(
                    Matcher::Full(VENUE_QUOTE_LATENCY_MS.to_string()),
                    QUOTE_LATENCY_BUCKETS_MS,
                )
                .context("invalid venue quote latency buckets")?
                .set_buckets_for_metric(
                    Matcher::Full(PLAN_COMMANDS.to_string()),
                    PLAN_COMMAND_BUCKETS,
                )
                .context("invalid plan command buckets")?
                .install()
                .context("failed to install prometheus exporter")?;
            describe();
            PROMETHEUS_ENABLED.store(true, Ordering::Relaxed);
            Ok(())
        })
        .map(|_| ())
}

pub fn prometheus_enabled() -> bool {
    PROMETHEUS_ENABLED.load(Ordering::Relaxed)
}

fn describe() {
    describe_counter!(VENUE_QUOTE_TOTAL, "venue quotes by result");
    describe_histogram!(
        VENUE_QUOTE_LATENCY_MS,
        Unit::Milliseconds,
        "venue quote latency"
    );
    describe_counter!(BEST_ROUTE_TOTAL, "best route selections by venue");
    describe_counter!(FEES_ATTACHED_TOTAL, "fee transfers attached to plans");
    describe_histogram!(FEE_AMOUNT, "aggregate fee per plan in minor units");
    describe_counter!(PLAN_ASSEMBLED_TOTAL, "assembled swap plans");
    describe_histogram!(PLAN_COMMANDS, Unit::Count, "commands per assembled plan");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_buckets_are_strictly_ascending() {
        for buckets in [QUOTE_LATENCY_BUCKETS_MS, PLAN_COMMAND_BUCKETS] {
            assert!(!buckets.is_empty());
            assert!(buckets.windows(2).all(|pair| pair[0] < pair[1]));
        }
    }

    #[test]
    fn bad_listen_address_leaves_exporter_disabled() {
        assert!(try_init_prometheus("not-an-address").is_err());
        assert!(!prometheus_enabled());
    }
}

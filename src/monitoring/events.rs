use std::time::Duration;

use metrics::{counter, histogram};
use tracing::{info, warn};

use super::metrics::{
    BEST_ROUTE_TOTAL, FEE_AMOUNT, FEES_ATTACHED_TOTAL, PLAN_ASSEMBLED_TOTAL, PLAN_COMMANDS,
    VENUE_QUOTE_LATENCY_MS, VENUE_QUOTE_TOTAL, prometheus_enabled,
};
use crate::engine::VenueQuoteFailure;
use crate::fee::FeeEntries;
use crate::venue::FeePlacement;

pub fn venue_quote(
    venue: &str,
    output_amount: u64,
    failure: Option<&VenueQuoteFailure>,
    elapsed: Duration,
) {
    let latency_ms = elapsed.as_secs_f64() * 1_000.0;

    match failure {
        None => info!(
            target: "monitoring::quote",
            event = "end",
            status = "success",
            venue,
            output_amount,
            latency_ms,
            "venue quote completed"
        ),
        Some(failure) => warn!(
            target: "monitoring::quote",
            event = "end",
            status = failure.label(),
            venue,
            reason = %failure,
            latency_ms,
            "venue quote returned no route"
        ),
    }

    if prometheus_enabled() {
        let result = failure.map_or("success", VenueQuoteFailure::label);
        counter!(
            VENUE_QUOTE_TOTAL,
            "venue" => venue.to_string(),
            "result" => result
        )
        .increment(1);
        histogram!(
            VENUE_QUOTE_LATENCY_MS,
            "venue" => venue.to_string(),
            "result" => result
        )
        .record(latency_ms);
    }
}

pub fn best_route_selected(venue: &str, output_amount: u64, pools: &[String], queried: usize) {
    info!(
        target: "monitoring::route",
        event = "selected",
        venue,
        output_amount,
        hops = pools.len(),
        pools = ?pools,
        queried,
        "best route selected"
    );

    if prometheus_enabled() {
        counter!(BEST_ROUTE_TOTAL, "venue" => venue.to_string()).increment(1);
    }
}

pub fn fees_attached(token_from: &str, fees: &FeeEntries, placement: FeePlacement) {
    let total = fees.total();
    let placement = placement_label(placement);
    info!(
        target: "monitoring::fee",
        event = "attached",
        token_from,
        collectors = fees.len(),
        total = %total,
        placement,
        "fees attached"
    );

    if prometheus_enabled() {
        counter!(FEES_ATTACHED_TOTAL, "placement" => placement).increment(1);
        histogram!(FEE_AMOUNT, "token_from" => token_from.to_string()).record(total as f64);
    }
}

pub fn plan_assembled(
    venue: &str,
    command_count: usize,
    placement: Option<FeePlacement>,
    elapsed: Duration,
) {
    let placement = placement.map_or("none", placement_label);
    info!(
        target: "monitoring::plan",
        event = "assembled",
        venue,
        command_count,
        placement,
        latency_ms = elapsed.as_secs_f64() * 1_000.0,
        "transaction plan assembled"
    );

    if prometheus_enabled() {
        counter!(
            PLAN_ASSEMBLED_TOTAL,
            "venue" => venue.to_string(),
            "placement" => placement
        )
        .increment(1);
        histogram!(PLAN_COMMANDS, "venue" => venue.to_string()).record(command_count as f64);
    }
}

fn placement_label(placement: FeePlacement) -> &'static str {
    match placement {
        FeePlacement::BeforeSwap => "before_swap",
        FeePlacement::AfterSwap => "after_swap",
    }
}

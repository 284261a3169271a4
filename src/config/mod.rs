use std::time::Duration;

pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;

use crate::engine::SWAP_GAS_BUDGET;

pub(crate) fn default_logging_level() -> String {
    "info".to_string()
}

pub(crate) fn default_prometheus_listen() -> String {
    "0.0.0.0:9898".to_string()
}

pub(crate) fn default_swap_gas_budget() -> u64 {
    SWAP_GAS_BUDGET
}

pub(crate) fn default_pools_ttl() -> Duration {
    Duration::from_secs(30 * 60)
}

use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_with::{DurationMilliSeconds, serde_as};

use crate::engine::RouterSettings;
use crate::fee::{FeeCollectorShare, FeeError, FeePolicy};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouterConfig {
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub router: RouterSection,
    #[serde(default)]
    pub fee: FeeConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl RouterConfig {
    pub fn router_settings(&self) -> RouterSettings {
        RouterSettings {
            swap_gas_budget: self.router.swap_gas_budget,
            venue_timeout: self.router.venue_timeout,
            supported_providers: self.router.supported_providers.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "super::default_logging_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    #[serde(default)]
    pub timezone_offset_hours: i8,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: super::default_logging_level(),
            json: false,
            timezone_offset_hours: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrometheusConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default = "super::default_prometheus_listen")]
    pub listen: String,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            enable: false,
            listen: super::default_prometheus_listen(),
        }
    }
}

/// `[router]`：gas 上限、单个 venue 询价超时、venue 白名单。
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct RouterSection {
    #[serde(default = "super::default_swap_gas_budget")]
    pub swap_gas_budget: u64,
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    #[serde(default, rename = "venue_timeout_ms")]
    pub venue_timeout: Option<Duration>,
    #[serde(default)]
    pub supported_providers: Vec<String>,
}

impl Default for RouterSection {
    fn default() -> Self {
        Self {
            swap_gas_budget: super::default_swap_gas_budget(),
            venue_timeout: None,
            supported_providers: Vec::new(),
        }
    }
}

/// `[fee]`：总手续费比例与 `[[fee.collectors]]` 分成。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeeConfig {
    #[serde(default)]
    pub general_fee_percentage: Option<Decimal>,
    #[serde(default)]
    pub collectors: Vec<FeeCollectorShare>,
}

impl FeeConfig {
    /// 未配置比例、比例为 0 或没有收费方时不收费。
    pub fn policy(&self) -> Option<FeePolicy> {
        let percentage = self.general_fee_percentage?;
        if percentage.is_zero() || self.collectors.is_empty() {
            return None;
        }
        Some(FeePolicy {
            general_fee_percentage: percentage,
            collectors: self.collectors.clone(),
        })
    }

    /// 配置了非零比例却没有收费方、比例越界或分成不合法时报错。
    pub fn validate(&self) -> Result<(), FeeError> {
        match self.general_fee_percentage {
            Some(percentage) if !percentage.is_zero() => FeePolicy {
                general_fee_percentage: percentage,
                collectors: self.collectors.clone(),
            }
            .validate(),
            _ => Ok(()),
        }
    }
}

/// `[storage]`：缓存数据的有效期。
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "super::default_pools_ttl", rename = "pools_ttl_ms")]
    pub pools_ttl: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            pools_ttl: super::default_pools_ttl(),
        }
    }
}

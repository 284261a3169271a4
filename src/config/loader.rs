use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::RouterConfig;
use crate::fee::FeeError;

/// 未显式指定路径时依次查找。
pub const DEFAULT_CONFIG_PATHS: &[&str] = &["swap-router.toml", "config/swap-router.toml"];

/// 优先于默认路径，低于命令行 `--config`。
pub const CONFIG_PATH_ENV: &str = "SWAP_ROUTER_CONFIG";

pub const CONFIG_TEMPLATE: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/swap-router.toml"));

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置 {path} 失败: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("解析配置 {path} 失败: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("配置 {path} 的 [fee] 不合法: {source}")]
    InvalidFee { path: PathBuf, source: FeeError },
}

/// 查找顺序：`path` > `SWAP_ROUTER_CONFIG` > [`DEFAULT_CONFIG_PATHS`]；都不存在时使用默认配置。
///
/// 显式给出的路径不存在时同样回落到默认配置。
pub fn load_config(path: Option<PathBuf>) -> Result<RouterConfig, ConfigError> {
    let explicit = path.or_else(|| env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));
    let candidates = match explicit {
        Some(path) => vec![path],
        None => DEFAULT_CONFIG_PATHS.iter().map(PathBuf::from).collect(),
    };

    for candidate in &candidates {
        if let Some(config) = try_load_file(candidate)? {
            return Ok(config);
        }
    }

    Ok(RouterConfig::default())
}

fn try_load_file(path: &Path) -> Result<Option<RouterConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(path, &contents).map(Some)
}

fn parse_config(path: &Path, contents: &str) -> Result<RouterConfig, ConfigError> {
    let config: RouterConfig = toml::from_str(contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config
        .fee
        .validate()
        .map_err(|source| ConfigError::InvalidFee {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::time::Duration;

    use rust_decimal::Decimal;

    use super::*;
    use crate::engine::SWAP_GAS_BUDGET;

    #[test]
    fn template_parses_into_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("swap-router.toml");
        fs::write(&path, CONFIG_TEMPLATE).expect("write template");

        let config = load_config(Some(path)).expect("load template");
        assert_eq!(config.router.swap_gas_budget, SWAP_GAS_BUDGET);
        assert_eq!(config.router.venue_timeout, None);
        assert_eq!(config.storage.pools_ttl, Duration::from_secs(1_800));

        let policy = config.fee.policy().expect("fee policy");
        assert_eq!(
            policy.general_fee_percentage,
            Decimal::from_str("0.3").unwrap()
        );
        assert_eq!(policy.collectors.len(), 1);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = load_config(Some(dir.path().join("absent.toml"))).expect("defaults");
        assert_eq!(config.global.logging.level, "info");
        assert!(config.fee.policy().is_none());
        assert_eq!(config.router_settings().swap_gas_budget, SWAP_GAS_BUDGET);
    }

    #[test]
    fn router_section_maps_to_settings() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("custom.toml");
        fs::write(
            &path,
            r#"
[router]
swap_gas_budget = 10
venue_timeout_ms = 2500
supported_providers = ["Cetus", "Turbos"]
"#,
        )
        .expect("write config");

        let settings = load_config(Some(path)).expect("load").router_settings();
        assert_eq!(settings.swap_gas_budget, 10);
        assert_eq!(settings.venue_timeout, Some(Duration::from_millis(2_500)));
        assert_eq!(settings.supported_providers, vec!["Cetus", "Turbos"]);
    }

    #[test]
    fn oversubscribed_fee_shares_fail_at_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("fees.toml");
        fs::write(
            &path,
            r#"
[fee]
general_fee_percentage = "0.5"

[[fee.collectors]]
address = "0xa"
share_percentage = "60"

[[fee.collectors]]
address = "0xb"
share_percentage = "50"
"#,
        )
        .expect("write config");

        let err = load_config(Some(path)).expect_err("shares exceed 100");
        assert!(matches!(
            err,
            ConfigError::InvalidFee {
                source: FeeError::InvalidShares(_),
                ..
            }
        ));
    }

    #[test]
    fn fee_percentage_without_collectors_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("fees.toml");
        fs::write(&path, "[fee]\ngeneral_fee_percentage = \"1\"\n").expect("write config");

        let err = load_config(Some(path)).expect_err("no collectors");
        assert!(matches!(
            err,
            ConfigError::InvalidFee {
                source: FeeError::EmptyFees,
                ..
            }
        ));
    }

    #[test]
    fn zero_fee_percentage_needs_no_collectors() {
        let config = parse_config(
            Path::new("inline.toml"),
            "[fee]\ngeneral_fee_percentage = \"0\"\n",
        )
        .expect("zero fee is valid");
        assert!(config.fee.policy().is_none());
    }

    #[test]
    fn invalid_toml_reports_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[router\nswap_gas_budget = ").expect("write config");

        let err = load_config(Some(path.clone())).expect_err("parse error");
        assert!(matches!(err, ConfigError::Parse { path: p, .. } if p == path));
    }
}

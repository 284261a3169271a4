//! 代币类型与 coin object 相关的基础能力。
//!
//! 所有地址/类型比较都先经过 [`normalize_address`] / [`normalize_coin_type`]，
//! 原生资产的长短两种写法视为同一资产。

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const SHORT_NATIVE_COIN_TYPE: &str = "0x2::sui::SUI";
pub const LONG_NATIVE_COIN_TYPE: &str =
    "0x0000000000000000000000000000000000000000000000000000000000000002::sui::SUI";
pub const NATIVE_DECIMALS: u32 = 9;

const ADDRESS_HEX_LEN: usize = 64;

/// 链上单独持有的一个 coin object。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinObject {
    pub coin_object_id: String,
    pub coin_type: String,
    pub balance: u64,
}

impl CoinObject {
    pub fn new(coin_object_id: impl Into<String>, coin_type: impl Into<String>, balance: u64) -> Self {
        Self {
            coin_object_id: coin_object_id.into(),
            coin_type: coin_type.into(),
            balance,
        }
    }

    pub fn normalized_id(&self) -> String {
        normalize_address(&self.coin_object_id)
    }
}

/// 代币元数据，decimals 缺失时无法计算手续费。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinMetadata {
    pub coin_type: String,
    pub decimals: u32,
    #[serde(default)]
    pub symbol: Option<String>,
}

/// 代币元数据来源（通常由外部的 coin 管理器或缓存提供）。
#[async_trait]
pub trait CoinMetadataSource: Send + Sync {
    async fn coin_metadata(&self, coin_type: &str) -> Option<CoinMetadata>;
}

/// 按代币类型聚合后的余额。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinBalance {
    pub coin_type: String,
    pub balance: u128,
    pub object_count: usize,
}

/// 补齐为 `0x` + 64 位小写十六进制。
pub fn normalize_address(address: &str) -> String {
    let trimmed = address.trim();
    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed)
        .to_ascii_lowercase();
    if hex.len() >= ADDRESS_HEX_LEN {
        return format!("0x{hex}");
    }
    format!("0x{hex:0>width$}", width = ADDRESS_HEX_LEN)
}

/// 仅规范化 `address::module::Name` 中的地址部分。
pub fn normalize_coin_type(coin_type: &str) -> String {
    let trimmed = coin_type.trim();
    match trimmed.split_once("::") {
        Some((address, rest)) => format!("{}::{rest}", normalize_address(address)),
        None => trimmed.to_string(),
    }
}

pub fn is_native_coin_type(coin_type: &str) -> bool {
    let trimmed = coin_type.trim();
    trimmed == SHORT_NATIVE_COIN_TYPE
        || trimmed == LONG_NATIVE_COIN_TYPE
        || normalize_coin_type(trimmed) == LONG_NATIVE_COIN_TYPE
}

pub fn coin_types_equal(lhs: &str, rhs: &str) -> bool {
    if is_native_coin_type(lhs) || is_native_coin_type(rhs) {
        return is_native_coin_type(lhs) && is_native_coin_type(rhs);
    }
    normalize_coin_type(lhs) == normalize_coin_type(rhs)
}

/// 输入输出是同一资产时无法构成兑换。
pub fn token_from_is_token_to(token_from: &str, token_to: &str) -> bool {
    coin_types_equal(token_from, token_to)
}

/// 按规范化后的类型聚合余额，忽略零余额对象，保留首次出现的顺序。
pub fn summarize_balances(coins: &[CoinObject]) -> Vec<CoinBalance> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut balances: Vec<CoinBalance> = Vec::new();

    for coin in coins {
        if coin.balance == 0 {
            continue;
        }
        let coin_type = normalize_coin_type(&coin.coin_type);
        match index.get(&coin_type) {
            Some(&slot) => {
                let entry = &mut balances[slot];
                entry.balance += u128::from(coin.balance);
                entry.object_count += 1;
            }
            None => {
                index.insert(coin_type.clone(), balances.len());
                balances.push(CoinBalance {
                    coin_type,
                    balance: u128::from(coin.balance),
                    object_count: 1,
                });
            }
        }
    }

    balances
}

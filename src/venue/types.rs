use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::transaction::Argument;

/// 报价请求，金额为主单位。
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub coin_type_from: String,
    pub coin_type_to: String,
    pub input_amount: Decimal,
    pub public_key: String,
    pub slippage_percentage: Decimal,
}

/// venue 私有的路由描述，只会被原样交还给产生它的 venue。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub payload: Value,
    #[serde(default)]
    pub pools: Vec<String>,
}

impl Route {
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            pools: Vec::new(),
        }
    }

    pub fn with_pools(mut self, pools: Vec<String>) -> Self {
        self.pools = pools;
        self
    }
}

/// venue 报价结果，`output_amount` 为目标代币最小单位。
#[derive(Debug, Clone, PartialEq)]
pub struct RouteData {
    pub route: Route,
    pub output_amount: u64,
}

/// 构建兑换命令所需的参数。
#[derive(Debug, Clone)]
pub struct SwapRequest {
    pub route: Route,
    pub public_key: String,
    pub slippage_percentage: Decimal,
}

/// 手续费扣除后用于兑换的资金来源。
///
/// 有的 venue 需要对象 id 列表，有的需要计划内的引用，两者都给出；
/// 原生代币直接使用 gas coin，没有对象 id。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingRef {
    pub object_id: Option<String>,
    pub argument: Argument,
}

impl FundingRef {
    pub fn gas() -> Self {
        Self {
            object_id: None,
            argument: Argument::GasCoin,
        }
    }

    pub fn object_ids(&self) -> Vec<String> {
        self.object_id.iter().cloned().collect()
    }
}

/// 手续费命令相对兑换命令的位置。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeePlacement {
    /// 先收费、合并资金对象，再让 venue 在同一计划上追加兑换。
    #[default]
    BeforeSwap,
    /// 先由 venue 构建兑换，再在其后追加收费命令。
    AfterSwap,
}

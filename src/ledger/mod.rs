//! 账本客户端契约：查询持有的 coin object、按 id 读取对象、模拟执行计划。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::coin::CoinObject;
use crate::transaction::TransactionPlan;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("账本请求失败: {0}")]
    Request(String),
    #[error("对象不存在: {0}")]
    ObjectNotFound(String),
}

/// 模拟执行的结果摘要。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationOutcome {
    pub success: bool,
    #[serde(default)]
    pub gas_used: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub effects: Value,
}

impl SimulationOutcome {
    pub fn succeeded(gas_used: u64) -> Self {
        Self {
            success: true,
            gas_used: Some(gas_used),
            error: None,
            effects: Value::Null,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            gas_used: None,
            error: Some(reason.into()),
            effects: Value::Null,
        }
    }
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// `owner` 持有的指定类型的全部 coin object。
    async fn owned_coins(
        &self,
        owner: &str,
        coin_type: &str,
    ) -> Result<Vec<CoinObject>, LedgerError>;

    async fn get_object(&self, object_id: &str) -> Result<Value, LedgerError>;

    async fn simulate(
        &self,
        plan: &TransactionPlan,
        sender: &str,
    ) -> Result<SimulationOutcome, LedgerError>;
}

use thiserror::Error;

use crate::engine::assembly::MergeError;
use crate::fee::FeeError;
use crate::ledger::LedgerError;
use crate::transaction::PlanError;
use crate::venue::VenueError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("无法解析必要参数: {0}")]
    Resolution(String),
    #[error("手续费参数异常: {0}")]
    InvalidFeeConfiguration(String),
    #[error("请求参数非法: {0}")]
    InvalidRequest(String),
    #[error("venue 名称重复: {0}")]
    DuplicateVenue(String),
    #[error("手续费计算失败: {0}")]
    Fee(#[from] FeeError),
    #[error("venue 调用失败: {0}")]
    Venue(#[from] VenueError),
    #[error("账本请求失败: {0}")]
    Ledger(#[from] LedgerError),
    #[error("交易计划非法: {0}")]
    Plan(#[from] PlanError),
    #[error("coin 合并失败: {0}")]
    Merge(#[from] MergeError),
}

pub type EngineResult<T> = Result<T, EngineError>;

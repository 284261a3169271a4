use std::collections::{HashMap, HashSet};
use std::fmt::Debug;

use async_trait::async_trait;

use super::error::VenueError;
use super::paths::PoolData;
use super::types::{FeePlacement, FundingRef, RouteData, RouteRequest, SwapRequest};
use crate::transaction::TransactionPlan;

/// 流动性 venue 需要实现的通用接口。
///
/// 实例由调用方显式构造并注入路由层，不依赖任何全局状态。
#[async_trait]
pub trait VenueAdapter: Send + Sync + Debug {
    fn provider_name(&self) -> &str;

    /// 是否支持多跳智能路由；不支持时必须存在两种代币的直接池子。
    fn is_smart_routing_available(&self) -> bool;

    /// venue 已知的代币类型集合。
    fn coins(&self) -> HashSet<String>;

    /// 池子图，键为 venue 自定义的交易对标识。
    fn paths(&self) -> HashMap<String, PoolData>;

    fn fee_placement(&self) -> FeePlacement {
        FeePlacement::BeforeSwap
    }

    /// 报价；没有可用路由时返回 `Ok(None)`。
    async fn route_data(&self, request: &RouteRequest) -> Result<Option<RouteData>, VenueError>;

    /// 在全新的计划上构建兑换命令。
    async fn swap_transaction(&self, request: &SwapRequest) -> Result<TransactionPlan, VenueError>;

    /// 在已有计划上追加兑换命令，并以 `funding` 作为唯一资金来源。
    async fn doctored_swap_transaction(
        &self,
        request: &SwapRequest,
        plan: TransactionPlan,
        funding: &FundingRef,
    ) -> Result<TransactionPlan, VenueError>;
}

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::aggregator::{RouteAggregator, RouteMaps};
use super::assembly::{transaction_with_fees_after_swap, transaction_with_fees_before_swap};
use super::error::{EngineError, EngineResult};
use crate::coin::{
    CoinMetadataSource, LONG_NATIVE_COIN_TYPE, NATIVE_DECIMALS, SHORT_NATIVE_COIN_TYPE,
    coin_types_equal, is_native_coin_type, token_from_is_token_to,
};
use crate::fee::{FeePolicy, SwapFee, amount_including_fees};
use crate::ledger::{LedgerClient, SimulationOutcome};
use crate::monitoring::events;
use crate::transaction::TransactionPlan;
use crate::venue::{FeePlacement, RouteData, RouteRequest, SwapRequest, VenueAdapter, has_path};

/// 部分 venue 不会正确估算 gas，统一使用固定上限。
pub const SWAP_GAS_BUDGET: u64 = 50_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterSettings {
    pub swap_gas_budget: u64,
    pub venue_timeout: Option<Duration>,
    /// 非空时只保留名字出现在列表中的 venue。
    pub supported_providers: Vec<String>,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            swap_gas_budget: SWAP_GAS_BUDGET,
            venue_timeout: None,
            supported_providers: Vec::new(),
        }
    }
}

/// 一次兑换请求，金额为源代币主单位。
#[derive(Debug, Clone)]
pub struct SwapParams {
    pub token_from: String,
    pub token_to: String,
    pub amount: Decimal,
    pub signer_address: String,
    pub slippage_percentage: Decimal,
    pub fee: Option<FeePolicy>,
}

#[derive(Debug, Clone)]
pub struct RouteWinner {
    pub venue: Arc<dyn VenueAdapter>,
    pub route: RouteData,
}

#[derive(Debug, Clone)]
pub struct RouteSelection {
    pub routes: RouteMaps,
    pub winner: Option<RouteWinner>,
}

#[derive(Debug, Clone)]
pub struct PreparedSwap {
    pub venue: String,
    pub output_amount: u64,
    pub plan: TransactionPlan,
    pub fee: Option<SwapFee>,
    pub fee_placement: Option<FeePlacement>,
    pub routes: RouteMaps,
}

/// 没有路由是正常的业务结果，不作为错误返回。
#[derive(Debug, Clone)]
pub enum RouteOutcome {
    NoRoute { queried: usize },
    Ready(Box<PreparedSwap>),
}

/// 负责筛选 venue、询价、收费与交易计划的拼装。
///
/// 所有依赖都由调用方注入，实例之间不共享任何状态。
pub struct RouteManager {
    venues: Vec<Arc<dyn VenueAdapter>>,
    coins: Arc<dyn CoinMetadataSource>,
    ledger: Arc<dyn LedgerClient>,
    aggregator: RouteAggregator,
    settings: RouterSettings,
}

impl RouteManager {
    /// venue 以 `provider_name` 区分，名称重复时拒绝构造。
    pub fn new(
        venues: Vec<Arc<dyn VenueAdapter>>,
        coins: Arc<dyn CoinMetadataSource>,
        ledger: Arc<dyn LedgerClient>,
        settings: RouterSettings,
    ) -> EngineResult<Self> {
        ensure_unique_names(&venues)?;

        let aggregator = RouteAggregator::new().with_venue_timeout(settings.venue_timeout);
        Ok(Self {
            venues,
            coins,
            ledger,
            aggregator,
            settings,
        })
    }

    pub fn settings(&self) -> &RouterSettings {
        &self.settings
    }

    pub fn venues(&self) -> &[Arc<dyn VenueAdapter>] {
        &self.venues
    }

    /// 只保留同时支持两种代币、且（不支持智能路由时）存在直接池子的 venue。
    pub fn filter_venues(&self, token_from: &str, token_to: &str) -> Vec<Arc<dyn VenueAdapter>> {
        self.venues
            .iter()
            .filter(|venue| self.is_eligible(venue.as_ref(), token_from, token_to))
            .cloned()
            .collect()
    }

    /// 向候选 venue 并发询价并挑选产出最大的路由。
    pub async fn best_route(&self, request: &RouteRequest) -> EngineResult<RouteSelection> {
        ensure_pair(&request.coin_type_from, &request.coin_type_to)?;
        ensure_positive(request.input_amount)?;

        let venues = self.filter_venues(&request.coin_type_from, &request.coin_type_to);
        debug!(
            target: "engine::router",
            token_from = %request.coin_type_from,
            token_to = %request.coin_type_to,
            eligible = venues.len(),
            total = self.venues.len(),
            "venue 筛选完成"
        );

        let routes = self.aggregator.routes(&venues, request).await;
        let winner = routes.best().map(|(entry, route)| RouteWinner {
            venue: Arc::clone(&entry.venue),
            route: route.clone(),
        });

        match &winner {
            Some(winner) => events::best_route_selected(
                winner.venue.provider_name(),
                winner.route.output_amount,
                &winner.route.route.pools,
                routes.queried(),
            ),
            None => warn!(
                target: "engine::router",
                token_from = %request.coin_type_from,
                token_to = %request.coin_type_to,
                queried = routes.queried(),
                "没有可用路由"
            ),
        }

        Ok(RouteSelection { routes, winner })
    }

    /// 计算手续费并拆分到各收费方；非原生代币同时拉取用户持有的 coin object。
    pub async fn prepare_swap_fee(
        &self,
        token_from: &str,
        amount: Decimal,
        signer_address: &str,
        policy: &FeePolicy,
    ) -> EngineResult<SwapFee> {
        let decimals = self
            .coins
            .coin_metadata(token_from)
            .await
            .map(|metadata| metadata.decimals)
            .or_else(|| is_native_coin_type(token_from).then_some(NATIVE_DECIMALS))
            .ok_or_else(|| EngineError::Resolution(format!("无法获取 {token_from} 的精度")))?;

        let (general, fees) = policy.fee_entries(amount, decimals)?;
        let coin_objects = if is_native_coin_type(token_from) {
            None
        } else {
            Some(self.ledger.owned_coins(signer_address, token_from).await?)
        };

        debug!(
            target: "engine::router",
            token_from,
            general_fee_amount = general,
            collectors = fees.len(),
            coin_objects = coin_objects.as_ref().map_or(0, Vec::len),
            "手续费已计算"
        );

        Ok(SwapFee {
            fees,
            token_from_decimals: decimals,
            token_from_coin_objects: coin_objects,
        })
    }

    /// 询价、收费、拼装完整的交易计划，交给外部签名提交。
    pub async fn best_route_transaction(&self, params: &SwapParams) -> EngineResult<RouteOutcome> {
        let started = Instant::now();
        ensure_pair(&params.token_from, &params.token_to)?;
        ensure_positive(params.amount)?;

        let fee = match &params.fee {
            Some(policy) => Some(
                self.prepare_swap_fee(
                    &params.token_from,
                    params.amount,
                    &params.signer_address,
                    policy,
                )
                .await?,
            ),
            None => None,
        };

        let input_amount = amount_including_fees(params.amount, fee.as_ref())?;
        if input_amount <= Decimal::ZERO {
            return Err(EngineError::InvalidRequest(format!(
                "扣除手续费后兑换金额为 {input_amount}"
            )));
        }

        let request = RouteRequest {
            coin_type_from: params.token_from.clone(),
            coin_type_to: params.token_to.clone(),
            input_amount,
            public_key: params.signer_address.clone(),
            slippage_percentage: params.slippage_percentage,
        };
        let RouteSelection { routes, winner } = self.best_route(&request).await?;
        let Some(winner) = winner else {
            return Ok(RouteOutcome::NoRoute {
                queried: routes.queried(),
            });
        };

        let swap_request = SwapRequest {
            route: winner.route.route.clone(),
            public_key: params.signer_address.clone(),
            slippage_percentage: params.slippage_percentage,
        };
        let gas_budget = self.settings.swap_gas_budget;

        let (plan, fee_placement) = match &fee {
            None => {
                let mut plan = winner.venue.swap_transaction(&swap_request).await?;
                plan.set_gas_budget(gas_budget);
                (plan, None)
            }
            Some(fee) => {
                let placement = winner.venue.fee_placement();
                let plan = match placement {
                    FeePlacement::BeforeSwap => {
                        transaction_with_fees_before_swap(
                            winner.venue.as_ref(),
                            &swap_request,
                            fee,
                            &params.token_from,
                            gas_budget,
                        )
                        .await?
                    }
                    FeePlacement::AfterSwap => {
                        transaction_with_fees_after_swap(
                            winner.venue.as_ref(),
                            &swap_request,
                            fee,
                            &params.token_from,
                            gas_budget,
                        )
                        .await?
                    }
                };
                (plan, Some(placement))
            }
        };

        plan.validate()?;
        events::plan_assembled(
            winner.venue.provider_name(),
            plan.commands().len(),
            fee_placement,
            started.elapsed(),
        );
        info!(
            target: "engine::router",
            venue = winner.venue.provider_name(),
            output_amount = winner.route.output_amount,
            commands = plan.commands().len(),
            "交易计划已生成"
        );

        Ok(RouteOutcome::Ready(Box::new(PreparedSwap {
            venue: winner.venue.provider_name().to_string(),
            output_amount: winner.route.output_amount,
            plan,
            fee,
            fee_placement,
            routes,
        })))
    }

    pub async fn simulate(
        &self,
        plan: &TransactionPlan,
        sender: &str,
    ) -> EngineResult<SimulationOutcome> {
        Ok(self.ledger.simulate(plan, sender).await?)
    }

    fn is_eligible(&self, venue: &dyn VenueAdapter, token_from: &str, token_to: &str) -> bool {
        let name = venue.provider_name();
        if !self.settings.supported_providers.is_empty()
            && !self
                .settings
                .supported_providers
                .iter()
                .any(|supported| supported.contains(name))
        {
            return false;
        }

        let coins = venue.coins();
        if coins.is_empty() {
            warn!(target: "engine::router", venue = name, "venue 没有已知代币");
            return false;
        }
        let knows = |coin_type: &str| coins.iter().any(|known| coin_types_equal(known, coin_type));
        if !knows(token_from) || !knows(token_to) {
            return false;
        }

        if venue.is_smart_routing_available() {
            return true;
        }

        let paths = venue.paths();
        let from_native = is_native_coin_type(token_from);
        let to_native = is_native_coin_type(token_to);
        if from_native || to_native {
            let other = if from_native { token_to } else { token_from };
            has_path(SHORT_NATIVE_COIN_TYPE, other, &paths)
                || has_path(LONG_NATIVE_COIN_TYPE, other, &paths)
        } else {
            has_path(token_from, token_to, &paths)
        }
    }
}

fn ensure_unique_names(venues: &[Arc<dyn VenueAdapter>]) -> EngineResult<()> {
    let mut names = HashSet::with_capacity(venues.len());
    for venue in venues {
        if !names.insert(venue.provider_name()) {
            return Err(EngineError::DuplicateVenue(venue.provider_name().to_string()));
        }
    }
    Ok(())
}

fn ensure_pair(token_from: &str, token_to: &str) -> EngineResult<()> {
    if token_from_is_token_to(token_from, token_to) {
        return Err(EngineError::InvalidRequest(format!(
            "源代币与目标代币相同: {token_from}"
        )));
    }
    Ok(())
}

fn ensure_positive(amount: Decimal) -> EngineResult<()> {
    if amount <= Decimal::ZERO {
        return Err(EngineError::InvalidRequest(format!("兑换金额必须大于 0: {amount}")));
    }
    Ok(())
}

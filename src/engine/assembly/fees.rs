//! 将手续费命令写入交易计划，并与 venue 的兑换命令按顺序拼接。

use tracing::{debug, warn};

use super::merge::{MergeError, consolidate_coins};
use crate::coin::{CoinObject, is_native_coin_type};
use crate::engine::{EngineError, EngineResult};
use crate::fee::{FeeEntries, SwapFee};
use crate::monitoring::events;
use crate::transaction::{Argument, TransactionPlan};
use crate::venue::{FeePlacement, FundingRef, SwapRequest, VenueAdapter};

/// 从指定 coin 拆出手续费的结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeTransfers {
    /// 最后一条 transfer 命令的结果。
    pub last_result: Argument,
    /// 非原生代币：所有 coin object 汇总后的 object id。
    pub result_object: Option<String>,
}

/// 原生代币手续费：逐条从 gas coin 拆出并转给收费方。
pub fn fee_in_native_transaction(plan: &mut TransactionPlan, fees: &FeeEntries) -> FeeTransfers {
    let last_result = split_and_transfer(plan, Argument::GasCoin, fees);
    FeeTransfers {
        last_result,
        result_object: None,
    }
}

/// 非原生代币手续费：先把 coin object 汇总为一个，再逐条拆分转账。
pub fn fee_in_coin_transaction(
    plan: &mut TransactionPlan,
    fees: &FeeEntries,
    coins: &[CoinObject],
) -> Result<FeeTransfers, MergeError> {
    let merged = consolidate_coins(plan, coins)?;
    let source = plan.object(&merged.destination_object);
    let last_result = split_and_transfer(plan, source, fees);

    debug!(
        target: "engine::assembly",
        result_object = %merged.destination_object,
        merged = merged.merge_result.is_some(),
        fee_count = fees.len(),
        "手续费已从汇总 coin 拆出"
    );

    Ok(FeeTransfers {
        last_result,
        result_object: Some(merged.destination_object),
    })
}

/// 按源代币类型选择收费方式。
///
/// 非原生代币但没有提供 coin object 时直接报错，计划保持不变。
pub fn add_fees_to_plan(
    plan: &mut TransactionPlan,
    fee: &SwapFee,
    token_from: &str,
) -> EngineResult<FeeTransfers> {
    let transfers = if is_native_coin_type(token_from) {
        fee_in_native_transaction(plan, &fee.fees)
    } else if fee.coin_objects_provided() {
        fee_in_coin_transaction(plan, &fee.fees, fee.coin_objects())?
    } else {
        warn!(
            target: "engine::assembly",
            token_from,
            "非原生代币收费缺少 coin object"
        );
        return Err(EngineError::InvalidFeeConfiguration(format!(
            "{token_from} 不是原生代币，但没有提供任何 coin object"
        )));
    };

    Ok(transfers)
}

/// 先收费，再由 venue 在同一计划上追加兑换。
///
/// 非原生代币以汇总后的 coin object 作为兑换资金，原生代币使用 gas coin。
/// venue 给出的 gas 预算不可靠，最后统一覆盖为 `gas_budget`。
pub async fn transaction_with_fees_before_swap(
    venue: &dyn VenueAdapter,
    request: &SwapRequest,
    fee: &SwapFee,
    token_from: &str,
    gas_budget: u64,
) -> EngineResult<TransactionPlan> {
    let mut plan = TransactionPlan::new();
    let transfers = add_fees_to_plan(&mut plan, fee, token_from)?;
    events::fees_attached(token_from, &fee.fees, FeePlacement::BeforeSwap);

    let funding = match transfers.result_object {
        Some(object_id) => FundingRef {
            argument: plan.object(&object_id),
            object_id: Some(object_id),
        },
        None => FundingRef::gas(),
    };
    let mut plan = venue
        .doctored_swap_transaction(request, plan, &funding)
        .await?;
    plan.set_gas_budget(gas_budget);
    Ok(plan)
}

/// 先由 venue 构建兑换，覆盖 gas 预算后再追加收费命令。
pub async fn transaction_with_fees_after_swap(
    venue: &dyn VenueAdapter,
    request: &SwapRequest,
    fee: &SwapFee,
    token_from: &str,
    gas_budget: u64,
) -> EngineResult<TransactionPlan> {
    let mut plan = venue.swap_transaction(request).await?;
    plan.set_gas_budget(gas_budget);
    add_fees_to_plan(&mut plan, fee, token_from)?;
    events::fees_attached(token_from, &fee.fees, FeePlacement::AfterSwap);
    Ok(plan)
}

fn split_and_transfer(plan: &mut TransactionPlan, source: Argument, fees: &FeeEntries) -> Argument {
    let mut last_result = None;
    for entry in fees {
        let amount = plan.pure_u64(entry.fee_amount);
        let split = plan.split_coins(source, vec![amount]);
        let collector = plan.pure_address(&entry.fee_collector_address);
        last_result = Some(plan.transfer_objects(vec![split.first_output()], collector));
    }
    // FeeEntries 非空
    last_result.unwrap_or(source)
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::*;
    use crate::coin::{SHORT_NATIVE_COIN_TYPE, normalize_address};
    use crate::fee::FeeEntry;
    use crate::transaction::{CallArg, Command, PureValue};
    use crate::venue::{PoolData, Route, RouteData, RouteRequest, VenueError};

    const USDC: &str = "0x5::usdc::USDC";

    fn fee(entries: &[(u64, &str)], coins: Option<Vec<CoinObject>>) -> SwapFee {
        SwapFee {
            fees: FeeEntries::try_from(
                entries
                    .iter()
                    .map(|(amount, address)| FeeEntry::new(*amount, *address))
                    .collect::<Vec<_>>(),
            )
            .unwrap(),
            token_from_decimals: 6,
            token_from_coin_objects: coins,
        }
    }

    fn request() -> SwapRequest {
        SwapRequest {
            route: Route::new(json!({})),
            public_key: "0xabc".to_string(),
            slippage_percentage: Decimal::ONE,
        }
    }

    /// 追加一条 move call，资金来自 `funding`，并保留 venue 自己设置的 gas 预算。
    #[derive(Debug)]
    struct RecordingVenue;

    #[async_trait]
    impl VenueAdapter for RecordingVenue {
        fn provider_name(&self) -> &str {
            "recording"
        }

        fn is_smart_routing_available(&self) -> bool {
            true
        }

        fn coins(&self) -> HashSet<String> {
            HashSet::new()
        }

        fn paths(&self) -> HashMap<String, PoolData> {
            HashMap::new()
        }

        async fn route_data(&self, _: &RouteRequest) -> Result<Option<RouteData>, VenueError> {
            Ok(None)
        }

        async fn swap_transaction(&self, _: &SwapRequest) -> Result<TransactionPlan, VenueError> {
            let mut plan = TransactionPlan::new();
            let coin = plan.object("0xc1");
            plan.move_call("0xdex::router::swap", vec![], vec![coin]);
            plan.set_gas_budget(1);
            Ok(plan)
        }

        async fn doctored_swap_transaction(
            &self,
            _: &SwapRequest,
            mut plan: TransactionPlan,
            funding: &FundingRef,
        ) -> Result<TransactionPlan, VenueError> {
            // 按 id 列表取资金，没有 id 时回落到计划内引用
            let coins: Vec<Argument> = match funding.object_ids().as_slice() {
                [] => vec![funding.argument],
                ids => ids.iter().map(|id| plan.object(id)).collect(),
            };
            plan.move_call("0xdex::router::swap", vec![], coins);
            plan.set_gas_budget(1);
            Ok(plan)
        }
    }

    #[test]
    fn native_fees_split_from_gas_coin() {
        let mut plan = TransactionPlan::new();
        let fee = fee(&[(500_000, "0xa"), (500_000, "0xb")], None);
        let transfers = add_fees_to_plan(&mut plan, &fee, SHORT_NATIVE_COIN_TYPE).unwrap();

        let commands = plan.commands();
        assert_eq!(commands.len(), 4);
        assert!(matches!(
            commands[0],
            Command::SplitCoins {
                coin: Argument::GasCoin,
                ..
            }
        ));
        assert!(matches!(
            &commands[1],
            Command::TransferObjects { objects, .. } if objects == &vec![Argument::NestedResult(0, 0)]
        ));
        assert_eq!(transfers.last_result, Argument::Result(3));
        assert_eq!(transfers.result_object, None);
        assert_eq!(plan.validate(), Ok(()));
    }

    #[test]
    fn non_native_without_coins_leaves_plan_untouched() {
        let mut plan = TransactionPlan::new();
        let existing = plan.object("0xc1");
        plan.move_call("0xdex::router::swap", vec![], vec![existing]);
        let before = plan.clone();

        let result = add_fees_to_plan(&mut plan, &fee(&[(10, "0xa")], Some(vec![])), USDC);
        assert!(matches!(result, Err(EngineError::InvalidFeeConfiguration(_))));
        assert_eq!(plan, before);
    }

    #[test]
    fn coin_fees_split_from_consolidated_object() {
        let mut plan = TransactionPlan::new();
        let coins = vec![
            CoinObject::new("0xc1", USDC, 10),
            CoinObject::new("0xc2", USDC, 20),
        ];
        let transfers =
            fee_in_coin_transaction(&mut plan, &fee(&[(3, "0xa")], None).fees, &coins).unwrap();

        assert_eq!(transfers.result_object, Some(normalize_address("0xc1")));
        let commands = plan.commands();
        assert!(matches!(commands[0], Command::MergeCoins { .. }));
        let Command::SplitCoins { coin, amounts } = &commands[1] else {
            panic!("expected split");
        };
        assert_eq!(
            plan.resolve_object(coin).map(|object| object.normalized_id()),
            Some(normalize_address("0xc1"))
        );
        assert_eq!(
            plan.input(match amounts[0] {
                Argument::Input(idx) => idx,
                other => panic!("unexpected amount argument {other:?}"),
            }),
            Some(&CallArg::Pure(PureValue::U64(3)))
        );
    }

    #[tokio::test]
    async fn fees_before_swap_fund_the_venue_call() {
        let coins = vec![CoinObject::new("0xc1", USDC, 10)];
        let fee = fee(&[(2, "0xa"), (1, "0xb")], Some(coins));
        let plan = transaction_with_fees_before_swap(&RecordingVenue, &request(), &fee, USDC, 50)
            .await
            .unwrap();

        let commands = plan.commands();
        assert_eq!(commands.len(), 5);
        let Command::MoveCall { arguments, .. } = &commands[4] else {
            panic!("swap should be last");
        };
        assert_eq!(arguments.len(), 1);
        assert_eq!(
            plan.resolve_object(&arguments[0]).map(|object| object.normalized_id()),
            Some(normalize_address("0xc1"))
        );
        let objects = plan
            .inputs()
            .iter()
            .filter(|input| matches!(input, CallArg::Object(_)))
            .count();
        assert_eq!(objects, 1);
        assert_eq!(plan.gas_budget(), Some(50));
        assert_eq!(plan.validate(), Ok(()));
    }

    #[tokio::test]
    async fn native_fees_before_swap_fund_from_gas() {
        let fee = fee(&[(500_000, "0xa"), (500_000, "0xb")], None);
        let plan = transaction_with_fees_before_swap(
            &RecordingVenue,
            &request(),
            &fee,
            SHORT_NATIVE_COIN_TYPE,
            50,
        )
        .await
        .unwrap();

        let commands = plan.commands();
        assert_eq!(commands.len(), 5);
        let Command::MoveCall { arguments, .. } = &commands[4] else {
            panic!("swap should be last");
        };
        assert_eq!(arguments[0], Argument::GasCoin);
    }

    #[tokio::test]
    async fn fees_after_swap_append_transfers() {
        let fee = fee(&[(7, "0xa")], None);
        let plan = transaction_with_fees_after_swap(
            &RecordingVenue,
            &request(),
            &fee,
            SHORT_NATIVE_COIN_TYPE,
            50,
        )
        .await
        .unwrap();

        let commands = plan.commands();
        assert!(matches!(commands[0], Command::MoveCall { .. }));
        assert!(matches!(commands[1], Command::SplitCoins { .. }));
        assert!(matches!(commands[2], Command::TransferObjects { .. }));
        assert_eq!(plan.gas_budget(), Some(50));
    }
}

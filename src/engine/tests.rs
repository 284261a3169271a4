use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{Value, json};

use crate::coin::{
    CoinMetadata, CoinMetadataSource, CoinObject, LONG_NATIVE_COIN_TYPE, SHORT_NATIVE_COIN_TYPE,
    coin_types_equal, normalize_address,
};
use crate::fee::{FeeCollectorShare, FeePolicy};
use crate::ledger::{LedgerClient, LedgerError, SimulationOutcome};
use crate::transaction::{Argument, CallArg, Command, PureValue, TransactionPlan};
use crate::venue::{
    FeePlacement, FundingRef, PoolData, Route, RouteData, RouteRequest, SwapRequest,
    VenueAdapter, VenueError,
};

use super::{EngineError, RouteManager, RouteOutcome, RouterSettings, SwapParams};

const USDC: &str = "0x5::usdc::USDC";
const CETUS: &str = "0x6::cetus::CETUS";
const SIGNER: &str = "0xabc";

#[derive(Debug, Clone)]
enum Quote {
    Amount(u64),
    Empty,
    Fail,
}

/// 兑换时在计划里追加一条 move call；`premerge` 模拟 venue 自己先合并 coin。
#[derive(Debug)]
struct MockVenue {
    name: &'static str,
    coins: HashSet<String>,
    paths: HashMap<String, PoolData>,
    smart_routing: bool,
    quote: Quote,
    placement: FeePlacement,
    premerge: Vec<&'static str>,
    quoted_amounts: std::sync::Mutex<Vec<Decimal>>,
    quote_calls: AtomicUsize,
}

impl MockVenue {
    fn new(name: &'static str, quote: Quote) -> Self {
        Self {
            name,
            coins: [SHORT_NATIVE_COIN_TYPE, USDC, CETUS]
                .into_iter()
                .map(str::to_string)
                .collect(),
            paths: HashMap::new(),
            smart_routing: true,
            quote,
            placement: FeePlacement::BeforeSwap,
            premerge: Vec::new(),
            quoted_amounts: std::sync::Mutex::new(Vec::new()),
            quote_calls: AtomicUsize::new(0),
        }
    }

    fn without_smart_routing(mut self, paths: &[(&str, &str)]) -> Self {
        self.smart_routing = false;
        self.paths = paths
            .iter()
            .enumerate()
            .map(|(idx, (base, quote))| {
                (
                    format!("pool-{idx}"),
                    PoolData {
                        pool_id: format!("0xp{idx}"),
                        base: base.to_string(),
                        quote: quote.to_string(),
                    },
                )
            })
            .collect();
        self
    }

    fn with_coins(mut self, coins: &[&str]) -> Self {
        self.coins = coins.iter().map(|coin| coin.to_string()).collect();
        self
    }

    fn with_placement(mut self, placement: FeePlacement) -> Self {
        self.placement = placement;
        self
    }

    fn with_premerge(mut self, ids: &[&'static str]) -> Self {
        self.premerge = ids.to_vec();
        self
    }

    fn calls(&self) -> usize {
        self.quote_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VenueAdapter for MockVenue {
    fn provider_name(&self) -> &str {
        self.name
    }

    fn is_smart_routing_available(&self) -> bool {
        self.smart_routing
    }

    fn coins(&self) -> HashSet<String> {
        self.coins.clone()
    }

    fn paths(&self) -> HashMap<String, PoolData> {
        self.paths.clone()
    }

    fn fee_placement(&self) -> FeePlacement {
        self.placement
    }

    async fn route_data(&self, request: &RouteRequest) -> Result<Option<RouteData>, VenueError> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut amounts) = self.quoted_amounts.lock() {
            amounts.push(request.input_amount);
        }
        match self.quote {
            Quote::Amount(output_amount) => Ok(Some(RouteData {
                route: Route::new(json!({ "venue": self.name }))
                    .with_pools(vec![format!("{}-pool", self.name)]),
                output_amount,
            })),
            Quote::Empty => Ok(None),
            Quote::Fail => Err(VenueError::quote(self.name, "rpc unavailable")),
        }
    }

    async fn swap_transaction(&self, request: &SwapRequest) -> Result<TransactionPlan, VenueError> {
        let mut plan = TransactionPlan::new();
        let funding = match self.premerge.split_first() {
            Some((first, rest)) => {
                let destination = plan.object(first);
                let sources = rest.iter().map(|id| plan.object(id)).collect();
                plan.merge_coins(destination, sources);
                destination
            }
            None => plan.gas(),
        };
        plan.move_call(
            format!("{}::router::swap", self.name),
            vec![],
            vec![funding],
        );
        plan.set_gas_budget(1_000);
        assert_eq!(request.route.payload["venue"], Value::from(self.name));
        Ok(plan)
    }

    async fn doctored_swap_transaction(
        &self,
        _request: &SwapRequest,
        mut plan: TransactionPlan,
        funding: &FundingRef,
    ) -> Result<TransactionPlan, VenueError> {
        plan.move_call(
            format!("{}::router::swap", self.name),
            vec![],
            vec![funding.argument],
        );
        plan.set_gas_budget(1_000);
        Ok(plan)
    }
}

#[derive(Default)]
struct MockLedger {
    coins: Vec<CoinObject>,
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn owned_coins(
        &self,
        _owner: &str,
        coin_type: &str,
    ) -> Result<Vec<CoinObject>, LedgerError> {
        Ok(self
            .coins
            .iter()
            .filter(|coin| coin_types_equal(&coin.coin_type, coin_type))
            .cloned()
            .collect())
    }

    async fn get_object(&self, object_id: &str) -> Result<Value, LedgerError> {
        Err(LedgerError::ObjectNotFound(object_id.to_string()))
    }

    async fn simulate(
        &self,
        plan: &TransactionPlan,
        _sender: &str,
    ) -> Result<SimulationOutcome, LedgerError> {
        Ok(SimulationOutcome::succeeded(plan.commands().len() as u64))
    }
}

struct MockMetadata {
    decimals: HashMap<&'static str, u32>,
}

impl Default for MockMetadata {
    fn default() -> Self {
        Self {
            decimals: [(LONG_NATIVE_COIN_TYPE, 9), (USDC, 6)].into_iter().collect(),
        }
    }
}

#[async_trait]
impl CoinMetadataSource for MockMetadata {
    async fn coin_metadata(&self, coin_type: &str) -> Option<CoinMetadata> {
        self.decimals
            .iter()
            .find(|(known, _)| coin_types_equal(known, coin_type))
            .map(|(known, decimals)| CoinMetadata {
                coin_type: known.to_string(),
                decimals: *decimals,
                symbol: None,
            })
    }
}

fn dec(value: &str) -> Decimal {
    Decimal::from_str(value).expect("decimal literal")
}

fn fifty_fifty(percentage: &str) -> FeePolicy {
    FeePolicy {
        general_fee_percentage: dec(percentage),
        collectors: vec![
            FeeCollectorShare {
                address: "0xfee1".to_string(),
                share_percentage: dec("50"),
            },
            FeeCollectorShare {
                address: "0xfee2".to_string(),
                share_percentage: dec("50"),
            },
        ],
    }
}

fn manager(venues: Vec<Arc<dyn VenueAdapter>>, ledger: MockLedger) -> RouteManager {
    RouteManager::new(
        venues,
        Arc::new(MockMetadata::default()),
        Arc::new(ledger),
        RouterSettings::default(),
    )
    .expect("router")
}

fn params(token_from: &str, token_to: &str, amount: &str, fee: Option<FeePolicy>) -> SwapParams {
    SwapParams {
        token_from: token_from.to_string(),
        token_to: token_to.to_string(),
        amount: dec(amount),
        signer_address: SIGNER.to_string(),
        slippage_percentage: dec("0.5"),
        fee,
    }
}

fn pure_u64(plan: &TransactionPlan, argument: &Argument) -> Option<u64> {
    match argument {
        Argument::Input(idx) => match plan.input(*idx)? {
            CallArg::Pure(PureValue::U64(value)) => Some(*value),
            _ => None,
        },
        _ => None,
    }
}

fn expect_ready(outcome: RouteOutcome) -> super::PreparedSwap {
    match outcome {
        RouteOutcome::Ready(prepared) => *prepared,
        RouteOutcome::NoRoute { queried } => panic!("expected a route, {queried} venues queried"),
    }
}

#[tokio::test]
async fn native_fee_is_split_from_gas_before_swap() {
    let venue = Arc::new(MockVenue::new("cetus", Quote::Amount(42)));
    let router = manager(vec![venue.clone()], MockLedger::default());

    // 100_000_000 最小单位
    let outcome = router
        .best_route_transaction(&params(SHORT_NATIVE_COIN_TYPE, USDC, "0.1", Some(fifty_fifty("1"))))
        .await
        .expect("route transaction");
    let prepared = expect_ready(outcome);

    let fee = prepared.fee.as_ref().expect("fee attached");
    assert_eq!(fee.fees.total(), 1_000_000);
    let amounts: Vec<u64> = fee.fees.iter().map(|entry| entry.fee_amount).collect();
    assert_eq!(amounts, vec![500_000, 500_000]);
    assert_eq!(prepared.fee_placement, Some(FeePlacement::BeforeSwap));

    let plan = &prepared.plan;
    let commands = plan.commands();
    assert_eq!(commands.len(), 5);
    for pair in 0..2 {
        let Command::SplitCoins { coin, amounts } = &commands[pair * 2] else {
            panic!("expected split at {}", pair * 2);
        };
        assert_eq!(*coin, Argument::GasCoin);
        assert_eq!(pure_u64(plan, &amounts[0]), Some(500_000));
        assert!(matches!(commands[pair * 2 + 1], Command::TransferObjects { .. }));
    }
    assert!(matches!(commands[4], Command::MoveCall { .. }));
    assert_eq!(plan.gas_budget(), Some(super::SWAP_GAS_BUDGET));

    let quoted = venue.quoted_amounts.lock().expect("quoted amounts").clone();
    assert_eq!(quoted, vec![dec("0.099")]);
}

#[tokio::test]
async fn non_native_without_coin_objects_is_rejected() {
    let venue = Arc::new(MockVenue::new("cetus", Quote::Amount(42)));
    let router = manager(vec![venue], MockLedger::default());

    let err = router
        .best_route_transaction(&params(USDC, CETUS, "10", Some(fifty_fifty("1"))))
        .await
        .expect_err("missing coin objects");
    assert!(matches!(err, EngineError::InvalidFeeConfiguration(_)));
}

#[tokio::test]
async fn highest_output_wins_and_failures_are_kept() {
    let venues: Vec<Arc<dyn VenueAdapter>> = vec![
        Arc::new(MockVenue::new("a", Quote::Fail)),
        Arc::new(MockVenue::new("b", Quote::Amount(900))),
        Arc::new(MockVenue::new("c", Quote::Amount(1_200))),
    ];
    let router = manager(venues, MockLedger::default());

    let prepared = expect_ready(
        router
            .best_route_transaction(&params(SHORT_NATIVE_COIN_TYPE, USDC, "1", None))
            .await
            .expect("route transaction"),
    );
    assert_eq!(prepared.venue, "c");
    assert_eq!(prepared.output_amount, 1_200);
    assert!(prepared.fee.is_none());
    let a = prepared.routes.route("a").expect("venue a recorded");
    assert!(a.route.is_none());
    assert_eq!(a.output_amount(), 0);
    let c = prepared.routes.route("c").and_then(|entry| entry.route.as_ref());
    assert_eq!(c.map(|route| route.route.pools.clone()), Some(vec!["c-pool".to_string()]));
}

#[tokio::test]
async fn native_decimals_fall_back_when_metadata_is_missing() {
    let venue = Arc::new(MockVenue::new("cetus", Quote::Amount(42)));
    let router = RouteManager::new(
        vec![venue],
        Arc::new(MockMetadata {
            decimals: HashMap::new(),
        }),
        Arc::new(MockLedger::default()),
        RouterSettings::default(),
    )
    .expect("router");

    let fee = router
        .prepare_swap_fee(LONG_NATIVE_COIN_TYPE, dec("0.1"), SIGNER, &fifty_fifty("1"))
        .await
        .expect("native fee");
    assert_eq!(fee.token_from_decimals, 9);
    assert_eq!(fee.fees.total(), 1_000_000);

    let err = router
        .prepare_swap_fee(USDC, dec("1"), SIGNER, &fifty_fifty("1"))
        .await
        .expect_err("usdc unknown");
    assert!(matches!(err, EngineError::Resolution(_)));
}

#[tokio::test]
async fn fees_after_venue_merge_only_add_missing_coin() {
    let coins = vec![
        CoinObject::new("0xc1", USDC, 40_000_000),
        CoinObject::new("0xc2", USDC, 40_000_000),
        CoinObject::new("0xc3", USDC, 40_000_000),
    ];
    let venue = MockVenue::new("turbos", Quote::Amount(5))
        .with_placement(FeePlacement::AfterSwap)
        .with_premerge(&["0xc1", "0xc2"]);
    let router = manager(vec![Arc::new(venue)], MockLedger { coins });

    let prepared = expect_ready(
        router
            .best_route_transaction(&params(USDC, CETUS, "100", Some(fifty_fifty("1"))))
            .await
            .expect("route transaction"),
    );
    let plan = &prepared.plan;
    let merges: Vec<&Command> = plan
        .commands()
        .iter()
        .filter(|command| matches!(command, Command::MergeCoins { .. }))
        .collect();
    assert_eq!(merges.len(), 2);

    let Command::MergeCoins {
        destination,
        sources,
    } = merges[1]
    else {
        unreachable!();
    };
    assert_eq!(
        plan.resolve_object(destination).map(|object| object.normalized_id()),
        Some(normalize_address("0xc1"))
    );
    let merged: Vec<String> = sources
        .iter()
        .filter_map(|source| plan.resolve_object(source).map(|object| object.normalized_id()))
        .collect();
    assert_eq!(merged, vec![normalize_address("0xc3")]);
    assert_eq!(plan.validate(), Ok(()));
}

#[tokio::test]
async fn no_route_when_every_venue_comes_back_empty() {
    let venues: Vec<Arc<dyn VenueAdapter>> = vec![
        Arc::new(MockVenue::new("a", Quote::Empty)),
        Arc::new(MockVenue::new("b", Quote::Fail)),
    ];
    let router = manager(venues, MockLedger::default());

    let outcome = router
        .best_route_transaction(&params(SHORT_NATIVE_COIN_TYPE, USDC, "1", None))
        .await
        .expect("no route is not an error");
    assert!(matches!(outcome, RouteOutcome::NoRoute { queried: 2 }));
}

#[tokio::test]
async fn unknown_decimals_stop_the_build() {
    let venue = Arc::new(MockVenue::new("cetus", Quote::Amount(42)));
    let router = manager(vec![venue.clone()], MockLedger::default());

    let err = router
        .best_route_transaction(&params(CETUS, USDC, "1", Some(fifty_fifty("1"))))
        .await
        .expect_err("decimals unknown");
    assert!(matches!(err, EngineError::Resolution(_)));
    assert_eq!(venue.calls(), 0);
}

#[tokio::test]
async fn same_asset_swap_is_rejected() {
    let router = manager(vec![], MockLedger::default());
    let err = router
        .best_route_transaction(&params(SHORT_NATIVE_COIN_TYPE, LONG_NATIVE_COIN_TYPE, "1", None))
        .await
        .expect_err("same asset");
    assert!(matches!(err, EngineError::InvalidRequest(_)));
}

#[tokio::test]
async fn filter_respects_coins_paths_and_supported_providers() {
    let direct = Arc::new(
        MockVenue::new("flowx", Quote::Amount(1))
            .without_smart_routing(&[(LONG_NATIVE_COIN_TYPE, USDC)]),
    );
    let no_path = Arc::new(
        MockVenue::new("kriya", Quote::Amount(1)).without_smart_routing(&[(USDC, CETUS)]),
    );
    let missing_coin = Arc::new(
        MockVenue::new("interest", Quote::Amount(1)).with_coins(&[SHORT_NATIVE_COIN_TYPE]),
    );
    let unlisted = Arc::new(MockVenue::new("aftermath", Quote::Amount(1)));
    let venues: Vec<Arc<dyn VenueAdapter>> = vec![direct, no_path, missing_coin, unlisted];

    let mut settings = RouterSettings::default();
    let router = RouteManager::new(
        venues.clone(),
        Arc::new(MockMetadata::default()),
        Arc::new(MockLedger::default()),
        settings.clone(),
    )
    .expect("router");
    let names: Vec<String> = router
        .filter_venues(SHORT_NATIVE_COIN_TYPE, USDC)
        .iter()
        .map(|venue| venue.provider_name().to_string())
        .collect();
    assert_eq!(names, vec!["flowx", "aftermath"]);

    settings.supported_providers = vec!["FlowxV3".to_string(), "flowx".to_string()];
    let router = RouteManager::new(
        venues,
        Arc::new(MockMetadata::default()),
        Arc::new(MockLedger::default()),
        settings,
    )
    .expect("router");
    let names: Vec<String> = router
        .filter_venues(USDC, LONG_NATIVE_COIN_TYPE)
        .iter()
        .map(|venue| venue.provider_name().to_string())
        .collect();
    assert_eq!(names, vec!["flowx"]);
}

#[test]
fn same_named_venues_are_rejected() {
    let venues: Vec<Arc<dyn VenueAdapter>> = vec![
        Arc::new(MockVenue::new("dup", Quote::Amount(1_200))),
        Arc::new(MockVenue::new("dup", Quote::Fail)),
    ];
    let err = RouteManager::new(
        venues,
        Arc::new(MockMetadata::default()),
        Arc::new(MockLedger::default()),
        RouterSettings::default(),
    )
    .err()
    .expect("duplicate names");
    assert!(matches!(err, EngineError::DuplicateVenue(name) if name == "dup"));
}

#[tokio::test]
async fn simulate_delegates_to_ledger() {
    let router = manager(vec![], MockLedger::default());
    let mut plan = TransactionPlan::new();
    let amount = plan.pure_u64(1);
    plan.split_coins(plan.gas(), vec![amount]);

    let outcome = router.simulate(&plan, SIGNER).await.expect("simulate");
    assert!(outcome.success);
    assert_eq!(outcome.gas_used, Some(1));
}

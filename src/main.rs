use std::fs;
use std::path::PathBuf;
use std::time::SystemTime;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use time::{OffsetDateTime, UtcOffset, macros::format_description};
use tracing::info;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::{EnvFilter, fmt};

use swap_router::cache::InMemoryStorage;
use swap_router::cache::{CacheKey, StorageProperty};
use swap_router::config::{self, CONFIG_TEMPLATE, ConfigError, RouterConfig, load_config};
use swap_router::fee::{FeeEntry, FeePolicy, calculate_net_amount};
use swap_router::monitoring;
use swap_router::venue::{PoolData, has_path, load_cached_pools};

#[derive(Parser, Debug)]
#[command(name = "swap-router", version, about = "多 venue 兑换路由工具")]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径（其次读取 SWAP_ROUTER_CONFIG，默认查找 swap-router.toml 或 config/swap-router.toml）"
    )]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 按配置计算手续费及各收费方分成（离线）
    Fees(FeesCmd),
    /// 检查本地池子快照是否仍在有效期内，以及是否存在直接池子
    Pools(PoolsCmd),
    /// 初始化配置模版文件
    Init(InitCmd),
}

#[derive(Args, Debug)]
struct FeesCmd {
    #[arg(long, help = "兑换金额（主单位）")]
    amount: Decimal,
    #[arg(long, help = "源代币精度")]
    decimals: u32,
    #[arg(long, help = "覆盖配置中的手续费比例（百分比）")]
    percentage: Option<Decimal>,
}

#[derive(Args, Debug)]
struct PoolsCmd {
    #[arg(long, help = "venue 名称")]
    provider: String,
    #[arg(long, value_name = "FILE", help = "PoolData 数组的 JSON 快照")]
    snapshot: PathBuf,
    #[arg(long, help = "源代币类型")]
    from: Option<String>,
    #[arg(long, help = "目标代币类型")]
    to: Option<String>,
}

#[derive(Args, Debug)]
struct InitCmd {
    #[arg(long, value_name = "DIR", help = "可选输出目录（默认当前目录）")]
    output: Option<PathBuf>,
    #[arg(long, help = "若文件存在则覆盖")]
    force: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FeeReport {
    general_fee_amount: u64,
    fees: Vec<FeeEntry>,
    net_amount: Decimal,
    undistributed: u128,
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_configuration(cli.config.clone())?;
    init_tracing(&config.global.logging)?;

    if config.global.prometheus.enable {
        monitoring::try_init_prometheus(&config.global.prometheus.listen)?;
    }

    match cli.command {
        Command::Fees(args) => print_fees(&config, args)?,
        Command::Pools(args) => inspect_pools(&config, args).await?,
        Command::Init(args) => init_config(args)?,
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

fn init_tracing(config: &config::LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let time_format =
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]");
    let offset = UtcOffset::from_hms(config.timezone_offset_hours, 0, 0).map_err(|err| {
        anyhow!(
            "invalid logging timezone offset {}: {err}",
            config.timezone_offset_hours
        )
    })?;
    let timer = OffsetTime::new(offset, time_format);

    let base = fmt().with_timer(timer).with_target(true).with_level(true);
    if config.json {
        base.json()
            .with_current_span(false)
            .with_span_list(false)
            .with_env_filter(filter)
            .try_init()
            .map_err(|err| anyhow!(err))
    } else {
        base.with_env_filter(filter)
            .try_init()
            .map_err(|err| anyhow!(err))
    }
}

fn load_configuration(path: Option<PathBuf>) -> Result<RouterConfig, ConfigError> {
    load_config(path)
}

fn print_fees(config: &RouterConfig, args: FeesCmd) -> Result<()> {
    let general_fee_percentage = args
        .percentage
        .or(config.fee.general_fee_percentage)
        .ok_or_else(|| anyhow!("未配置手续费比例，请在 [fee] 中设置或使用 --percentage"))?;
    if config.fee.collectors.is_empty() {
        return Err(anyhow!("未配置任何收费方（[[fee.collectors]]）"));
    }

    let policy = FeePolicy {
        general_fee_percentage,
        collectors: config.fee.collectors.clone(),
    };
    let (general_fee_amount, entries) = policy.fee_entries(args.amount, args.decimals)?;
    let net_amount = calculate_net_amount(general_fee_percentage, args.amount, args.decimals)?;

    let report = FeeReport {
        general_fee_amount,
        undistributed: u128::from(general_fee_amount).saturating_sub(entries.total()),
        fees: entries.into(),
        net_amount,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn inspect_pools(config: &RouterConfig, args: PoolsCmd) -> Result<()> {
    let contents = fs::read_to_string(&args.snapshot)
        .with_context(|| format!("读取快照失败: {}", args.snapshot.display()))?;
    let pools: Vec<PoolData> = serde_json::from_str(&contents)
        .with_context(|| format!("快照格式错误: {}", args.snapshot.display()))?;
    let modified: OffsetDateTime = fs::metadata(&args.snapshot)?
        .modified()
        .unwrap_or_else(|_| SystemTime::now())
        .into();
    let timestamp_ms = i64::try_from(modified.unix_timestamp_nanos() / 1_000_000)?;

    let storage = InMemoryStorage::new();
    storage.insert_with_timestamp(
        CacheKey::for_provider(args.provider.as_str(), StorageProperty::Pools),
        serde_json::to_value(&pools)?,
        timestamp_ms,
    );

    let fresh = load_cached_pools(&storage, &args.provider, config.storage.pools_ttl).await?;
    info!(
        target: "cli::pools",
        provider = %args.provider,
        total = pools.len(),
        fresh = fresh.len(),
        "池子快照已加载"
    );
    println!("provider: {}", args.provider);
    println!("pools: {} (fresh: {})", pools.len(), fresh.len());

    if let (Some(from), Some(to)) = (args.from.as_deref(), args.to.as_deref()) {
        let paths = fresh
            .into_iter()
            .map(|pool| (pool.pool_id.clone(), pool))
            .collect();
        println!("direct path {from} -> {to}: {}", has_path(from, to, &paths));
    }
    Ok(())
}

fn init_config(args: InitCmd) -> Result<()> {
    let output_dir = match args.output {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    fs::create_dir_all(&output_dir)?;

    let target_path = output_dir.join("swap-router.toml");
    if target_path.exists() && !args.force {
        println!(
            "跳过 {}（文件已存在，如需覆盖请加 --force）",
            target_path.display()
        );
        return Ok(());
    }

    fs::write(&target_path, CONFIG_TEMPLATE)?;
    println!("已写入 {}", target_path.display());
    Ok(())
}

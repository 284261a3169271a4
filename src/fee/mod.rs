//! 手续费金额计算：百分比换算、按份额拆分、扣费后净额。
//!
//! 全部使用 `rust_decimal` 定点运算，最小单位金额可能远超 2^53。

use std::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use thiserror::Error;

use crate::coin::CoinObject;

/// `Decimal` 可表示的最大小数位。
const MAX_DECIMALS: u32 = 28;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeeError {
    #[error("手续费比例非法: {0}")]
    InvalidPercentage(Decimal),
    #[error("金额不能为负: {0}")]
    NegativeAmount(Decimal),
    #[error("不支持的代币精度: {0}")]
    UnsupportedDecimals(u32),
    #[error("手续费金额超出可表示范围")]
    Overflow,
    #[error("手续费列表不能为空")]
    EmptyFees,
    #[error("手续费分成配置非法: {0}")]
    InvalidShares(String),
}

/// 单个收费方的应收金额（最小单位）。
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeEntry {
    #[serde_as(as = "DisplayFromStr")]
    pub fee_amount: u64,
    pub fee_collector_address: String,
}

impl FeeEntry {
    pub fn new(fee_amount: u64, fee_collector_address: impl Into<String>) -> Self {
        Self {
            fee_amount,
            fee_collector_address: fee_collector_address.into(),
        }
    }
}

/// 非空的手续费列表。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<FeeEntry>", into = "Vec<FeeEntry>")]
pub struct FeeEntries(Vec<FeeEntry>);

impl FeeEntries {
    pub fn first(&self) -> &FeeEntry {
        &self.0[0]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FeeEntry> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn total(&self) -> u128 {
        self.0.iter().map(|entry| u128::from(entry.fee_amount)).sum()
    }
}

impl TryFrom<Vec<FeeEntry>> for FeeEntries {
    type Error = FeeError;

    fn try_from(entries: Vec<FeeEntry>) -> Result<Self, Self::Error> {
        if entries.is_empty() {
            return Err(FeeError::EmptyFees);
        }
        Ok(Self(entries))
    }
}

impl From<FeeEntries> for Vec<FeeEntry> {
    fn from(entries: FeeEntries) -> Self {
        entries.0
    }
}

impl<'a> IntoIterator for &'a FeeEntries {
    type Item = &'a FeeEntry;
    type IntoIter = std::slice::Iter<'a, FeeEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// 一次兑换需要收取的全部手续费。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapFee {
    pub fees: FeeEntries,
    pub token_from_decimals: u32,
    #[serde(default)]
    pub token_from_coin_objects: Option<Vec<CoinObject>>,
}

impl SwapFee {
    pub fn coin_objects(&self) -> &[CoinObject] {
        self.token_from_coin_objects.as_deref().unwrap_or(&[])
    }

    pub fn coin_objects_provided(&self) -> bool {
        !self.coin_objects().is_empty()
    }
}

/// 收费方及其分成比例（百分比，合计不超过 100）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeCollectorShare {
    pub address: String,
    pub share_percentage: Decimal,
}

impl fmt::Display for FeeCollectorShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}%", self.address, self.share_percentage)
    }
}

/// 手续费策略：总比例及各收费方的分成。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeePolicy {
    pub general_fee_percentage: Decimal,
    pub collectors: Vec<FeeCollectorShare>,
}

impl FeePolicy {
    /// 不依赖金额的静态检查，配置加载时即可发现问题。
    pub fn validate(&self) -> Result<(), FeeError> {
        ensure_percentage(self.general_fee_percentage)?;
        validate_shares(&self.collectors)
    }

    /// 总手续费（最小单位）以及拆分后的各收费方金额。
    pub fn fee_entries(
        &self,
        amount: Decimal,
        token_decimals: u32,
    ) -> Result<(u64, FeeEntries), FeeError> {
        let general = calculate_fee_amount_in(self.general_fee_percentage, amount, token_decimals)?;
        let entries = split_fee_by_shares(general, &self.collectors)?;
        Ok((general, entries))
    }
}

/// `amount * fee_percentage / 100`，按代币精度向零截断后换算为最小单位。
pub fn calculate_fee_amount_in(
    fee_percentage: Decimal,
    amount: Decimal,
    token_decimals: u32,
) -> Result<u64, FeeError> {
    ensure_percentage(fee_percentage)?;
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(FeeError::NegativeAmount(amount));
    }
    let scale = pow10(token_decimals)?;

    let fee = amount
        .checked_mul(fee_percentage)
        .and_then(|value| value.checked_div(Decimal::ONE_HUNDRED))
        .ok_or(FeeError::Overflow)?
        .round_dp_with_strategy(token_decimals, RoundingStrategy::ToZero);

    fee.checked_mul(scale)
        .and_then(|value| value.trunc().to_u64())
        .ok_or(FeeError::Overflow)
}

/// 扣除手续费后的净额（主单位）。
pub fn calculate_net_amount(
    fee_percentage: Decimal,
    amount: Decimal,
    token_decimals: u32,
) -> Result<Decimal, FeeError> {
    let fee_amount_in = calculate_fee_amount_in(fee_percentage, amount, token_decimals)?;
    let scale = pow10(token_decimals)?;

    amount
        .checked_mul(scale)
        .and_then(|value| value.checked_sub(Decimal::from(fee_amount_in)))
        .and_then(|value| value.checked_div(scale))
        .map(|value| value.normalize())
        .ok_or(FeeError::Overflow)
}

/// 按份额拆分总手续费，每份向下取整到最小单位，截断损失不再分配。
pub fn split_fee_by_shares(
    general_fee_amount: u64,
    collectors: &[FeeCollectorShare],
) -> Result<FeeEntries, FeeError> {
    validate_shares(collectors)?;

    let general = Decimal::from(general_fee_amount);
    let entries = collectors
        .iter()
        .map(|collector| {
            general
                .checked_mul(collector.share_percentage)
                .and_then(|value| value.checked_div(Decimal::ONE_HUNDRED))
                .and_then(|value| value.trunc().to_u64())
                .map(|fee_amount| FeeEntry::new(fee_amount, collector.address.clone()))
                .ok_or(FeeError::Overflow)
        })
        .collect::<Result<Vec<_>, _>>()?;

    FeeEntries::try_from(entries)
}

/// 收费方非空、单个分成在 `[0, 100]` 内且合计不超过 100。
pub fn validate_shares(collectors: &[FeeCollectorShare]) -> Result<(), FeeError> {
    if collectors.is_empty() {
        return Err(FeeError::EmptyFees);
    }

    let mut share_sum = Decimal::ZERO;
    for collector in collectors {
        if collector.share_percentage.is_sign_negative()
            || collector.share_percentage > Decimal::ONE_HUNDRED
        {
            return Err(FeeError::InvalidShares(collector.to_string()));
        }
        share_sum += collector.share_percentage;
    }
    if share_sum > Decimal::ONE_HUNDRED {
        return Err(FeeError::InvalidShares(format!(
            "分成合计 {share_sum}% 超过 100%"
        )));
    }
    Ok(())
}

/// 全部收费方金额之和（最小单位）。
pub fn total_fee_amount(fee: &SwapFee) -> u128 {
    fee.fees.total()
}

/// 扣除手续费后真正参与兑换的金额（主单位）。
pub fn amount_including_fees(
    full_amount: Decimal,
    fee: Option<&SwapFee>,
) -> Result<Decimal, FeeError> {
    let Some(fee) = fee else {
        return Ok(full_amount);
    };
    let scale = pow10(fee.token_from_decimals)?;
    let total = i128::try_from(total_fee_amount(fee))
        .ok()
        .and_then(|value| Decimal::try_from_i128_with_scale(value, 0).ok())
        .ok_or(FeeError::Overflow)?;

    total
        .checked_div(scale)
        .and_then(|fees| full_amount.checked_sub(fees))
        .map(|value| value.normalize())
        .ok_or(FeeError::Overflow)
}

fn ensure_percentage(value: Decimal) -> Result<(), FeeError> {
    if (value.is_sign_negative() && !value.is_zero()) || value > Decimal::ONE_HUNDRED {
        return Err(FeeError::InvalidPercentage(value));
    }
    Ok(())
}

fn pow10(decimals: u32) -> Result<Decimal, FeeError> {
    if decimals > MAX_DECIMALS {
        return Err(FeeError::UnsupportedDecimals(decimals));
    }
    (0..decimals).try_fold(Decimal::ONE, |acc, _| {
        acc.checked_mul(Decimal::TEN).ok_or(FeeError::Overflow)
    })
}

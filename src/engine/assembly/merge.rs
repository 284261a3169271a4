//! 计划内 coin object 合并：识别已有的 merge 命令，只补齐缺失的部分。
//!
//! venue 构建兑换时会自行追加 merge；重复合并同一个 object 会导致整笔交易失败，
//! 所以这里只追加尚未参与任何 merge 的 object。

use thiserror::Error;
use tracing::trace;

use crate::coin::CoinObject;
use crate::transaction::{Argument, Command, TransactionPlan};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("合并结构中没有可用的目标 object")]
    EmptyStructure,
    #[error("没有提供任何 coin object")]
    NoCoinObjects,
}

/// 已有 merge 命令中各 object 的角色，均为规范化后的 id，按首次出现排序。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedCoinsStructure {
    pub destinations: Vec<String>,
    pub sources: Vec<String>,
    pub unused_sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeLookup {
    /// 计划中没有任何 merge 涉及候选 object，需要从头合并。
    NoMerges,
    Merged(MergedCoinsStructure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub destination_object: String,
    /// 本次追加的 merge 命令；无需合并时为 `None`。
    pub merge_result: Option<Argument>,
}

/// 扫描计划中以候选 object 为目标的 merge 命令，得到各 object 当前的角色。
pub fn merged_coins_structure(plan: &TransactionPlan, coins: &[CoinObject]) -> MergeLookup {
    let candidates = dedup_ids(coins.iter().map(CoinObject::normalized_id));

    let mut destinations: Vec<String> = Vec::new();
    let mut sources: Vec<String> = Vec::new();
    let mut unused_sources = candidates.clone();
    let mut touched = false;

    for (position, command) in plan.commands().iter().enumerate() {
        let Command::MergeCoins {
            destination,
            sources: merged,
        } = command
        else {
            continue;
        };

        let Some(destination_id) = object_id_of(plan, destination, position) else {
            continue;
        };
        if !candidates.contains(&destination_id) {
            continue;
        }
        touched = true;

        insert_id(&mut destinations, &destination_id);
        remove_id(&mut unused_sources, &destination_id);

        for source in merged {
            let Some(source_id) = object_id_of(plan, source, position) else {
                continue;
            };
            // 一个 object 可能先做目标再被并入别处，以最后的角色为准
            insert_id(&mut sources, &source_id);
            remove_id(&mut destinations, &source_id);
            remove_id(&mut unused_sources, &source_id);
        }
    }

    if !touched {
        return MergeLookup::NoMerges;
    }

    MergeLookup::Merged(MergedCoinsStructure {
        destinations,
        sources,
        unused_sources,
    })
}

/// 将剩余目标和未使用的 object 一次性并入第一个目标。
///
/// 已经全部合并时不追加任何命令，重复调用不会产生多余的 merge。
pub fn merge_by_structure(
    plan: &mut TransactionPlan,
    structure: &MergedCoinsStructure,
) -> Result<MergeOutcome, MergeError> {
    let (anchor, rest_destinations) = match structure.destinations.split_first() {
        Some((anchor, rest)) => (anchor, rest),
        None => match structure.unused_sources.first() {
            Some(anchor) => (anchor, &[][..]),
            None => return Err(MergeError::EmptyStructure),
        },
    };

    let to_merge: Vec<&String> = rest_destinations
        .iter()
        .chain(structure.unused_sources.iter())
        .filter(|id| *id != anchor)
        .collect();

    if to_merge.is_empty() {
        return Ok(MergeOutcome {
            destination_object: anchor.clone(),
            merge_result: None,
        });
    }

    let destination = plan.object(anchor);
    let sources = to_merge.into_iter().map(|id| plan.object(id)).collect();
    let merge_result = plan.merge_coins(destination, sources);

    Ok(MergeOutcome {
        destination_object: anchor.clone(),
        merge_result: Some(merge_result),
    })
}

/// 计划中没有相关 merge 时的兜底：全部并入第一个 object。
pub fn merge_all_coins(
    plan: &mut TransactionPlan,
    coins: &[CoinObject],
) -> Result<MergeOutcome, MergeError> {
    let ids = dedup_ids(coins.iter().map(CoinObject::normalized_id));
    let Some((first, rest)) = ids.split_first() else {
        return Err(MergeError::NoCoinObjects);
    };

    if rest.is_empty() {
        return Ok(MergeOutcome {
            destination_object: first.clone(),
            merge_result: None,
        });
    }

    let destination = plan.object(first);
    let sources = rest.iter().map(|id| plan.object(id)).collect();
    let merge_result = plan.merge_coins(destination, sources);

    Ok(MergeOutcome {
        destination_object: first.clone(),
        merge_result: Some(merge_result),
    })
}

/// 得到一个汇总后的 coin object：优先沿用计划中已有的 merge。
pub fn consolidate_coins(
    plan: &mut TransactionPlan,
    coins: &[CoinObject],
) -> Result<MergeOutcome, MergeError> {
    match merged_coins_structure(plan, coins) {
        MergeLookup::NoMerges => merge_all_coins(plan, coins),
        MergeLookup::Merged(structure) => merge_by_structure(plan, &structure),
    }
}

fn object_id_of(plan: &TransactionPlan, argument: &Argument, position: usize) -> Option<String> {
    match plan.resolve_object(argument) {
        Some(object) => Some(object.normalized_id()),
        None => {
            trace!(
                target: "engine::assembly",
                command = position,
                ?argument,
                "merge 参数不是 object 输入，跳过"
            );
            None
        }
    }
}

fn dedup_ids(ids: impl Iterator<Item = String>) -> Vec<String> {
    let mut out = Vec::new();
    for id in ids {
        insert_id(&mut out, &id);
    }
    out
}

fn insert_id(set: &mut Vec<String>, id: &str) {
    if !set.iter().any(|existing| existing == id) {
        set.push(id.to_string());
    }
}

fn remove_id(set: &mut Vec<String>, id: &str) {
    set.retain(|existing| existing != id);
}

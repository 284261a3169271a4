use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::error::PlanError;
use crate::coin::normalize_address;

/// 以完整引用形式出现的对象（带版本与 digest）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImmOrOwnedRef {
    pub object_id: String,
    pub version: u64,
    pub digest: String,
}

/// 对象输入的两种形态：裸 id 或带 `objectId` 的包装引用。
///
/// 不同 venue 构建交易时使用的形态不同，读取时统一走 [`ObjectRef::object_id`]。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ObjectRef {
    Id(String),
    Wrapped(ImmOrOwnedRef),
}

impl ObjectRef {
    pub fn object_id(&self) -> &str {
        match self {
            ObjectRef::Id(id) => id,
            ObjectRef::Wrapped(wrapped) => &wrapped.object_id,
        }
    }

    pub fn normalized_id(&self) -> String {
        normalize_address(self.object_id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PureValue {
    U64(u64),
    Address(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CallArg {
    Object(ObjectRef),
    Pure(PureValue),
}

/// 命令参数：gas coin、输入槽位或先前命令的结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Argument {
    GasCoin,
    Input(u16),
    Result(u16),
    NestedResult(u16, u16),
}

impl Argument {
    /// 结果引用对应的命令序号。
    pub fn result_index(&self) -> Option<u16> {
        match self {
            Argument::Result(idx) | Argument::NestedResult(idx, _) => Some(*idx),
            Argument::GasCoin | Argument::Input(_) => None,
        }
    }

    /// 单结果命令（如只拆一份的 split）的第一个产出。
    pub fn first_output(&self) -> Argument {
        match self {
            Argument::Result(idx) => Argument::NestedResult(*idx, 0),
            other => *other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Command {
    SplitCoins {
        coin: Argument,
        amounts: Vec<Argument>,
    },
    MergeCoins {
        destination: Argument,
        sources: Vec<Argument>,
    },
    TransferObjects {
        objects: Vec<Argument>,
        address: Argument,
    },
    MoveCall {
        target: String,
        type_arguments: Vec<String>,
        arguments: Vec<Argument>,
    },
}

impl Command {
    fn arguments(&self) -> Vec<Argument> {
        match self {
            Command::SplitCoins { coin, amounts } => {
                let mut args = Vec::with_capacity(amounts.len() + 1);
                args.push(*coin);
                args.extend(amounts.iter().copied());
                args
            }
            Command::MergeCoins {
                destination,
                sources,
            } => {
                let mut args = Vec::with_capacity(sources.len() + 1);
                args.push(*destination);
                args.extend(sources.iter().copied());
                args
            }
            Command::TransferObjects { objects, address } => {
                let mut args = objects.clone();
                args.push(*address);
                args
            }
            Command::MoveCall { arguments, .. } => arguments.clone(),
        }
    }
}

/// 按顺序原子提交的一组命令，外加 gas 预算。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPlan {
    inputs: Vec<CallArg>,
    commands: Vec<Command>,
    gas_budget: Option<u64>,
}

impl TransactionPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gas(&self) -> Argument {
        Argument::GasCoin
    }

    /// 以裸 id 引用对象；同一对象（规范化后）只占用一个输入槽位。
    pub fn object(&mut self, object_id: &str) -> Argument {
        self.object_ref(ObjectRef::Id(object_id.to_string()))
    }

    pub fn object_ref(&mut self, object: ObjectRef) -> Argument {
        let normalized = object.normalized_id();
        let existing = self.inputs.iter().position(|input| match input {
            CallArg::Object(existing) => existing.normalized_id() == normalized,
            CallArg::Pure(_) => false,
        });
        if let Some(idx) = existing {
            return Argument::Input(to_index(idx));
        }
        self.push_input(CallArg::Object(object))
    }

    pub fn pure_u64(&mut self, value: u64) -> Argument {
        self.push_input(CallArg::Pure(PureValue::U64(value)))
    }

    pub fn pure_address(&mut self, address: &str) -> Argument {
        self.push_input(CallArg::Pure(PureValue::Address(address.to_string())))
    }

    pub fn split_coins(&mut self, coin: Argument, amounts: Vec<Argument>) -> Argument {
        self.push_command(Command::SplitCoins { coin, amounts })
    }

    pub fn merge_coins(&mut self, destination: Argument, sources: Vec<Argument>) -> Argument {
        self.push_command(Command::MergeCoins {
            destination,
            sources,
        })
    }

    pub fn transfer_objects(&mut self, objects: Vec<Argument>, address: Argument) -> Argument {
        self.push_command(Command::TransferObjects { objects, address })
    }

    pub fn move_call(
        &mut self,
        target: impl Into<String>,
        type_arguments: Vec<String>,
        arguments: Vec<Argument>,
    ) -> Argument {
        self.push_command(Command::MoveCall {
            target: target.into(),
            type_arguments,
            arguments,
        })
    }

    pub fn set_gas_budget(&mut self, budget: u64) {
        self.gas_budget = Some(budget);
    }

    pub fn gas_budget(&self) -> Option<u64> {
        self.gas_budget
    }

    pub fn inputs(&self) -> &[CallArg] {
        &self.inputs
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn input(&self, index: u16) -> Option<&CallArg> {
        self.inputs.get(usize::from(index))
    }

    /// 只解析一层：`Input(n)` 指向的对象输入；其余形态返回 `None`。
    pub fn resolve_object(&self, argument: &Argument) -> Option<&ObjectRef> {
        match argument {
            Argument::Input(idx) => match self.input(*idx)? {
                CallArg::Object(object) => Some(object),
                CallArg::Pure(_) => None,
            },
            _ => None,
        }
    }

    /// 检查条目数量、结果引用方向、输入范围以及 merge 是否重复消耗对象。
    pub fn validate(&self) -> Result<(), PlanError> {
        ensure_indexable("输入", self.inputs.len())?;
        ensure_indexable("命令", self.commands.len())?;
        let mut consumed: HashSet<String> = HashSet::new();

        for (position, command) in self.commands.iter().enumerate() {
            for argument in command.arguments() {
                match argument {
                    Argument::Input(input) if usize::from(input) >= self.inputs.len() => {
                        return Err(PlanError::UnknownInput {
                            command: position,
                            input,
                        });
                    }
                    Argument::Result(result) | Argument::NestedResult(result, _)
                        if usize::from(result) >= position =>
                    {
                        return Err(PlanError::ForwardReference {
                            command: position,
                            result,
                        });
                    }
                    _ => {}
                }
            }

            let Command::MergeCoins {
                destination,
                sources,
            } = command
            else {
                continue;
            };

            if let Argument::Input(_) = destination {
                let object = self
                    .resolve_object(destination)
                    .ok_or(PlanError::InvalidMergeDestination { command: position })?;
                let id = object.normalized_id();
                if consumed.contains(&id) {
                    return Err(PlanError::DoubleConsumption {
                        command: position,
                        object_id: id,
                    });
                }
            }

            for source in sources {
                let Some(object) = self.resolve_object(source) else {
                    continue;
                };
                let id = object.normalized_id();
                let is_destination = self
                    .resolve_object(destination)
                    .is_some_and(|dest| dest.normalized_id() == id);
                if is_destination || !consumed.insert(id.clone()) {
                    return Err(PlanError::DoubleConsumption {
                        command: position,
                        object_id: id,
                    });
                }
            }
        }

        Ok(())
    }

    fn push_input(&mut self, input: CallArg) -> Argument {
        let idx = to_index(self.inputs.len());
        self.inputs.push(input);
        Argument::Input(idx)
    }

    fn push_command(&mut self, command: Command) -> Argument {
        let idx = to_index(self.commands.len());
        self.commands.push(command);
        Argument::Result(idx)
    }
}

/// 输入与命令都以 `u16` 索引。
pub const MAX_PLAN_ENTRIES: usize = u16::MAX as usize + 1;

// 超出上限的条目会饱和到 u16::MAX，由 validate 统一拒绝。
fn to_index(len: usize) -> u16 {
    u16::try_from(len).unwrap_or(u16::MAX)
}

fn ensure_indexable(kind: &'static str, count: usize) -> Result<(), PlanError> {
    if count > MAX_PLAN_ENTRIES {
        return Err(PlanError::TooManyEntries {
            kind,
            count,
            limit: MAX_PLAN_ENTRIES,
        });
    }
    Ok(())
}

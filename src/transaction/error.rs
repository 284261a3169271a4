use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("命令 #{command} 引用了尚未产生的结果 #{result}")]
    ForwardReference { command: usize, result: u16 },
    #[error("命令 #{command} 引用了不存在的输入 #{input}")]
    UnknownInput { command: usize, input: u16 },
    #[error("命令 #{command} 的 merge 目标既不是已知对象也不是先前结果")]
    InvalidMergeDestination { command: usize },
    #[error("对象 {object_id} 在命令 #{command} 中被重复消耗")]
    DoubleConsumption { command: usize, object_id: String },
    #[error("计划中的{kind}数量 {count} 超过上限 {limit}")]
    TooManyEntries {
        kind: &'static str,
        count: usize,
        limit: usize,
    },
}

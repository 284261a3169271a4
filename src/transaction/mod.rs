mod error;
mod plan;

pub use error::PlanError;
pub use plan::{
    Argument, CallArg, Command, ImmOrOwnedRef, MAX_PLAN_ENTRIES, ObjectRef, PureValue,
    TransactionPlan,
};

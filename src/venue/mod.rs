//! 流动性 venue 的抽象。
//!
//! 每个 venue 适配器自行负责报价与构建兑换命令；路由层只通过
//! [`VenueAdapter`] 与之交互，venue 之间的参数差异在适配器内部消化。

mod adapter;
mod error;
mod paths;
mod types;

pub use adapter::VenueAdapter;
pub use error::VenueError;
pub use paths::{PoolData, has_path, load_cached_pools};
pub use types::{FeePlacement, FundingRef, Route, RouteData, RouteRequest, SwapRequest};

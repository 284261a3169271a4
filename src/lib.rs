//! 多 venue 兑换路由：并发询价、选出最优路由，并把手续费与兑换拼装进同一笔交易计划。

pub mod cache;
pub mod coin;
pub mod config;
pub mod engine;
pub mod fee;
pub mod ledger;
pub mod monitoring;
pub mod transaction;
pub mod venue;

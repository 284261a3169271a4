use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::{CacheError, CacheKey, Storage, StorageProperty, load_fresh};
use crate::coin::coin_types_equal;

/// 池子图中的一条边。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolData {
    pub pool_id: String,
    pub base: String,
    pub quote: String,
}

/// 池子图中是否存在直接连接两种代币的池子（方向无关）。
pub fn has_path(coin_a: &str, coin_b: &str, paths: &HashMap<String, PoolData>) -> bool {
    paths.values().any(|pool| {
        (coin_types_equal(&pool.base, coin_a) && coin_types_equal(&pool.quote, coin_b))
            || (coin_types_equal(&pool.base, coin_b) && coin_types_equal(&pool.quote, coin_a))
    })
}

/// 读取 venue 缓存的池子列表；缓存缺失或过期时返回空列表。
pub async fn load_cached_pools(
    storage: &dyn Storage,
    provider: &str,
    max_age: Duration,
) -> Result<Vec<PoolData>, CacheError> {
    let key = CacheKey::for_provider(provider, StorageProperty::Pools);
    let pools = load_fresh::<Vec<PoolData>>(storage, &key, max_age).await?;
    Ok(pools.unwrap_or_default())
}

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StorageProperty {
    Coins,
    Paths,
    Pools,
    CoinsMetadata,
}

impl StorageProperty {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageProperty::Coins => "coins",
            StorageProperty::Paths => "paths",
            StorageProperty::Pools => "pools",
            StorageProperty::CoinsMetadata => "coinsMetadata",
        }
    }
}

/// 缓存键：可选的 venue 名 + 属性。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub provider: Option<String>,
    pub property: StorageProperty,
}

impl CacheKey {
    pub fn for_provider(provider: impl Into<String>, property: StorageProperty) -> Self {
        Self {
            provider: Some(provider.into()),
            property,
        }
    }

    pub fn global(property: StorageProperty) -> Self {
        Self {
            provider: None,
            property,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.provider {
            Some(provider) => write!(f, "{provider}.{}", self.property.as_str()),
            None => f.write_str(self.property.as_str()),
        }
    }
}

/// 缓存值及写入时间（毫秒时间戳）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedValue {
    pub value: Value,
    pub timestamp_ms: i64,
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("缓存后端错误: {0}")]
    Backend(String),
    #[error("缓存 {key} 的数据结构不符合预期: {source}")]
    Shape {
        key: String,
        source: serde_json::Error,
    },
}

/// 存储后端抽象，内存或外部 KV 均可实现。
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get_cache(&self, key: &CacheKey) -> Result<Option<CachedValue>, CacheError>;

    async fn set_cache(&self, key: &CacheKey, value: Value) -> Result<(), CacheError>;
}

/// 默认内存后端，基于 DashMap。
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    entries: DashMap<CacheKey, CachedValue>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以指定时间戳写入，便于恢复持久化快照。
    pub fn insert_with_timestamp(&self, key: CacheKey, value: Value, timestamp_ms: i64) {
        self.entries.insert(
            key,
            CachedValue {
                value,
                timestamp_ms,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn get_cache(&self, key: &CacheKey) -> Result<Option<CachedValue>, CacheError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn set_cache(&self, key: &CacheKey, value: Value) -> Result<(), CacheError> {
        self.insert_with_timestamp(key.clone(), value, now_ms());
        Ok(())
    }
}

/// 读取未过期的缓存并反序列化。
///
/// 缺失或过期返回 `Ok(None)`；结构不匹配返回 [`CacheError::Shape`]。
pub async fn load_fresh<T>(
    storage: &dyn Storage,
    key: &CacheKey,
    max_age: Duration,
) -> Result<Option<T>, CacheError>
where
    T: DeserializeOwned,
{
    let Some(cached) = storage.get_cache(key).await? else {
        warn!(target: "cache", key = %key, "缓存为空");
        return Ok(None);
    };

    let max_age_ms = i64::try_from(max_age.as_millis()).unwrap_or(i64::MAX);
    if cached.timestamp_ms.saturating_add(max_age_ms) <= now_ms() {
        warn!(
            target: "cache",
            key = %key,
            timestamp_ms = cached.timestamp_ms,
            "缓存已过期"
        );
        return Ok(None);
    }

    serde_json::from_value(cached.value)
        .map(Some)
        .map_err(|source| CacheError::Shape {
            key: key.to_string(),
            source,
        })
}

pub fn now_ms() -> i64 {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    i64::try_from(nanos).unwrap_or(i64::MAX)
}

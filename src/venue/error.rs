use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VenueError {
    #[error("{venue} 报价失败: {reason}")]
    Quote { venue: String, reason: String },
    #[error("{venue} 构建兑换交易失败: {reason}")]
    Build { venue: String, reason: String },
    #[error("{venue} 请求超时 ({elapsed:?})")]
    Timeout { venue: String, elapsed: Duration },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VenueError {
    pub fn quote(venue: impl Into<String>, reason: impl ToString) -> Self {
        Self::Quote {
            venue: venue.into(),
            reason: reason.to_string(),
        }
    }

    pub fn build(venue: impl Into<String>, reason: impl ToString) -> Self {
        Self::Build {
            venue: venue.into(),
            reason: reason.to_string(),
        }
    }
}

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, warn};

use crate::monitoring::events;
use crate::venue::{RouteData, RouteRequest, VenueAdapter, VenueError};

/// 单个 venue 报价未产出路由的原因。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VenueQuoteFailure {
    NoRoute,
    Failed(String),
    TimedOut(Duration),
}

impl VenueQuoteFailure {
    pub fn label(&self) -> &'static str {
        match self {
            VenueQuoteFailure::NoRoute => "no_route",
            VenueQuoteFailure::Failed(_) => "failed",
            VenueQuoteFailure::TimedOut(_) => "timeout",
        }
    }
}

impl fmt::Display for VenueQuoteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VenueQuoteFailure::NoRoute => f.write_str("no route"),
            VenueQuoteFailure::Failed(reason) => write!(f, "failed: {reason}"),
            VenueQuoteFailure::TimedOut(elapsed) => write!(f, "timed out after {elapsed:?}"),
        }
    }
}

/// 某个 venue 的报价结果；失败的 venue 也保留，便于诊断。
#[derive(Debug, Clone)]
pub struct VenueRoute {
    pub venue: Arc<dyn VenueAdapter>,
    pub route: Option<RouteData>,
    pub failure: Option<VenueQuoteFailure>,
    pub elapsed: Duration,
}

impl VenueRoute {
    pub fn output_amount(&self) -> u64 {
        self.route
            .as_ref()
            .map(|route| route.output_amount)
            .unwrap_or_default()
    }
}

/// 按完成顺序记录的产出金额，失败的 venue 记为 0。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VenueOutput {
    pub venue: String,
    pub output_amount: u64,
}

/// 询价结果。`completed` 按完成顺序保存每一次询价，按名字查询时同名取最后完成者。
#[derive(Debug, Clone, Default)]
pub struct RouteMaps {
    completed: Vec<VenueRoute>,
    by_venue: HashMap<String, usize>,
}

impl RouteMaps {
    pub fn routes_by_venue(&self) -> HashMap<&str, &VenueRoute> {
        self.by_venue
            .iter()
            .map(|(name, idx)| (name.as_str(), &self.completed[*idx]))
            .collect()
    }

    pub fn route(&self, venue: &str) -> Option<&VenueRoute> {
        self.by_venue.get(venue).map(|idx| &self.completed[*idx])
    }

    pub fn completed(&self) -> &[VenueRoute] {
        &self.completed
    }

    /// 完成顺序即插入顺序。
    pub fn outputs(&self) -> Vec<VenueOutput> {
        self.completed
            .iter()
            .map(|entry| VenueOutput {
                venue: entry.venue.provider_name().to_string(),
                output_amount: entry.output_amount(),
            })
            .collect()
    }

    pub fn queried(&self) -> usize {
        self.completed.len()
    }

    /// 产出最大的非空路由。
    ///
    /// 产出相同时先完成者胜出；并发完成顺序不确定，因此平局结果也不确定。
    pub fn best(&self) -> Option<(&VenueRoute, &RouteData)> {
        let mut best: Option<(&VenueRoute, &RouteData)> = None;
        for entry in &self.completed {
            let Some(route) = entry.route.as_ref() else {
                continue;
            };
            let replace = match best {
                Some((_, current)) => route.output_amount > current.output_amount,
                None => true,
            };
            if replace {
                best = Some((entry, route));
            }
        }
        best
    }

    fn record(&mut self, name: String, entry: VenueRoute) {
        self.by_venue.insert(name, self.completed.len());
        self.completed.push(entry);
    }
}

/// 并发向所有候选 venue 询价，单个 venue 的失败不影响其它 venue。
#[derive(Debug, Clone, Default)]
pub struct RouteAggregator {
    venue_timeout: Option<Duration>,
}

impl RouteAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_venue_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.venue_timeout = timeout;
        self
    }

    pub fn venue_timeout(&self) -> Option<Duration> {
        self.venue_timeout
    }

    /// 所有 venue 都完成（或失败、超时）后才返回，不做重试。
    pub async fn routes(
        &self,
        venues: &[Arc<dyn VenueAdapter>],
        request: &RouteRequest,
    ) -> RouteMaps {
        let mut pending: FuturesUnordered<_> = venues
            .iter()
            .map(|venue| self.quote_venue(Arc::clone(venue), request))
            .collect();

        let mut maps = RouteMaps::default();
        while let Some(entry) = pending.next().await {
            let name = entry.venue.provider_name().to_string();
            events::venue_quote(
                &name,
                entry.output_amount(),
                entry.failure.as_ref(),
                entry.elapsed,
            );
            maps.record(name, entry);
        }

        debug!(
            target: "engine::aggregator",
            queried = maps.queried(),
            with_route = maps
                .completed
                .iter()
                .filter(|entry| entry.route.is_some())
                .count(),
            "venue 询价完成"
        );
        maps
    }

    async fn quote_venue(&self, venue: Arc<dyn VenueAdapter>, request: &RouteRequest) -> VenueRoute {
        let started = Instant::now();
        let result = match self.venue_timeout {
            Some(limit) => match tokio::time::timeout(limit, venue.route_data(request)).await {
                Ok(result) => result,
                Err(_) => Err(VenueError::Timeout {
                    venue: venue.provider_name().to_string(),
                    elapsed: started.elapsed(),
                }),
            },
            None => venue.route_data(request).await,
        };
        let elapsed = started.elapsed();

        let (route, failure) = match result {
            Ok(Some(route)) => (Some(route), None),
            Ok(None) => (None, Some(VenueQuoteFailure::NoRoute)),
            Err(VenueError::Timeout { elapsed, .. }) => {
                warn!(
                    target: "engine::aggregator",
                    venue = venue.provider_name(),
                    ?elapsed,
                    "venue 报价超时"
                );
                (None, Some(VenueQuoteFailure::TimedOut(elapsed)))
            }
            Err(err) => {
                warn!(
                    target: "engine::aggregator",
                    venue = venue.provider_name(),
                    error = %err,
                    "venue 报价失败"
                );
                (None, Some(VenueQuoteFailure::Failed(err.to_string())))
            }
        };

        VenueRoute {
            venue,
            route,
            failure,
            elapsed,
        }
    }
}

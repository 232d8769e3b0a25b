use std::time::Duration;

use viewboard_core::analytics::AnalyticsData;
use viewboard_core::filter::QueryKey;

use crate::error::FetchError;

/// Result of one successful request to the analytics endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedAnalytics {
    pub data: AnalyticsData,
    /// Freshness hint from the response's `Cache-Control` header.
    pub max_age: Option<Duration>,
}

impl From<AnalyticsData> for FetchedAnalytics {
    fn from(data: AnalyticsData) -> Self {
        Self {
            data,
            max_age: None,
        }
    }
}

/// Source of analytics data for a committed filter set.
///
/// One call is one attempt; retries are the cache's job.
#[async_trait::async_trait]
pub trait AnalyticsFetcher: Send + Sync + 'static {
    async fn fetch(&self, key: &QueryKey) -> Result<FetchedAnalytics, FetchError>;
}

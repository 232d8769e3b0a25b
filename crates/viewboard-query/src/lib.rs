pub mod cache;
pub mod error;
pub mod fetcher;
pub mod http;
pub mod options;

pub use cache::{QueryCache, QueryCacheEntry, QuerySnapshot, QueryStatus, QuerySubscription};
pub use error::FetchError;
pub use fetcher::{AnalyticsFetcher, FetchedAnalytics};
pub use http::HttpAnalyticsFetcher;
pub use options::QueryOptions;

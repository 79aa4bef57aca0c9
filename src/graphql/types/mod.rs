pub mod analytics;
pub mod gym;
pub mod search;

pub use analytics::{GymAnalytics, MarketGap};
pub use gym::Gym;
pub use search::{ProviderCount, SearchFiltersInput, SearchProgressEvent, SearchResult};

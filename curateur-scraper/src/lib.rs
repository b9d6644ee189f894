pub mod cache;
pub mod client;
pub mod error;
pub mod media;
pub mod quota;
pub mod scorer;
pub mod throttle;
pub mod types;

pub use cache::ResponseCache;
pub use client::{Credentials, LookupIdentity, ProviderClient};
pub use error::{ErrorKind, ScrapeError};
pub use media::{MediaFetcher, MediaKind, MediaValidation};
pub use quota::QuotaLedger;
pub use scorer::{confidence, select_candidate, verify_name, Selection};
pub use throttle::{Endpoint, RateLimit, Throttle, ThrottleStats};
pub use types::{GameRecord, MediaItem, RegionText, UserInfo, UserQuota};

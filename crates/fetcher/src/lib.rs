pub mod fetch;
pub mod politeness;
pub mod robots;

pub use fetch::{binary_type_tag, sha256_hex, FetchOutcome, Fetcher};
pub use politeness::PolitenessScheduler;
pub use robots::{HostRecord, RobotsRegistry, DEFAULT_USER_AGENT};

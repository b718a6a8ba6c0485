pub mod anchors;
pub mod bookkeeping;
pub mod engine;
pub mod fetch;
pub mod outcome;
pub mod rss;

pub use engine::{DiscoveryEngine, DiscoverySummary};

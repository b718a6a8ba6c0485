//! Extraction worker pool (spec §4.F): pulls claimed candidates and turns
//! them into persisted articles via a chain of extraction methods.

pub mod backoff;
pub mod captcha;
pub mod coordinator_client;
pub mod methods;
pub mod worker;

pub use coordinator_client::CoordinatorClient;
pub use methods::{ExtractedContent, ExtractionMethod};
pub use worker::{BatchReport, ExtractionWorker};

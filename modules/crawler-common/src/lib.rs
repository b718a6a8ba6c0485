pub mod config;
pub mod error;
pub mod types;
pub mod url_shape;

pub use config::Config;
pub use error::CrawlerError;
pub use types::*;
pub use url_shape::{url_shape_score, ARTICLE_SHAPE_THRESHOLD};

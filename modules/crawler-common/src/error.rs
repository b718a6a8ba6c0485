use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrawlerError {
    #[error("store error: {0}")]
    Store(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("rate limited or bot-protected: {0}")]
    RateLimited(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("upstream network error: {0}")]
    Network(String),

    #[error("upstream request timed out")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, Error>;

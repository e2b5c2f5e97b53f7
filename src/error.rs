use thiserror::Error;

type BoxedError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum WindowError {
    #[error("message source error: {0}")]
    Source(#[from] BoxedError),

    #[error("window sink error: {0}")]
    Sink(BoxedError),
}

impl WindowError {
    pub fn source(err: impl Into<BoxedError>) -> Self {
        Self::Source(err.into())
    }

    pub fn sink(err: impl Into<BoxedError>) -> Self {
        Self::Sink(err.into())
    }
}

pub type Result<T> = std::result::Result<T, WindowError>;

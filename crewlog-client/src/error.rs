use crate::api::Error as ApiError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Rejected locally before any network call, or answered with a failure envelope
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The request could not be performed or its answer could not be read
    #[error("transport error: {0:#}")]
    Transport(#[from] anyhow::Error),

    #[error("comment thread is not mounted")]
    NotMounted,
}

impl Error {
    pub fn api(&self) -> Option<&ApiError> {
        match self {
            Error::Api(e) => Some(e),
            _ => None,
        }
    }
}

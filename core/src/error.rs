use crate::client::ApiError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashError {
    #[error("Remote call failed for {resource}: {source}")]
    Api {
        resource: &'static str,
        #[source]
        source: ApiError,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type DashResult<T> = Result<T, DashError>;

use thiserror::Error;

/// Failures surfaced by the fetch-load pipeline and the query dispatcher.
///
/// Missing data is not represented here; see `FetchLoadOutcome::NoData`.
#[derive(Debug, Error)]
pub enum EtlError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("storage failure: {0:#}")]
    Storage(anyhow::Error),
}

impl EtlError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

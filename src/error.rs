use thiserror::Error;

/// Errors raised while configuring or constructing a scheme.
///
/// The streaming path (`count`, `flush`, `rebuild`) never fails; anything that
/// goes wrong there is resolved by eviction or dropping and shows up in
/// [`SchemeStats`](crate::scheme::SchemeStats).
#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("unknown algorithm '{0}' (expected wavesketch, fourier, omniwindow or persistcms)")]
    UnknownAlgorithm(String),

    #[error("memory budget of {budget} bytes cannot hold {needed} bytes for a single light column")]
    BudgetTooSmall { budget: usize, needed: usize },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}

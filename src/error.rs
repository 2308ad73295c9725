use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphmasterError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Structural error: {0}")]
    Structure(String),
    #[error("Timeout after {elapsed_ms} ms")]
    Timeout { elapsed_ms: u128 },
    #[error("Recursion limit of {limit} exceeded")]
    RecursionLimit { limit: usize },
    #[error("Loop limit of {limit} iterations exceeded")]
    LoopLimit { limit: usize },
    #[error("Internal invariant violated: {0}")]
    Invariant(String),
    #[error("Lock poisoned: {0}")]
    Lock(String),
}

impl GraphmasterError {
    /// The ceilings that degrade a single sentence to a configured message
    /// instead of failing the request.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::RecursionLimit { .. } | Self::LoopLimit { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, GraphmasterError>;

// Helper conversions
impl From<config::ConfigError> for GraphmasterError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
impl From<std::io::Error> for GraphmasterError {
    fn from(e: std::io::Error) -> Self { Self::Persistence(e.to_string()) }
}
impl From<regex::Error> for GraphmasterError {
    fn from(e: regex::Error) -> Self { Self::Config(e.to_string()) }
}
impl<T> From<std::sync::PoisonError<T>> for GraphmasterError {
    fn from(e: std::sync::PoisonError<T>) -> Self { Self::Lock(e.to_string()) }
}

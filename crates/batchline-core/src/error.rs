//! Error types for batcher construction

/// Invalid batcher configuration, reported at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Batch size of 0
    ZeroCapacity,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroCapacity => write!(f, "batch size must be at least 1"),
        }
    }
}

impl std::error::Error for ConfigError {}

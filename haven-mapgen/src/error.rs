use crate::terrain::MAX_MAP_SIZE;

/// Rejected terrain configuration. Generation never starts with one of these.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("map size must be between 1 and {max}, got {size}", max = MAX_MAP_SIZE)]
    InvalidMapSize { size: i32 },

    #[error("noise scale must be finite and non-zero, got {0}")]
    InvalidNoiseScale(f64),

    #[error("water threshold must be finite, got {0}")]
    InvalidWaterThreshold(f64),

    #[error("{field} must be within [0, 1], got {value}")]
    ProbabilityOutOfRange { field: &'static str, value: f64 },

    #[error("{name} rectangle has negative extent ({w}x{h})")]
    InvalidRect { name: &'static str, w: i32, h: i32 },
}

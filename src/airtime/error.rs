use thiserror::Error;

/// Reasons an airtime cannot be computed for a given configuration.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AirtimeError {
    /// Spreading factor outside SF7..SF12
    #[error("Wrong spreading factor {0} (expected 7..=12)")]
    InvalidSpreadingFactor(u8),
    /// Coding rate outside 1..4 (4/5..4/8)
    #[error("Wrong coding rate {0} (expected 1..=4)")]
    InvalidCodingRate(u8),
    /// Symbol duration is undefined without a bandwidth
    #[error("Bandwidth must be non-zero")]
    ZeroBandwidth,
}

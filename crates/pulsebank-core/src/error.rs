//! Error types for pulsebank.
//!
//! Only the non-realtime side can fail. The audio path clamps or ignores
//! out-of-range input instead of returning errors.

use thiserror::Error;

/// Result type alias for pulsebank operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur outside the realtime path
#[derive(Debug, Error)]
pub enum Error {
    /// The realtime side of a split engine has been dropped
    #[error("Realtime sequencer disconnected")]
    Disconnected,

    /// A snapshot could not be restored
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

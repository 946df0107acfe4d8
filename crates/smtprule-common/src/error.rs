//! Error types for smtprule

use thiserror::Error;

/// Main error type for smtprule
///
/// Matching never produces an `Error`; a failed lookup is an outcome of the
/// match itself. This type covers building and loading configuration.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration could not be read or parsed, or names something unknown
    #[error("Configuration error: {0}")]
    Config(String),

    /// A rule is well-formed TOML but not a valid rule
    #[error("Validation error: {0}")]
    Validation(String),

    /// A table could not be built or registered
    #[error("Table error: {0}")]
    Table(String),
}

/// Result type alias for smtprule
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::Table(_) => "TABLE_ERROR",
        }
    }
}

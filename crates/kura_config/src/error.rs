//! Error types for configuration loading and validation.

/// Errors that can occur when loading or validating a `kura.toml` configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the configuration file.
    #[error("failed to read configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// A backend name is not one of the known storage backends.
    #[error("unknown storage backend '{0}'")]
    UnknownBackend(String),

    /// An environment override carried a value that could not be interpreted.
    #[error("invalid value '{value}' for {name}")]
    InvalidEnv {
        /// The environment variable name.
        name: String,
        /// The rejected value.
        value: String,
    },

    /// A configuration value failed validation.
    #[error("validation error: {0}")]
    ValidationError(String),
}

//! CLI error types

use stashpass_core::StashError;
use thiserror::Error;

/// Process exit code for a write that was submitted but never became visible.
pub const EXIT_UNCONFIRMED: u8 = 3;

#[derive(Debug, Error)]
pub enum CliError {
    /// Lifecycle failure reported by the core
    #[error(transparent)]
    Stash(#[from] StashError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl CliError {
    /// Hint printed under the error, when there is an obvious next step.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Stash(StashError::AlreadyCollected { .. }) => {
                Some("this booth's badge is already on the ticket")
            }
            Self::Stash(StashError::Unauthorized { .. }) => {
                Some("the signer must hold the object; check `stashpass whoami`")
            }
            Self::Stash(StashError::Guard { .. }) => Some("nothing was submitted"),
            Self::Stash(StashError::Config(_)) | Self::Config(_) => {
                Some("set SUI_PACKAGE_ID / SUI_PRIVATE_KEY or pass --package-id / --private-key")
            }
            _ => None,
        }
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hints_point_at_the_next_step() {
        let stamped = CliError::from(StashError::AlreadyCollected {
            booth: "0xb1".parse().unwrap(),
            ticket: "0x71".parse().unwrap(),
        });
        assert!(stamped.hint().unwrap().contains("already on the ticket"));
        assert!(CliError::Config("missing".into()).hint().is_some());
        assert!(CliError::InvalidInput("bad".into()).hint().is_none());
    }
}

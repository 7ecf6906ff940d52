use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const TOKEN_ENV_VAR: &str = "DISCORD_BOT_TOKEN";
pub const CONFIG_ENV_VAR: &str = "BOT_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/bot.toml";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(
        "Environment variable DISCORD_BOT_TOKEN is not set. Set it to your bot token before running the bot."
    )]
    MissingToken,

    #[error("could not read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Tunables read from `config/bot.toml` (or the file named by `BOT_CONFIG`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Pause between member moves, to stay under Discord's rate limits.
    pub move_delay_ms: u64,
    /// Whether `/random_winner` counts bots when the option is left out.
    pub include_bots_by_default: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            move_delay_ms: 500,
            include_bots_by_default: false,
        }
    }
}

impl BotConfig {
    /// Load the config file; a missing file means defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from `BOT_CONFIG`, falling back to `config/bot.toml`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_ENV_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_file(path)
    }

    pub fn move_delay(&self) -> Duration {
        Duration::from_millis(self.move_delay_ms)
    }
}

/// The bot token, from the environment.
pub fn token() -> Result<String, ConfigError> {
    std::env::var(TOKEN_ENV_VAR)
        .ok()
        .filter(|t| !t.trim().is_empty())
        .ok_or(ConfigError::MissingToken)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = BotConfig::load_from_file(dir.path().join("bot.toml")).unwrap();
        assert_eq!(config, BotConfig::default());
        assert_eq!(config.move_delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "move_delay_ms = 250").unwrap();

        let config = BotConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.move_delay_ms, 250);
        assert!(!config.include_bots_by_default);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "move_delay_ms = \"soon\"").unwrap();

        let result = BotConfig::load_from_file(file.path());
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }
}

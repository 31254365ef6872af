// Configuration management module
// TOML settings for the embedding model, the chat model and search behavior

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, HOME_ENV_VAR, LlmConfig, OllamaConfig, SearchConfig,
};

/// Get the data directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::default_dir()
}

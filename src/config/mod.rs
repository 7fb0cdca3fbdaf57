// Configuration management module
// TOML-backed settings for the model endpoints, chunking, generation and retrieval

pub mod interactive;
pub mod settings;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, GenerationConfig, HostedIndexConfig, MAX_SOURCES_LIMIT, ModelCallConfig,
    OllamaConfig, RetrievalBackend, RetrievalConfig, validate_max_sources,
};

/// Load configuration from the resolved directory
#[inline]
pub fn load_config(override_dir: Option<&std::path::Path>) -> anyhow::Result<Config> {
    let dir = Config::resolve_dir(override_dir)?;
    Config::load(dir)
}

use crate::error::{AutocutError, Result};
use crate::timeline::overlay::SafeZone;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which external API a pipeline step is about to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiUse {
    Transcription,
    Suggestions,
    Images,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub elevenlabs_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,
    /// OpenRouter model for edit suggestions.
    pub suggestion_model: String,
    /// OpenRouter model for overlay image generation.
    pub image_model: String,
    /// Concurrent image generation requests.
    pub concurrency: usize,
    /// Root folder holding one subfolder per video project.
    pub assets_dir: PathBuf,
    /// Default overlay safe zone; per-image overrides win.
    pub safe_zone: SafeZone,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            elevenlabs_api_key: None,
            openrouter_api_key: None,
            suggestion_model: "google/gemini-2.5-flash".to_string(),
            image_model: "google/gemini-2.5-flash-image".to_string(),
            concurrency: 4,
            assets_dir: PathBuf::from("assets"),
            safe_zone: SafeZone::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        // Load from config file if it exists
        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                let contents = std::fs::read_to_string(&config_path)?;
                if let Ok(file_config) = toml::from_str::<Config>(&contents) {
                    config = file_config;
                }
            }
        }

        // Override with environment variables
        if let Ok(key) = std::env::var("ELEVENLABS_API_KEY") {
            config.elevenlabs_api_key = Some(key);
        }
        if let Ok(key) = std::env::var("OPENROUTER_API_KEY") {
            config.openrouter_api_key = Some(key);
        }
        if let Ok(model) = std::env::var("AUTOCUT_SUGGESTION_MODEL") {
            config.suggestion_model = model;
        }
        if let Ok(model) = std::env::var("AUTOCUT_IMAGE_MODEL") {
            config.image_model = model;
        }
        if let Ok(concurrency) = std::env::var("AUTOCUT_CONCURRENCY") {
            if let Ok(c) = concurrency.parse() {
                config.concurrency = c;
            }
        }
        if let Ok(dir) = std::env::var("AUTOCUT_ASSETS_DIR") {
            config.assets_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    pub fn validate(&self, usage: ApiUse) -> Result<()> {
        match usage {
            ApiUse::Transcription => {
                if self.elevenlabs_api_key.is_none() {
                    return Err(AutocutError::Config(
                        "ELEVENLABS_API_KEY not set. Export it with: export ELEVENLABS_API_KEY=..."
                            .to_string(),
                    ));
                }
            }
            ApiUse::Suggestions | ApiUse::Images => {
                if self.openrouter_api_key.is_none() {
                    return Err(AutocutError::Config(
                        "OPENROUTER_API_KEY not set. Get one at https://openrouter.ai/keys"
                            .to_string(),
                    ));
                }
            }
        }

        if self.concurrency == 0 {
            return Err(AutocutError::Config(
                "Concurrency must be greater than 0".to_string(),
            ));
        }

        self.safe_zone.validate()
    }

    fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("autocut").join("config.toml"))
    }
}

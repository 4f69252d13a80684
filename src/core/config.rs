use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::services::drive::DriveConfig;
use crate::services::gemini::GeminiConfig;

pub const CONFIG_FILE: &str = "config.yml";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_output")]
    pub output_folder: String,

    #[serde(default = "default_build")]
    pub build_folder: String,

    #[serde(default)]
    pub gemini: GeminiConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    pub drive: Option<DriveConfig>,

    /// Program (plus arguments) that opens an image file passed as last argument.
    pub image_viewer_command: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AudioConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_female_voice")]
    pub female_voice: String,
    #[serde(default = "default_male_voice")]
    pub male_voice: String,
    /// Program (plus arguments) that plays a WAV file passed as last argument.
    pub player_command: Option<String>,
    #[serde(default = "default_download_stagger_ms")]
    pub download_stagger_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            female_voice: default_female_voice(),
            male_voice: default_male_voice(),
            player_command: None,
            download_stagger_ms: default_download_stagger_ms(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_folder: default_output(),
            build_folder: default_build(),
            gemini: GeminiConfig::default(),
            audio: AudioConfig::default(),
            drive: None,
            image_viewer_command: None,
        }
    }
}

fn default_output() -> String {
    "output".to_string()
}
fn default_build() -> String {
    "build".to_string()
}
fn default_sample_rate() -> u32 {
    crate::utils::audio::DEFAULT_SAMPLE_RATE
}
fn default_female_voice() -> String {
    "Kore".to_string()
}
fn default_male_voice() -> String {
    "Zephyr".to_string()
}
fn default_download_stagger_ms() -> u64 {
    300
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("{} not found. Please create one.", path.display());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut config: Config = serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.apply_env();
        Ok(config)
    }

    /// Fills an empty API key from `GEMINI_API_KEY` or `API_KEY`.
    fn apply_env(&mut self) {
        if self.gemini.api_key.trim().is_empty() {
            if let Some(key) = ["GEMINI_API_KEY", "API_KEY"]
                .iter()
                .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
            {
                self.gemini.api_key = key;
            }
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(Path::new(CONFIG_FILE))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_yaml_ng::to_string(self)?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.output_folder)?;
        fs::create_dir_all(&self.build_folder)?;
        Ok(())
    }
}

use crate::core::config::Config;
use crate::core::history::SessionHistory;
use crate::core::io::Storage;
use crate::core::state::{GenerationResult, GenerationState, Persona};
use crate::services::drive::DriveClient;
use crate::services::export::{collect_assets, download_all};
use crate::services::generation::Generator;
use crate::services::gemini::GenerativeClient;
use crate::services::oauth;
use crate::services::playback::Player;
use crate::services::viewer::Viewer;
use crate::utils::audio::AudioBuffer;
use crate::utils::media::InlineMedia;
use anyhow::{anyhow, Context, Result};
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Everything one studio session holds: the persona form, the script, the
/// generation state and the results produced so far.
pub struct Studio {
    config: Config,
    generator: Generator,
    storage: Arc<dyn Storage>,
    player: Player,
    viewer: Viewer,
    pub persona: Persona,
    pub script: String,
    state: GenerationState,
    history: SessionHistory,
    drive_token: Option<String>,
}

impl Studio {
    pub fn new(config: Config, client: Arc<dyn GenerativeClient>, storage: Arc<dyn Storage>) -> Self {
        let generator = Generator::new(client, config.audio.clone());
        let player = Player::new(
            config.audio.player_command.as_deref(),
            config.audio.sample_rate,
            &config.build_folder,
        );
        let viewer = Viewer::new(config.image_viewer_command.as_deref(), &config.build_folder);
        Self {
            config,
            generator,
            storage,
            player,
            viewer,
            persona: Persona::default(),
            script: String::new(),
            state: GenerationState::Idle,
            history: SessionHistory::new(),
            drive_token: None,
        }
    }

    pub fn state(&self) -> GenerationState {
        self.state
    }

    pub fn history(&self) -> &SessionHistory {
        &self.history
    }

    pub fn current(&self) -> Option<&GenerationResult> {
        self.history.active()
    }

    pub fn can_generate(&self) -> bool {
        !self.persona.name.trim().is_empty()
            && !self.script.trim().is_empty()
            && !self.state.is_loading()
    }

    /// Runs one generation for the current form. Returns `Ok(None)` when the
    /// form is not ready. On failure history is left as it was.
    pub async fn generate(&mut self) -> Result<Option<i64>> {
        if !self.can_generate() {
            return Ok(None);
        }

        self.state = GenerationState::Generating;
        match self.generator.generate(&self.persona, &self.script).await {
            Ok(result) => {
                let id = result.id;
                self.history.push(result);
                self.state = GenerationState::Success;
                Ok(Some(id))
            }
            Err(e) => {
                error!("Generation failed: {:#}", e);
                self.state = GenerationState::Error;
                Err(e.context("Generation was not successful"))
            }
        }
    }

    /// Activates a past result and restores the form from its snapshot.
    pub fn select(&mut self, id: i64) -> bool {
        match self.history.select(id) {
            Some(persona) => {
                self.persona = persona.clone();
                true
            }
            None => false,
        }
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        info!("Session history cleared");
    }

    /// `source` is a file path or a `data:` URL.
    pub async fn set_reference_image(&mut self, source: &str) -> Result<()> {
        let media = InlineMedia::from_source(source).await?;
        if !media.is_image() {
            return Err(anyhow!("{} is not an image", media.mime_type));
        }
        self.persona.reference_image = Some(media);
        Ok(())
    }

    pub async fn set_reference_audio(&mut self, source: &str) -> Result<()> {
        let media = InlineMedia::from_source(source).await?;
        if !media.is_audio() {
            return Err(anyhow!("{} is not audio", media.mime_type));
        }
        self.persona.reference_audio = Some(media);
        Ok(())
    }

    fn current_or_err(&self) -> Result<&GenerationResult> {
        self.current().ok_or_else(|| anyhow!("No result selected"))
    }

    pub async fn play_current(&self) -> Result<AudioBuffer> {
        let audio = self
            .current_or_err()?
            .audio_base64
            .as_deref()
            .ok_or_else(|| anyhow!("This result has no voice clip"))?;
        self.player.play(audio).await
    }

    pub async fn stop_playback(&self) {
        self.player.stop().await;
    }

    /// Opens image `index` (zero-based) of the active result.
    pub async fn view_image(&self, index: usize) -> Result<PathBuf> {
        let result = self.current_or_err()?;
        let image = result
            .images
            .get(index)
            .ok_or_else(|| anyhow!("Result has {} images, no image {}", result.images.len(), index + 1))?;
        self.viewer.show(image).await
    }

    pub async fn close_windows(&self) {
        self.player.stop().await;
        self.viewer.close().await;
    }

    pub async fn download_current(&self) -> Result<Vec<String>> {
        let result = self.current_or_err()?;
        download_all(
            result,
            self.storage.as_ref(),
            &self.config.output_folder,
            self.config.audio.sample_rate,
            Duration::from_millis(self.config.audio.download_stagger_ms),
        )
        .await
    }

    /// Uploads the active result to Drive, authorizing first if this session
    /// has no token yet.
    pub async fn upload_current(&mut self) -> Result<Vec<String>> {
        let drive_cfg = self
            .config
            .drive
            .clone()
            .ok_or_else(|| anyhow!("Google Drive is not configured (drive.client_id)"))?;
        let assets = collect_assets(self.current_or_err()?, self.config.audio.sample_rate)?;

        let token = match &self.drive_token {
            Some(token) => token.clone(),
            None => {
                let token = oauth::obtain_access_token(&drive_cfg).await?;
                self.drive_token = Some(token.clone());
                token
            }
        };

        let client = DriveClient::new(&drive_cfg.api_base, token);
        client
            .upload_assets(&drive_cfg.folder_name, assets)
            .await
            .context("Upload to Google Drive failed")
    }

    #[cfg(test)]
    pub(crate) fn set_drive_token(&mut self, token: &str) {
        self.drive_token = Some(token.to_string());
    }
}

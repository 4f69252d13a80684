use anyhow::Result;
use character_studio::core::config::Config;
use character_studio::core::io::NativeStorage;
use character_studio::services::gemini::GeminiClient;
use character_studio::services::setup;
use character_studio::services::studio::Studio;
use character_studio::ui;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let mut config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            eprintln!("Please ensure 'config.yml' exists with a gemini section.");
            return Err(e);
        }
    };

    config.ensure_directories()?;

    setup::run_setup(&mut config)?;

    let client = GeminiClient::new(config.gemini.clone())?;
    let mut studio = Studio::new(config, Arc::new(client), Arc::new(NativeStorage::new()));
    ui::run(&mut studio).await?;

    Ok(())
}

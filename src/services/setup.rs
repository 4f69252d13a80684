use crate::core::config::Config;
use anyhow::Result;
use inquire::{Confirm, Password, PasswordDisplayMode, Text};

/// Asks for whatever the studio cannot run without and offers to persist it.
pub fn run_setup(config: &mut Config) -> Result<()> {
    let mut needs_save = false;

    if config.gemini.api_key.trim().is_empty() {
        println!("No Gemini API key found in config.yml or GEMINI_API_KEY.");
        let key = Password::new("Gemini API key:")
            .with_display_mode(PasswordDisplayMode::Masked)
            .without_confirmation()
            .prompt()?;
        config.gemini.api_key = key.trim().to_string();
        needs_save = true;
    }

    if config.audio.player_command.is_none() {
        let command = Text::new("Audio player command (leave empty to skip playback):")
            .with_placeholder("aplay -q")
            .prompt()?;
        if !command.trim().is_empty() {
            config.audio.player_command = Some(command.trim().to_string());
            needs_save = true;
        }
    }

    if needs_save
        && Confirm::new("Save these settings to config.yml?")
            .with_default(true)
            .prompt()?
    {
        config.save()?;
        println!("Configuration saved.");
    }

    Ok(())
}

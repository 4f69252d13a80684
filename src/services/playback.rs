use crate::utils::audio::{decode_base64, decode_for_playback, AudioBuffer};
use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

/// The single audio output of the studio. Starting a clip stops the one
/// still playing.
#[derive(Debug)]
pub struct Player {
    command: Option<Vec<String>>,
    sample_rate: u32,
    scratch_dir: PathBuf,
    current: Mutex<Option<Child>>,
}

impl Player {
    pub fn new(player_command: Option<&str>, sample_rate: u32, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            command: command_parts(player_command),
            sample_rate,
            scratch_dir: scratch_dir.into(),
            current: Mutex::new(None),
        }
    }

    pub fn decode(&self, audio_base64: &str) -> Result<AudioBuffer> {
        let pcm = decode_base64(audio_base64)?;
        Ok(decode_for_playback(&pcm, self.sample_rate, 1))
    }

    /// Plays a base64 PCM payload and returns the decoded buffer.
    pub async fn play(&self, audio_base64: &str) -> Result<AudioBuffer> {
        let command = self
            .command
            .as_deref()
            .ok_or_else(|| anyhow!("No audio player configured (audio.player_command)"))?;

        let buffer = self.decode(audio_base64)?;

        let mut current = self.current.lock().await;
        release(&mut current).await;

        tokio::fs::create_dir_all(&self.scratch_dir).await?;
        let path = self.scratch_dir.join("playback.wav");
        tokio::fs::write(&path, buffer.to_wav()?)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        *current = Some(spawn_on_file(command, &path)?);

        info!("Playing {:.1}s of audio", buffer.duration().as_secs_f32());
        Ok(buffer)
    }

    pub async fn stop(&self) {
        let mut current = self.current.lock().await;
        release(&mut current).await;
    }

    pub async fn is_playing(&self) -> bool {
        let mut current = self.current.lock().await;
        match current.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }
}

/// Splits a configured command line; blank means not configured.
pub(crate) fn command_parts(command: Option<&str>) -> Option<Vec<String>> {
    command
        .map(|c| c.split_whitespace().map(str::to_string).collect::<Vec<_>>())
        .filter(|parts| !parts.is_empty())
}

/// Starts `command` with `path` appended as its last argument.
pub(crate) fn spawn_on_file(command: &[String], path: &Path) -> Result<Child> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| anyhow!("Empty command"))?;
    debug!("Starting {} {:?} {}", program, args, path.display());
    Command::new(program)
        .args(args)
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("Failed to start '{}'", program))
}

pub(crate) async fn release(slot: &mut Option<Child>) {
    if let Some(mut child) = slot.take() {
        // Already exited is fine.
        let _ = child.kill().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose, Engine as _};

    fn payload() -> String {
        general_purpose::STANDARD.encode([0u8, 0, 0, 64, 0, 192])
    }

    #[tokio::test]
    async fn test_play_without_command_fails() {
        let dir = tempfile::tempdir().unwrap();
        let player = Player::new(None, 24_000, dir.path());
        assert!(player.play(&payload()).await.is_err());

        let blank = Player::new(Some("   "), 24_000, dir.path());
        assert!(blank.play(&payload()).await.is_err());
    }

    #[tokio::test]
    async fn test_decode_uses_configured_rate() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let player = Player::new(None, 16_000, dir.path());
        let buffer = player.decode(&payload())?;
        assert_eq!(buffer.sample_rate, 16_000);
        assert_eq!(buffer.samples, vec![0.0, 0.5, -0.5]);
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_new_clip_replaces_running_one() -> Result<()> {
        let dir = tempfile::tempdir()?;
        // Stands in for a real player: keeps running until killed.
        let player = Player::new(Some("tail -f"), 24_000, dir.path());
        player.play(&payload()).await?;
        assert!(player.is_playing().await);
        assert!(dir.path().join("playback.wav").exists());

        player.play(&payload()).await?;
        assert!(player.is_playing().await);

        player.stop().await;
        assert!(!player.is_playing().await);
        Ok(())
    }
}

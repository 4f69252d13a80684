use crate::core::io::Storage;
use crate::core::state::GenerationResult;
use crate::utils::audio::base64_pcm_to_wav;
use anyhow::Result;
use log::info;
use std::path::Path;
use std::time::Duration;

/// A file produced from a generation result, ready to save or upload.
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Replaces characters that are unsafe in file names.
pub fn safe_file_stem(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if cleaned.is_empty() {
        "character".to_string()
    } else {
        cleaned
    }
}

/// Images as `{name}_{n}.{ext}` followed by `{name}_voice.wav` when there is audio.
pub fn collect_assets(result: &GenerationResult, sample_rate: u32) -> Result<Vec<Asset>> {
    let stem = safe_file_stem(&result.name);
    let mut assets = Vec::with_capacity(result.images.len() + 1);

    for (i, image) in result.images.iter().enumerate() {
        assets.push(Asset {
            file_name: format!("{}_{}.{}", stem, i + 1, image.extension()),
            mime_type: image.mime_type.clone(),
            bytes: image.decode()?,
        });
    }

    if let Some(audio) = &result.audio_base64 {
        assets.push(Asset {
            file_name: format!("{}_voice.wav", stem),
            mime_type: "audio/wav".to_string(),
            bytes: base64_pcm_to_wav(audio, sample_rate)?,
        });
    }

    Ok(assets)
}

/// Saves every asset of a result under `folder`, pausing `stagger` between files.
pub async fn download_all(
    result: &GenerationResult,
    storage: &dyn Storage,
    folder: &str,
    sample_rate: u32,
    stagger: Duration,
) -> Result<Vec<String>> {
    let assets = collect_assets(result, sample_rate)?;
    let mut written = Vec::with_capacity(assets.len());

    for (i, asset) in assets.iter().enumerate() {
        if i > 0 && !stagger.is_zero() {
            tokio::time::sleep(stagger).await;
        }
        let path = Path::new(folder).join(&asset.file_name);
        let path = path.to_string_lossy().to_string();
        storage.write(&path, &asset.bytes).await?;
        info!("Saved {}", path);
        written.push(path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::NativeStorage;
    use crate::core::state::Persona;
    use crate::utils::audio::parse_wav;
    use crate::utils::media::InlineMedia;

    fn sample_result(audio: Option<&str>) -> GenerationResult {
        GenerationResult {
            id: 1,
            name: "Ana/Clara".to_string(),
            date: "10:00:00".to_string(),
            images: vec![
                InlineMedia::from_bytes("image/png", b"png-1"),
                InlineMedia::from_bytes("image/jpeg", b"jpg-2"),
            ],
            audio_base64: audio.map(str::to_string),
            used_prompt: "prompt".to_string(),
            persona: Persona::default(),
        }
    }

    #[test]
    fn test_safe_file_stem() {
        assert_eq!(safe_file_stem("Ana Clara"), "Ana Clara");
        assert_eq!(safe_file_stem("a/b:c?"), "a_b_c_");
        assert_eq!(safe_file_stem("   "), "character");
    }

    #[test]
    fn test_collect_assets_names_and_wav() -> Result<()> {
        let assets = collect_assets(&sample_result(Some("AAABAAIA")), 24_000)?;
        let names: Vec<&str> = assets.iter().map(|a| a.file_name.as_str()).collect();
        assert_eq!(names, vec!["Ana_Clara_1.png", "Ana_Clara_2.jpg", "Ana_Clara_voice.wav"]);
        assert_eq!(assets[0].bytes, b"png-1");

        let wav = &assets[2].bytes;
        let info = parse_wav(wav)?;
        assert_eq!(info.data_size, 6);
        assert_eq!(wav.len(), 44 + 6);
        assert_eq!(info.byte_rate, 48_000);
        Ok(())
    }

    #[test]
    fn test_collect_assets_without_audio() -> Result<()> {
        let assets = collect_assets(&sample_result(None), 24_000)?;
        assert_eq!(assets.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_download_all_writes_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let folder = dir.path().join("out").to_string_lossy().to_string();
        let storage = NativeStorage::new();

        let written = download_all(
            &sample_result(Some("AAABAAIA")),
            &storage,
            &folder,
            24_000,
            Duration::from_millis(5),
        )
        .await?;

        assert_eq!(written.len(), 3);
        assert_eq!(std::fs::read_dir(&folder)?.count(), 3);
        assert_eq!(std::fs::read(&written[1])?, b"jpg-2");
        Ok(())
    }
}

use crate::core::config::AudioConfig;
use crate::core::state::{GenerationResult, Persona};
use crate::services::gemini::{GenerativeClient, SpeechRequest};
use crate::services::prompt::{
    build_image_prompt, clone_instruction, fallback_voice, prebuilt_instruction, shot_prompt,
    SHOT_VARIATIONS,
};
use crate::utils::media::InlineMedia;
use anyhow::{Context, Result};
use futures_util::future::try_join_all;
use log::{info, warn};
use std::sync::Arc;

/// Runs one generation: three portraits in parallel, then the voice clip.
pub struct Generator {
    client: Arc<dyn GenerativeClient>,
    audio: AudioConfig,
}

impl Generator {
    pub fn new(client: Arc<dyn GenerativeClient>, audio: AudioConfig) -> Self {
        Self { client, audio }
    }

    pub async fn generate(&self, persona: &Persona, script: &str) -> Result<GenerationResult> {
        info!("Generating character '{}'", persona.name);
        let (images, prompt) = self.generate_images(persona).await?;
        let audio_base64 = self.generate_voice(persona, script).await?;

        let now = chrono::Local::now();
        info!(
            "Character '{}' ready: {} images, audio: {}",
            persona.name,
            images.len(),
            audio_base64.is_some()
        );
        Ok(GenerationResult {
            id: now.timestamp_millis(),
            name: persona.name.clone(),
            date: now.format("%H:%M:%S").to_string(),
            images,
            audio_base64,
            used_prompt: prompt,
            persona: persona.clone(),
        })
    }

    /// All shots or nothing.
    pub async fn generate_images(&self, persona: &Persona) -> Result<(Vec<InlineMedia>, String)> {
        let base = build_image_prompt(persona);
        let reference = persona.reference_image.as_ref();

        let requests = SHOT_VARIATIONS.iter().map(|variation| {
            let prompt = shot_prompt(&base, variation);
            let client = &self.client;
            async move {
                client
                    .generate_image(&prompt, reference)
                    .await
                    .with_context(|| format!("Image generation failed for '{}'", variation))
            }
        });

        let images = try_join_all(requests).await?;
        Ok((images, base))
    }

    /// Clones the reference voice when there is one; any failure there drops
    /// to the prebuilt voice for the persona's gender, once.
    pub async fn generate_voice(&self, persona: &Persona, script: &str) -> Result<Option<String>> {
        if let Some(reference) = &persona.reference_audio {
            let request = SpeechRequest::Clone {
                reference: reference.clone(),
                instruction: clone_instruction(persona, script),
            };
            match self.client.generate_speech(&request).await {
                Ok(Some(audio)) => return Ok(Some(audio)),
                Ok(None) => warn!("Voice cloning returned no audio, using prebuilt voice"),
                Err(e) => warn!("Voice cloning failed, using prebuilt voice: {:#}", e),
            }
        }

        let request = SpeechRequest::Prebuilt {
            voice: fallback_voice(persona.gender, &self.audio).to_string(),
            instruction: prebuilt_instruction(persona, script),
        };
        self.client
            .generate_speech(&request)
            .await
            .context("Speech synthesis failed")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::state::Gender;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Scripted client recording what it was asked for.
    #[derive(Debug, Default)]
    pub(crate) struct FakeClient {
        pub fail_images: bool,
        pub fail_clone: bool,
        pub fail_prebuilt: bool,
        pub empty_clone: bool,
        pub empty_prebuilt: bool,
        pub image_prompts: Mutex<Vec<(String, bool)>>,
        pub speech_requests: Mutex<Vec<SpeechRequest>>,
    }

    #[async_trait]
    impl GenerativeClient for FakeClient {
        async fn generate_image(
            &self,
            prompt: &str,
            reference: Option<&InlineMedia>,
        ) -> Result<InlineMedia> {
            self.image_prompts
                .lock()
                .unwrap()
                .push((prompt.to_string(), reference.is_some()));
            if self.fail_images && prompt.ends_with("Medium shot") {
                return Err(anyhow!("quota exceeded"));
            }
            Ok(InlineMedia::new("image/png", "UE5H"))
        }

        async fn generate_speech(&self, request: &SpeechRequest) -> Result<Option<String>> {
            self.speech_requests.lock().unwrap().push(request.clone());
            match request {
                SpeechRequest::Clone { .. } if self.fail_clone => Err(anyhow!("model unavailable")),
                SpeechRequest::Clone { .. } if self.empty_clone => Ok(None),
                SpeechRequest::Clone { .. } => Ok(Some("Q0xPTkU=".to_string())),
                SpeechRequest::Prebuilt { .. } if self.fail_prebuilt => Err(anyhow!("tts down")),
                SpeechRequest::Prebuilt { .. } if self.empty_prebuilt => Ok(None),
                SpeechRequest::Prebuilt { voice, .. } => Ok(Some(format!("voice:{}", voice))),
            }
        }
    }

    fn generator(client: Arc<FakeClient>) -> Generator {
        Generator::new(client, AudioConfig::default())
    }

    #[tokio::test]
    async fn test_generates_three_shots_and_voice() -> Result<()> {
        let client = Arc::new(FakeClient::default());
        let persona = Persona::default();

        let result = generator(client.clone()).generate(&persona, "Olá").await?;

        assert_eq!(result.images.len(), 3);
        assert_eq!(result.images[0].to_data_url(), "data:image/png;base64,UE5H");
        assert_eq!(result.used_prompt, build_image_prompt(&persona));
        assert_eq!(result.audio_base64.as_deref(), Some("voice:Kore"));
        assert_eq!(result.persona, persona);
        assert_eq!(result.name, "Ana Clara");

        let mut prompts: Vec<String> = client
            .image_prompts
            .lock()
            .unwrap()
            .iter()
            .map(|(p, _)| p.rsplit("Shot: ").next().unwrap_or("").to_string())
            .collect();
        prompts.sort();
        assert_eq!(prompts, vec!["Atmospheric portrait", "Full shot", "Medium shot"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_reference_image_is_sent_with_every_shot() -> Result<()> {
        let client = Arc::new(FakeClient::default());
        let persona = Persona {
            reference_image: Some(InlineMedia::new("image/jpeg", "/9j/")),
            ..Persona::default()
        };

        generator(client.clone()).generate_images(&persona).await?;

        let prompts = client.image_prompts.lock().unwrap();
        assert_eq!(prompts.len(), 3);
        assert!(prompts.iter().all(|(_, with_ref)| *with_ref));
        Ok(())
    }

    #[tokio::test]
    async fn test_clone_path_used_when_reference_audio_present() -> Result<()> {
        let client = Arc::new(FakeClient::default());
        let persona = Persona {
            reference_audio: Some(InlineMedia::new("audio/mpeg", "SUQz")),
            ..Persona::default()
        };

        let audio = generator(client.clone()).generate_voice(&persona, "Olá").await?;

        assert_eq!(audio.as_deref(), Some("Q0xPTkU="));
        assert_eq!(client.speech_requests.lock().unwrap().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_clone_failure_falls_back_to_gender_voice() -> Result<()> {
        let client = Arc::new(FakeClient {
            fail_clone: true,
            ..Default::default()
        });
        let persona = Persona {
            gender: Gender::Masculino,
            reference_audio: Some(InlineMedia::new("audio/mpeg", "SUQz")),
            ..Persona::default()
        };

        let audio = generator(client.clone()).generate_voice(&persona, "Olá").await?;

        assert_eq!(audio.as_deref(), Some("voice:Zephyr"));
        let requests = client.speech_requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(matches!(requests[0], SpeechRequest::Clone { .. }));
        assert!(matches!(requests[1], SpeechRequest::Prebuilt { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_silent_clone_falls_back_to_gender_voice() -> Result<()> {
        let client = Arc::new(FakeClient {
            empty_clone: true,
            ..Default::default()
        });
        let persona = Persona {
            reference_audio: Some(InlineMedia::new("audio/wav", "UklGRg==")),
            ..Persona::default()
        };

        let audio = generator(client.clone()).generate_voice(&persona, "Olá").await?;

        assert_eq!(audio.as_deref(), Some("voice:Kore"));
        let requests = client.speech_requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(matches!(requests[0], SpeechRequest::Clone { .. }));
        assert!(matches!(
            &requests[1],
            SpeechRequest::Prebuilt { voice, .. } if voice == "Kore"
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_silent_prebuilt_still_records_result() -> Result<()> {
        let client = Arc::new(FakeClient {
            empty_prebuilt: true,
            ..Default::default()
        });

        let result = generator(client.clone()).generate(&Persona::default(), "Olá").await?;

        assert!(result.audio_base64.is_none());
        assert_eq!(result.images.len(), 3);
        assert_eq!(client.speech_requests.lock().unwrap().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_image_failure_fails_whole_generation() {
        let client = Arc::new(FakeClient {
            fail_images: true,
            ..Default::default()
        });

        let err = generator(client.clone())
            .generate(&Persona::default(), "Olá")
            .await
            .unwrap_err();

        assert!(format!("{:#}", err).contains("quota exceeded"));
        assert!(client.speech_requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prebuilt_failure_is_not_retried() {
        let client = Arc::new(FakeClient {
            fail_prebuilt: true,
            ..Default::default()
        });

        let result = generator(client.clone()).generate(&Persona::default(), "Olá").await;

        assert!(result.is_err());
        assert_eq!(client.speech_requests.lock().unwrap().len(), 1);
    }
}

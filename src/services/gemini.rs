use crate::utils::media::InlineMedia;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

// --- Config ---

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
    #[serde(default = "default_clone_model")]
    pub clone_model: String,
    #[serde(default = "default_tts_model")]
    pub tts_model: String,
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            image_model: default_image_model(),
            clone_model: default_clone_model(),
            tts_model: default_tts_model(),
            aspect_ratio: default_aspect_ratio(),
        }
    }
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}
fn default_image_model() -> String {
    "gemini-2.5-flash-image".to_string()
}
fn default_clone_model() -> String {
    "gemini-2.5-flash-native-audio-preview-09-2025".to_string()
}
fn default_tts_model() -> String {
    "gemini-2.5-flash-preview-tts".to_string()
}
fn default_aspect_ratio() -> String {
    "16:9".to_string()
}

// --- Client trait ---

#[derive(Debug, Clone, PartialEq)]
pub enum SpeechRequest {
    /// Imitate the voice of a reference clip.
    Clone {
        reference: InlineMedia,
        instruction: String,
    },
    /// Use one of the service's named voices.
    Prebuilt { voice: String, instruction: String },
}

#[async_trait]
pub trait GenerativeClient: Send + Sync + Debug {
    async fn generate_image(
        &self,
        prompt: &str,
        reference: Option<&InlineMedia>,
    ) -> Result<InlineMedia>;

    /// Base64 raw PCM, or `None` when the model answered without audio.
    async fn generate_speech(&self, request: &SpeechRequest) -> Result<Option<String>>;
}

// --- Gemini ---

#[derive(Debug)]
pub struct GeminiClient {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(anyhow!(
                "Gemini API key missing. Set gemini.api_key in config.yml or GEMINI_API_KEY."
            ));
        }
        Ok(Self {
            config,
            client: reqwest::Client::new(),
        })
    }

    async fn generate_content(&self, model: &str, body: &GeminiRequest) -> Result<GeminiResponse> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        );
        debug!("POST {} ({} parts)", url, body.contents.iter().map(|c| c.parts.len()).sum::<usize>());

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to reach Gemini model {}", model))?;

        let status = resp.status();
        let response_text = resp.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<GeminiResponse>(&response_text)
                .ok()
                .and_then(|r| r.error)
                .map(|e| e.message)
                .unwrap_or(response_text);
            return Err(anyhow!("Gemini API error ({}): {}", status, message));
        }

        let result: GeminiResponse = match serde_json::from_str(&response_text) {
            Ok(r) => r,
            Err(e) => {
                return Err(anyhow!(
                    "Failed to parse Gemini response: {}. Body: {}",
                    e,
                    response_text
                ))
            }
        };

        if let Some(err) = &result.error {
            return Err(anyhow!("Gemini API returned error: {}", err.message));
        }
        Ok(result)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    InlineData {
        inline_data: InlineMedia,
    },
}

#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_config: Option<ImageConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speech_config: Option<SpeechConfig>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfig {
    aspect_ratio: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig {
    voice_config: VoiceConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig {
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig {
    voice_name: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContentResponse>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPartResponse {
    inline_data: Option<InlineMedia>,
}

#[derive(Deserialize, Debug)]
struct GeminiError {
    message: String,
}

impl GeminiResponse {
    fn first_candidate(&self) -> Option<&GeminiCandidate> {
        self.candidates.as_ref().and_then(|c| c.first())
    }

    fn finish_reason(&self) -> &str {
        self.first_candidate()
            .and_then(|c| c.finish_reason.as_deref())
            .unwrap_or("UNKNOWN")
    }

    /// First inline payload of the first candidate.
    fn inline_data(&self) -> Option<&InlineMedia> {
        self.first_candidate()?
            .content
            .as_ref()?
            .parts
            .iter()
            .find_map(|p| p.inline_data.as_ref())
    }
}

fn user_content(parts: Vec<GeminiPart>) -> Vec<GeminiContent> {
    vec![GeminiContent {
        role: "user".to_string(),
        parts,
    }]
}

#[async_trait]
impl GenerativeClient for GeminiClient {
    async fn generate_image(
        &self,
        prompt: &str,
        reference: Option<&InlineMedia>,
    ) -> Result<InlineMedia> {
        let mut parts = vec![GeminiPart::Text {
            text: prompt.to_string(),
        }];
        if let Some(image) = reference {
            parts.push(GeminiPart::InlineData {
                inline_data: image.clone(),
            });
        }

        let body = GeminiRequest {
            contents: user_content(parts),
            generation_config: Some(GenerationConfig {
                image_config: Some(ImageConfig {
                    aspect_ratio: self.config.aspect_ratio.clone(),
                }),
                ..Default::default()
            }),
        };

        let result = self.generate_content(&self.config.image_model, &body).await?;
        match result.inline_data() {
            Some(image) => Ok(image.clone()),
            None => Err(anyhow!(
                "Gemini returned no image. Finish reason: {}",
                result.finish_reason()
            )),
        }
    }

    async fn generate_speech(&self, request: &SpeechRequest) -> Result<Option<String>> {
        let audio_only = Some(vec!["AUDIO".to_string()]);
        let (model, body) = match request {
            SpeechRequest::Clone {
                reference,
                instruction,
            } => (
                &self.config.clone_model,
                GeminiRequest {
                    contents: user_content(vec![
                        GeminiPart::InlineData {
                            inline_data: reference.clone(),
                        },
                        GeminiPart::Text {
                            text: instruction.clone(),
                        },
                    ]),
                    generation_config: Some(GenerationConfig {
                        response_modalities: audio_only,
                        ..Default::default()
                    }),
                },
            ),
            SpeechRequest::Prebuilt { voice, instruction } => (
                &self.config.tts_model,
                GeminiRequest {
                    contents: user_content(vec![GeminiPart::Text {
                        text: instruction.clone(),
                    }]),
                    generation_config: Some(GenerationConfig {
                        response_modalities: audio_only,
                        speech_config: Some(SpeechConfig {
                            voice_config: VoiceConfig {
                                prebuilt_voice_config: PrebuiltVoiceConfig {
                                    voice_name: voice.clone(),
                                },
                            },
                        }),
                        ..Default::default()
                    }),
                },
            ),
        };

        let result = self.generate_content(model, &body).await?;
        Ok(result
            .inline_data()
            .map(|audio| audio.data.clone())
            .filter(|data| !data.is_empty()))
    }
}

use crate::services::export::Asset;
use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use reqwest::{multipart, Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

// --- Config ---

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DriveConfig {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_folder_name")]
    pub folder_name: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    /// Loopback port for the OAuth redirect, 0 picks a free one.
    #[serde(default)]
    pub redirect_port: u16,
}

fn default_folder_name() -> String {
    "Character Studio PRO".to_string()
}
fn default_api_base() -> String {
    "https://www.googleapis.com".to_string()
}
fn default_auth_url() -> String {
    "https://accounts.google.com/o/oauth2/v2/auth".to_string()
}
fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

// --- Client ---

#[derive(Debug)]
pub struct DriveClient {
    api_base: String,
    token: String,
    client: Client,
}

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Deserialize, Debug)]
pub struct DriveFile {
    pub id: String,
}

#[derive(Deserialize)]
struct DriveErrorBody {
    error: Option<DriveError>,
}

#[derive(Deserialize)]
struct DriveError {
    message: Option<String>,
}

impl DriveClient {
    pub fn new(api_base: &str, token: impl Into<String>) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.into(),
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> Result<Url> {
        Url::parse(&format!("{}/{}", self.api_base, path))
            .with_context(|| format!("Invalid Drive URL for {}", path))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let resp = request
            .bearer_auth(&self.token)
            .send()
            .await
            .context("Failed to reach Google Drive")?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<DriveErrorBody>(&text)
                .ok()
                .and_then(|b| b.error)
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("HTTP {}", status));
            return Err(anyhow!("Google Drive API error: {}", message));
        }

        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse Drive response: {}", text))
    }

    /// Id of the named folder, created when it does not exist yet.
    pub async fn find_or_create_folder(&self, name: &str) -> Result<String> {
        let mut url = self.url("drive/v3/files")?;
        url.query_pairs_mut()
            .append_pair("q", &folder_query(name))
            .append_pair("fields", "files(id,name)");

        let list: FileList = self.send(self.client.get(url)).await?;
        if let Some(folder) = list.files.into_iter().next() {
            debug!("Found Drive folder '{}' ({})", name, folder.id);
            return Ok(folder.id);
        }

        let folder: DriveFile = self
            .send(
                self.client
                    .post(self.url("drive/v3/files")?)
                    .json(&json!({ "name": name, "mimeType": FOLDER_MIME_TYPE })),
            )
            .await?;
        info!("Created Drive folder '{}' ({})", name, folder.id);
        Ok(folder.id)
    }

    pub async fn upload_file(
        &self,
        folder_id: &str,
        name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String> {
        let metadata = json!({
            "name": name,
            "parents": [folder_id],
            "mimeType": mime_type,
        });

        let metadata_part = multipart::Part::text(metadata.to_string())
            .mime_str("application/json")
            .context("Invalid mime type")?;
        let file_part = multipart::Part::bytes(bytes)
            .file_name(name.to_string())
            .mime_str(mime_type)
            .with_context(|| format!("Invalid mime type {}", mime_type))?;
        let form = multipart::Form::new()
            .part("metadata", metadata_part)
            .part("file", file_part);

        let mut url = self.url("upload/drive/v3/files")?;
        url.query_pairs_mut().append_pair("uploadType", "multipart");

        let file: DriveFile = self
            .send(self.client.post(url).multipart(form))
            .await
            .with_context(|| format!("Upload of {} failed", name))?;
        info!("Uploaded {} ({})", name, file.id);
        Ok(file.id)
    }

    /// Uploads every asset into the named folder; returns the new file ids.
    pub async fn upload_assets(&self, folder_name: &str, assets: Vec<Asset>) -> Result<Vec<String>> {
        let folder_id = self.find_or_create_folder(folder_name).await?;
        let mut ids = Vec::with_capacity(assets.len());
        for asset in assets {
            ids.push(
                self.upload_file(&folder_id, &asset.file_name, &asset.mime_type, asset.bytes)
                    .await?,
            );
        }
        Ok(ids)
    }
}

fn folder_query(name: &str) -> String {
    let escaped = name.replace('\\', "\\\\").replace('\'', "\\'");
    format!(
        "name = '{}' and mimeType = '{}' and trashed = false",
        escaped, FOLDER_MIME_TYPE
    )
}

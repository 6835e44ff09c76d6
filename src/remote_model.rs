use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, debug};
use image::DynamicImage;
use base64::{Engine as _, engine::general_purpose};
use crate::config::RemoteModelConfig;
use crate::inference::SceneNarrator;
use crate::vision::Frame;

const DESCRIBE_PROMPT: &str = "Describe the main elements of the image in simple, direct language for a visually impaired user. \
Focus on key objects, their spatial relationships (e.g., 'a cup is on the table to your left'), and essential features. \
Avoid ambiguity and excessive detail. Mention people if present. Keep the description concise (around 5-10 seconds of speech).";

const READ_TEXT_PROMPT: &str = "Transcribe all legible text in the image exactly as written, in natural reading order. \
Reply with the text only. If there is no text, reply with exactly: NO_TEXT";

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// OpenAI-compatible vision chat client used to describe scenes and read text.
pub struct RemoteModel {
    config: RemoteModelConfig,
    client: reqwest::Client,
    max_upload_side: u32,
}

impl RemoteModel {
    pub fn new(config: RemoteModelConfig, max_upload_side: u32) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_seconds.unwrap_or(60));

        let mut default_headers = reqwest::header::HeaderMap::new();
        default_headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        let auth_header = format!("Bearer {}", config.api_key);
        default_headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&auth_header)
                .map_err(|e| anyhow!("Invalid API key format: {}", e))?,
        );

        if let Some(additional_headers) = &config.additional_headers {
            for (key, value) in additional_headers {
                default_headers.insert(
                    reqwest::header::HeaderName::from_bytes(key.as_bytes())
                        .map_err(|e| anyhow!("Invalid header name '{}': {}", key, e))?,
                    reqwest::header::HeaderValue::from_str(value)
                        .map_err(|e| anyhow!("Invalid header value for '{}': {}", key, e))?,
                );
            }
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("Spectra/1.0")
            .default_headers(default_headers)
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

        info!("🌐 Remote vision model: {} at {}", config.model_name, config.base_url);

        Ok(Self { config, client, max_upload_side })
    }

    pub async fn ask_about_image(&self, prompt: &str, image: DynamicImage) -> Result<String> {
        let start_time = std::time::Instant::now();
        let image_data = encode_image(image, self.max_upload_side)?;

        let request = ChatCompletionRequest {
            model: self.config.model_name.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: vec![
                    ContentPart::Text { text: prompt.to_string() },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: format!("data:image/jpeg;base64,{}", image_data),
                            detail: self.config.image_detail.clone(),
                        },
                    },
                ],
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        debug!("📤 Sending image request to: {}", url);

        let response = self.client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to send request to remote model: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!("Remote model API error ({}): {}", status, error_text));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse response from remote model: {}", e))?;

        let text = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| anyhow!("No response content from remote model"))?;

        debug!("✅ Remote model replied in {}ms", start_time.elapsed().as_millis());
        Ok(text)
    }
}

impl SceneNarrator for RemoteModel {
    async fn describe(&self, frame: &Frame) -> Result<String> {
        let image = frame.to_image()?;
        self.ask_about_image(DESCRIBE_PROMPT, image).await
    }

    async fn read_text(&self, frame: &Frame) -> Result<String> {
        let image = frame.to_image()?;
        let text = self.ask_about_image(READ_TEXT_PROMPT, image).await?;
        if text == "NO_TEXT" {
            return Ok("No text found in the image.".to_string());
        }
        Ok(text)
    }
}

/// JPEG-encodes the image as base64, shrinking it so neither side exceeds
/// `max_side`.
pub fn encode_image(image: DynamicImage, max_side: u32) -> Result<String> {
    use std::io::Cursor;

    let image = if image.width() > max_side || image.height() > max_side {
        image.resize(max_side, max_side, image::imageops::FilterType::Lanczos3)
    } else {
        image
    };

    let mut buffer = Vec::new();
    image
        .to_rgb8()
        .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Jpeg)
        .map_err(|e| anyhow!("Failed to encode image as JPEG: {}", e))?;

    Ok(general_purpose::STANDARD.encode(&buffer))
}

//! Google Cloud Vision client (`images:annotate`)

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{AnalysisResult, ImageAnalyzer, LabelAnnotation, TextAnnotation};
use crate::camera::CapturedImage;
use crate::config::ApiConfig;
use crate::{Error, Result};

/// Annotation feature requested from the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum Feature {
    LabelDetection,
    TextDetection,
}

/// Cloud Vision image annotation client
pub struct GoogleVision {
    client: Client,
    api_key: SecretString,
    endpoint: String,
}

impl GoogleVision {
    /// Create a new client
    #[must_use]
    pub fn new(api_key: SecretString, endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            endpoint: endpoint.into(),
        }
    }

    /// Create a client from the API configuration
    ///
    /// # Errors
    ///
    /// Returns error if no API key is configured
    pub fn from_config(api: &ApiConfig) -> Result<Self> {
        let key = api
            .key
            .as_ref()
            .ok_or_else(|| Error::Config("API key required for image analysis".to_string()))?;

        Ok(Self::new(
            SecretString::from(key.expose_secret().to_owned()),
            api.vision_url.clone(),
        ))
    }

    /// Send one annotate request for a single feature
    async fn annotate(&self, content: &str, feature: Feature) -> Result<AnnotateImageResponse> {
        let request = AnnotateRequest {
            requests: vec![AnnotateImageRequest {
                image: Image { content },
                features: vec![FeatureRequest { kind: feature }],
            }],
        };

        tracing::debug!(?feature, "requesting annotation");

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.expose_secret())])
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Analysis(format!("vision request failed: {}", e.without_url())))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Analysis(format!("vision API error {status}: {body}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| {
                Error::Analysis(format!("failed to read vision response: {}", e.without_url()))
            })?;

        parse_response(&body)
    }
}

/// Extract the single image response from an annotate response body
fn parse_response(body: &str) -> Result<AnnotateImageResponse> {
    let parsed: AnnotateResponse = serde_json::from_str(body)
        .map_err(|e| Error::Analysis(format!("malformed vision response: {e}")))?;

    let image = parsed.responses.into_iter().next().unwrap_or_default();

    if let Some(err) = &image.error {
        return Err(Error::Analysis(format!(
            "vision API rejected image ({}): {}",
            err.code, err.message
        )));
    }

    Ok(image)
}

#[async_trait]
impl ImageAnalyzer for GoogleVision {
    async fn analyze(
        &self,
        image: &CapturedImage,
        want_labels: bool,
        want_text: bool,
    ) -> Result<AnalysisResult> {
        let mut result = AnalysisResult::default();
        if !want_labels && !want_text {
            return Ok(result);
        }

        let bytes = image
            .read()
            .await
            .map_err(|e| Error::Analysis(format!("failed to read {}: {e}", image.path().display())))?;
        let content = base64::engine::general_purpose::STANDARD.encode(&bytes);

        if want_labels {
            result.labels = self.annotate(&content, Feature::LabelDetection).await?.label_annotations;
            if let Some(label) = result.top_label() {
                tracing::info!(label, "detected label");
            }
        }

        if want_text {
            result.texts = self.annotate(&content, Feature::TextDetection).await?.text_annotations;
            if let Some(text) = result.top_text() {
                tracing::info!(text, "detected text");
            }
        }

        Ok(result)
    }

    fn name(&self) -> &'static str {
        "google-vision"
    }
}

#[derive(Serialize)]
struct AnnotateRequest<'a> {
    requests: Vec<AnnotateImageRequest<'a>>,
}

#[derive(Serialize)]
struct AnnotateImageRequest<'a> {
    image: Image<'a>,
    features: Vec<FeatureRequest>,
}

#[derive(Serialize)]
struct Image<'a> {
    content: &'a str,
}

#[derive(Serialize)]
struct FeatureRequest {
    #[serde(rename = "type")]
    kind: Feature,
}

#[derive(Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    #[serde(default)]
    label_annotations: Vec<LabelAnnotation>,
    #[serde(default)]
    text_annotations: Vec<TextAnnotation>,
    error: Option<Status>,
}

#[derive(Debug, Deserialize)]
struct Status {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("captured image contains no data")]
    Empty,
    #[error("captured image has no MIME type")]
    MissingMimeType,
}

/// An image as delivered by the capture collaborator: a base64 data URL
/// (or bare base64) plus its MIME type.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedImage {
    pub image_data_url: String,
    #[serde(default)]
    pub mime_type: String,
}

fn data_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^data:([^;,]*)[^,]*,").expect("Invalid data URL regex"))
}

impl CapturedImage {
    pub fn new(image_data_url: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            image_data_url: image_data_url.into(),
            mime_type: mime_type.into(),
        }
    }

    /// The base64 payload with any `data:...,` prefix removed.
    pub fn payload(&self) -> &str {
        match data_url_regex().find(&self.image_data_url) {
            Some(prefix) => &self.image_data_url[prefix.end()..],
            None => &self.image_data_url,
        }
    }

    /// The explicit MIME type, falling back to the one declared in the data URL.
    pub fn resolved_mime_type(&self) -> Option<&str> {
        let explicit = self.mime_type.trim();
        if !explicit.is_empty() {
            return Some(explicit);
        }

        data_url_regex()
            .captures(&self.image_data_url)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .filter(|m| !m.is_empty())
    }

    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.payload().trim().is_empty() {
            return Err(CaptureError::Empty);
        }
        if self.resolved_mime_type().is_none() {
            return Err(CaptureError::MissingMimeType);
        }
        Ok(())
    }
}

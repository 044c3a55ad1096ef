use crate::analysis::{AnalysisError, AnalysisRequest, AnalysisResult};
use crate::capture::{CaptureError, CapturedImage};
use crate::sensors::SensorReading;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

pub const ANALYSIS_FAILED_MESSAGE: &str =
    "Failed to analyze image. Please try again with a clear image of a palm, foot, or sole.";

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AppState {
    Idle,
    Loading,
    Error {
        message: String,
    },
    Result {
        result: AnalysisResult,
        // Published once, as the snapshot's top-level `imagePreview`.
        #[serde(skip)]
        image_preview: String,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("an analysis is already in progress")]
    Busy,
    #[error(transparent)]
    InvalidCapture(#[from] CaptureError),
}

/// The capture -> analyze -> result/error cycle.
#[derive(Debug)]
pub struct Workflow {
    state: AppState,
    preview: Option<String>,
}

impl Default for Workflow {
    fn default() -> Self {
        Self {
            state: AppState::Idle,
            preview: None,
        }
    }
}

impl Workflow {
    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn image_preview(&self) -> Option<&str> {
        self.preview.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.state == AppState::Loading
    }

    /// Enters Loading and returns the request to send. Rejected while an
    /// analysis is outstanding or when the capture is unusable; neither
    /// rejection changes state.
    pub fn submit(
        &mut self,
        image: &CapturedImage,
        reading: Option<SensorReading>,
    ) -> Result<AnalysisRequest, WorkflowError> {
        if self.is_loading() {
            return Err(WorkflowError::Busy);
        }
        image.validate()?;

        let request = AnalysisRequest {
            image: image.payload().to_string(),
            mime_type: image.resolved_mime_type().unwrap_or_default().to_string(),
            heart_rate: reading.map(|r| r.heart_rate),
            gsr: reading.map(|r| r.gsr),
        };

        self.state = AppState::Loading;
        self.preview = Some(image.image_data_url.clone());
        Ok(request)
    }

    /// Applies the outcome of the outstanding analysis. Returns `false` if
    /// nothing was outstanding.
    pub fn finish(&mut self, outcome: Result<AnalysisResult, AnalysisError>) -> bool {
        if !self.is_loading() {
            return false;
        }

        self.state = match outcome {
            Ok(result) => AppState::Result {
                result,
                image_preview: self.preview.clone().unwrap_or_default(),
            },
            Err(e) => {
                error!(error = %e, "image analysis failed");
                AppState::Error {
                    message: ANALYSIS_FAILED_MESSAGE.to_string(),
                }
            }
        };
        true
    }

    /// Back to Idle from Result or Error. No-op from Idle or Loading.
    pub fn reset(&mut self) -> bool {
        match self.state {
            AppState::Error { .. } | AppState::Result { .. } => {
                self.state = AppState::Idle;
                self.preview = None;
                true
            }
            AppState::Idle | AppState::Loading => false,
        }
    }
}

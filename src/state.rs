use std::sync::Arc;

use serde::Serialize;

use crate::diagnosis::{DiagnosisResult, Verdict};
use crate::error::DiagnosisError;
use crate::intake::StagedImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UiState {
    NoImage,
    ImageSelected,
    Analyzing,
    ResultShown,
    ErrorShown,
}

/// Why a trigger left the state untouched or only raised the banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejected {
    NoImage,
    InFlight,
}

/// Issued when an analysis starts; only the ticket of the current generation
/// may write its outcome back.
#[derive(Debug, Clone)]
pub struct Ticket {
    generation: u64,
    pub image: Arc<StagedImage>,
}

/// Owns all UI state. Mutated only through the transitions below.
#[derive(Debug)]
pub struct Controller {
    phase: UiState,
    image: Option<Arc<StagedImage>>,
    result: Option<DiagnosisResult>,
    error: Option<String>,
    generation: u64,
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

impl Controller {
    pub fn new() -> Self {
        Self {
            phase: UiState::NoImage,
            image: None,
            result: None,
            error: None,
            generation: 0,
        }
    }

    pub fn phase(&self) -> UiState {
        self.phase
    }

    pub fn is_analyzing(&self) -> bool {
        self.phase == UiState::Analyzing
    }

    pub fn image(&self) -> Option<Arc<StagedImage>> {
        self.image.clone()
    }

    /// Stages a new image and clears the last verdict. Refused while a
    /// request is in flight so there is never more than one outstanding.
    pub fn select_file(&mut self, image: StagedImage) -> Result<(), Rejected> {
        if self.is_analyzing() {
            tracing::debug!(file = %image.file_name, "Upload ignored: a request is in flight");
            return Err(Rejected::InFlight);
        }
        tracing::info!(file = %image.file_name, mime = %image.mime_type, "Image selected");
        self.image = Some(Arc::new(image));
        self.result = None;
        self.error = None;
        self.generation += 1;
        self.phase = UiState::ImageSelected;
        Ok(())
    }

    /// An upload that could not be read ends that attempt with an error.
    pub fn fail_selection(&mut self, err: &DiagnosisError) -> Result<(), Rejected> {
        if self.is_analyzing() {
            return Err(Rejected::InFlight);
        }
        tracing::warn!("Image could not be staged: {}", err);
        self.image = None;
        self.generation += 1;
        self.show_error(err.to_string());
        Ok(())
    }

    pub fn begin_analysis(&mut self) -> Result<Ticket, Rejected> {
        if self.is_analyzing() {
            tracing::debug!("Analyze ignored: a request is already in flight");
            return Err(Rejected::InFlight);
        }
        let Some(image) = self.image.clone() else {
            self.error = Some("Please upload an image first.".to_string());
            self.result = None;
            self.phase = UiState::ErrorShown;
            return Err(Rejected::NoImage);
        };

        self.generation += 1;
        self.result = None;
        self.error = None;
        self.phase = UiState::Analyzing;

        Ok(Ticket {
            generation: self.generation,
            image,
        })
    }

    /// Applies an outcome. Returns false when the ticket is not the current
    /// generation and the outcome was dropped.
    pub fn complete(
        &mut self,
        ticket: &Ticket,
        outcome: Result<DiagnosisResult, DiagnosisError>,
    ) -> bool {
        if ticket.generation != self.generation || !self.is_analyzing() {
            tracing::info!(
                ticket = ticket.generation,
                current = self.generation,
                "Discarding response for a superseded request"
            );
            return false;
        }

        match outcome {
            Ok(result) => {
                self.result = Some(result);
                self.error = None;
                self.phase = UiState::ResultShown;
            }
            Err(err) => {
                tracing::error!("Analysis failed: {}", err);
                self.show_error(err.to_string());
            }
        }
        true
    }

    fn show_error(&mut self, message: String) {
        self.result = Some(DiagnosisResult::failed(message.clone()));
        self.error = Some(message);
        self.phase = UiState::ErrorShown;
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.phase,
            preview: self.image.as_ref().map(|img| Preview {
                file_name: img.file_name.clone(),
                mime_type: img.mime_type.clone(),
                revision: self.generation,
            }),
            verdict: self.result.as_ref().map(DiagnosisResult::verdict),
            result: self.result.clone(),
            error: self.error.clone(),
        }
    }
}

/// Metadata of the staged image; the bytes are served from `/preview`.
#[derive(Debug, Clone, Serialize)]
pub struct Preview {
    pub file_name: String,
    pub mime_type: String,
    pub revision: u64,
}

impl Preview {
    pub fn url(&self) -> String {
        format!("/preview?v={}", self.revision)
    }
}

/// Immutable view handed to the renderer.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub state: UiState,
    pub preview: Option<Preview>,
    pub result: Option<DiagnosisResult>,
    pub verdict: Option<Verdict>,
    pub error: Option<String>,
}

impl Snapshot {
    pub fn is_analyzing(&self) -> bool {
        self.state == UiState::Analyzing
    }
}

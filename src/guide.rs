use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audio::{decode_pcm, AudioError, DecodedAudioBuffer, PcmFormat};
use crate::history::HistoryStore;
use crate::services::types::{Coordinates, LandmarkDetails, SuggestionResult};
use crate::services::{EnrichmentService, IdentificationService, NarrationService, SuggestionService};
use crate::vision::capture::{CaptureError, CapturedImage};

/// Progress of one scan, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStage {
    AnalyzingImage,
    FetchingInfo,
    GeneratingAudio,
    Complete,
}

#[derive(Debug, Error)]
pub enum GuideError {
    #[error("Could not identify a landmark in this image.")]
    NotIdentified,

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error(transparent)]
    Service(#[from] anyhow::Error),
}

/// Result of a successful scan, narration included.
#[derive(Debug, Clone)]
pub struct Landmark {
    pub id: Uuid,
    pub name: String,
    pub details: LandmarkDetails,
    pub audio: DecodedAudioBuffer,
}

/// Runs a scan end to end: identify, enrich, narrate, decode, remember.
pub struct Guide {
    identifier: Arc<dyn IdentificationService>,
    enricher: Arc<dyn EnrichmentService>,
    narrator: Arc<dyn NarrationService>,
    advisor: Arc<dyn SuggestionService>,
    format: PcmFormat,
    history: HistoryStore,
    stages: Option<mpsc::Sender<ScanStage>>,
}

impl Guide {
    /// Use one provider for every collaborator.
    pub fn new<S>(services: Arc<S>, format: PcmFormat, history: HistoryStore) -> Self
    where
        S: IdentificationService + EnrichmentService + NarrationService + SuggestionService + 'static,
    {
        Self {
            identifier: services.clone(),
            enricher: services.clone(),
            narrator: services.clone(),
            advisor: services,
            format,
            history,
            stages: None,
        }
    }

    pub fn from_parts(
        identifier: Arc<dyn IdentificationService>,
        enricher: Arc<dyn EnrichmentService>,
        narrator: Arc<dyn NarrationService>,
        advisor: Arc<dyn SuggestionService>,
        format: PcmFormat,
        history: HistoryStore,
    ) -> Self {
        Self {
            identifier,
            enricher,
            narrator,
            advisor,
            format,
            history,
            stages: None,
        }
    }

    /// Report stage transitions on `tx`. Sends are best effort.
    pub fn with_stage_events(mut self, tx: mpsc::Sender<ScanStage>) -> Self {
        self.stages = Some(tx);
        self
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut HistoryStore {
        &mut self.history
    }

    pub async fn scan(&mut self, image: &CapturedImage, location: Option<Coordinates>) -> Result<Landmark, GuideError> {
        // 1. Identify
        self.emit(ScanStage::AnalyzingImage).await;
        let name = self
            .identifier
            .identify(image, location)
            .await?
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or(GuideError::NotIdentified)?;
        info!(name = %name, "Landmark identified");

        // 2. Enrich
        self.emit(ScanStage::FetchingInfo).await;
        let details = self.enricher.enrich(&name, location).await?;

        // 3. Narrate + decode
        self.emit(ScanStage::GeneratingAudio).await;
        let audio = self.narrate(&details.description).await?;

        let landmark = Landmark {
            id: Uuid::new_v4(),
            name,
            details,
            audio,
        };

        self.emit(ScanStage::Complete).await;

        // 4. Remember. A failed save never costs the user the result.
        if let Err(e) = self
            .history
            .record(landmark.id, &landmark.name, &landmark.details, &image.thumbnail)
        {
            warn!("Failed to save history: {}", e);
        }

        Ok(landmark)
    }

    /// Load a photo from disk and scan it.
    pub async fn scan_file(
        &mut self,
        path: &std::path::Path,
        location: Option<Coordinates>,
    ) -> Result<Landmark, GuideError> {
        let image = CapturedImage::load(path)?;
        self.scan(&image, location).await
    }

    /// Synthesize and decode narration for `text`. Used for history replay,
    /// where audio is not stored.
    pub async fn narrate(&self, text: &str) -> Result<DecodedAudioBuffer, GuideError> {
        let encoded = self.narrator.narrate(text).await?;
        let buffer = decode_pcm(&encoded, self.format)?;
        info!(
            seconds = buffer.duration(),
            frames = buffer.frame_count(),
            "Narration decoded"
        );
        Ok(buffer)
    }

    pub async fn nearby(&self, location: Coordinates) -> Result<SuggestionResult, GuideError> {
        Ok(self.advisor.suggest(location).await?)
    }

    async fn emit(&self, stage: ScanStage) {
        if let Some(tx) = &self.stages {
            let _ = tx.send(stage).await;
        }
    }
}

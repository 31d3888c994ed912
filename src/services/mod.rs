//! Remote collaborators of the guide.
//!
//! Each trait is one hosted model call. The guide depends only on these
//! traits; `gemini` is the production implementation.

pub mod gemini;
pub mod grounding;
pub mod suggestions;
pub mod types;

use anyhow::Result;
use async_trait::async_trait;

use crate::vision::capture::CapturedImage;

pub use gemini::{GeminiClient, GeminiModels};
pub use types::*;

#[async_trait]
pub trait IdentificationService: Send + Sync {
    /// Name the place shown in `image`. `Ok(None)` means nothing usable came back.
    async fn identify(&self, image: &CapturedImage, location: Option<Coordinates>) -> Result<Option<String>>;
}

#[async_trait]
pub trait EnrichmentService: Send + Sync {
    async fn enrich(&self, name: &str, location: Option<Coordinates>) -> Result<LandmarkDetails>;
}

#[async_trait]
pub trait NarrationService: Send + Sync {
    /// Synthesize `text`; returns base64 raw PCM.
    async fn narrate(&self, text: &str) -> Result<String>;
}

#[async_trait]
pub trait SuggestionService: Send + Sync {
    async fn suggest(&self, location: Coordinates) -> Result<SuggestionResult>;
}

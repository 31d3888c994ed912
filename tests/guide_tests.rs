use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use lumina::audio::{AudioError, PcmFormat};
use lumina::guide::{Guide, GuideError, ScanStage};
use lumina::history::HistoryStore;
use lumina::services::{
    Coordinates, EnrichmentService, GroundingChunk, IdentificationService, LandmarkDetails, NarrationService,
    SuggestionResult, SuggestionService,
};
use lumina::vision::CapturedImage;
use tokio::sync::mpsc;

/// Scripted collaborators standing in for the hosted models.
struct FakeServices {
    name: Option<&'static str>,
    audio: &'static str,
    fail_enrich: bool,
    narrations: AtomicUsize,
}

impl FakeServices {
    fn new(name: Option<&'static str>) -> Self {
        Self {
            name,
            // [0x00, 0x00, 0xFF, 0x7F]
            audio: "AAD/fw==",
            fail_enrich: false,
            narrations: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl IdentificationService for FakeServices {
    async fn identify(&self, _image: &CapturedImage, _location: Option<Coordinates>) -> Result<Option<String>> {
        Ok(self.name.map(str::to_string))
    }
}

#[async_trait]
impl EnrichmentService for FakeServices {
    async fn enrich(&self, name: &str, _location: Option<Coordinates>) -> Result<LandmarkDetails> {
        if self.fail_enrich {
            return Err(anyhow!("Failed to fetch details."));
        }
        Ok(LandmarkDetails {
            description: format!("{} is worth a visit.", name),
            sources: vec![GroundingChunk::web("https://example.org", "Source")],
            ..LandmarkDetails::default()
        })
    }
}

#[async_trait]
impl NarrationService for FakeServices {
    async fn narrate(&self, _text: &str) -> Result<String> {
        self.narrations.fetch_add(1, Ordering::SeqCst);
        Ok(self.audio.to_string())
    }
}

#[async_trait]
impl SuggestionService for FakeServices {
    async fn suggest(&self, _location: Coordinates) -> Result<SuggestionResult> {
        Ok(SuggestionResult {
            title: "Nearby".to_string(),
            ..SuggestionResult::default()
        })
    }
}

fn photo() -> CapturedImage {
    CapturedImage {
        source: PathBuf::from("photo.jpg"),
        mime_type: "image/jpeg".to_string(),
        data: "AAAA".to_string(),
        thumbnail: "data:image/jpeg;base64,AAAA".to_string(),
    }
}

fn guide(services: FakeServices) -> Guide {
    Guide::new(Arc::new(services), PcmFormat::default(), HistoryStore::in_memory())
}

#[tokio::test]
async fn test_scan_reports_stages_in_order() {
    let (tx, mut rx) = mpsc::channel(16);
    let mut guide = guide(FakeServices::new(Some("Big Ben"))).with_stage_events(tx);

    guide.scan(&photo(), None).await.unwrap();
    drop(guide);

    let mut stages = Vec::new();
    while let Some(stage) = rx.recv().await {
        stages.push(stage);
    }
    assert_eq!(
        stages,
        vec![
            ScanStage::AnalyzingImage,
            ScanStage::FetchingInfo,
            ScanStage::GeneratingAudio,
            ScanStage::Complete,
        ]
    );
}

#[tokio::test]
async fn test_scan_returns_details_and_decoded_audio() {
    let mut guide = guide(FakeServices::new(Some("  Big Ben \n")));

    let landmark = guide.scan(&photo(), Some(Coordinates::new(51.5, -0.12))).await.unwrap();

    assert_eq!(landmark.name, "Big Ben", "Name should be trimmed");
    assert_eq!(landmark.details.description, "Big Ben is worth a visit.");
    assert_eq!(landmark.audio.samples(), &[0.0, 0.999969482421875]);
}

#[tokio::test]
async fn test_successful_scan_is_remembered() {
    let mut guide = guide(FakeServices::new(Some("Big Ben")));

    let landmark = guide.scan(&photo(), None).await.unwrap();

    let item = guide.history().find("Big Ben").expect("scan should be in history");
    assert_eq!(item.id, landmark.id);
    assert_eq!(item.image_src, "data:image/jpeg;base64,AAAA");
    assert_eq!(item.sources.len(), 1);
}

#[tokio::test]
async fn test_unwritable_history_does_not_fail_the_scan() {
    // A plain file where the history directory should be.
    let blocker = std::env::temp_dir().join(format!("lumina_blocker_{}", uuid::Uuid::new_v4()));
    std::fs::write(&blocker, "not a directory").unwrap();
    let history = HistoryStore::open(blocker.join("history.json"));

    let mut guide = Guide::new(
        Arc::new(FakeServices::new(Some("Big Ben"))),
        PcmFormat::default(),
        history,
    );

    let landmark = guide.scan(&photo(), None).await.expect("scan should survive a failed save");

    assert_eq!(landmark.name, "Big Ben");
    assert_eq!(guide.history().items().len(), 1, "Entry is still kept in memory");
    assert_eq!(guide.history().items()[0].id, landmark.id);
    assert!(!blocker.join("history.json").exists());

    let _ = std::fs::remove_file(&blocker);
}

#[tokio::test]
async fn test_unidentified_image_stops_the_scan() {
    let mut guide = guide(FakeServices::new(None));

    let err = guide.scan(&photo(), None).await.unwrap_err();

    assert!(matches!(err, GuideError::NotIdentified));
    assert_eq!(err.to_string(), "Could not identify a landmark in this image.");
    assert!(guide.history().is_empty());
}

#[tokio::test]
async fn test_blank_identification_counts_as_unidentified() {
    let mut guide = guide(FakeServices::new(Some("   ")));
    let err = guide.scan(&photo(), None).await.unwrap_err();
    assert!(matches!(err, GuideError::NotIdentified));
}

#[tokio::test]
async fn test_service_failure_is_surfaced_and_not_saved() {
    let mut services = FakeServices::new(Some("Big Ben"));
    services.fail_enrich = true;
    let mut guide = guide(services);

    let err = guide.scan(&photo(), None).await.unwrap_err();

    assert!(matches!(err, GuideError::Service(_)));
    assert_eq!(err.to_string(), "Failed to fetch details.");
    assert!(guide.history().is_empty());
}

#[tokio::test]
async fn test_malformed_narration_is_an_audio_error() {
    let mut services = FakeServices::new(Some("Big Ben"));
    services.audio = "AQID"; // three bytes
    let mut guide = guide(services);

    let err = guide.scan(&photo(), None).await.unwrap_err();
    assert!(matches!(err, GuideError::Audio(AudioError::MalformedEncoding(_))), "got {:?}", err);
}

#[tokio::test]
async fn test_replay_narration_regenerates_audio() {
    let services = Arc::new(FakeServices::new(Some("Big Ben")));
    let guide = Guide::from_parts(
        services.clone(),
        services.clone(),
        services.clone(),
        services.clone(),
        PcmFormat::default(),
        HistoryStore::in_memory(),
    );

    let buffer = guide.narrate("Some saved description").await.unwrap();

    assert_eq!(buffer.frame_count(), 2);
    assert_eq!(services.narrations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_nearby_delegates_to_suggestions() {
    let guide = guide(FakeServices::new(None));
    let result = guide.nearby(Coordinates::new(48.85, 2.35)).await.unwrap();
    assert_eq!(result.title, "Nearby");
}

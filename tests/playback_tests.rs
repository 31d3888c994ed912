use std::time::Duration;

use lumina::audio::{
    AudioError, DecodedAudioBuffer, MockBackend, PcmFormat, PlaybackEngine, PlaybackState, PlayerConfig,
};

/// Mono 24 kHz buffer of `seconds` length.
fn tone(seconds: f64) -> DecodedAudioBuffer {
    let frames = (seconds * 24_000.0) as usize;
    DecodedAudioBuffer::new(vec![0.25; frames], PcmFormat::default())
}

fn engine(backend: &MockBackend) -> PlaybackEngine<MockBackend> {
    PlaybackEngine::new(backend.clone(), PlayerConfig::default())
}

/// Let the position poll run a few ticks on the paused clock.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test(start_paused = true)]
async fn test_play_reports_playing_with_duration() {
    let backend = MockBackend::new();
    let mut player = engine(&backend);

    player.play(tone(2.0)).unwrap();

    let status = player.status();
    assert_eq!(status.state, PlaybackState::Playing);
    assert_eq!(status.position, 0.0);
    assert!((status.duration - 2.0).abs() < 1e-12);
    assert_eq!(backend.audible(), vec![48_000]);
}

#[tokio::test(start_paused = true)]
async fn test_position_follows_output_clock() {
    let backend = MockBackend::new();
    let mut player = engine(&backend);
    player.play(tone(2.0)).unwrap();

    backend.advance(0.25);
    settle().await;
    assert!((player.position() - 0.25).abs() < 1e-9, "Position should track the clock, got {}", player.position());

    backend.advance(0.5);
    settle().await;
    assert!((player.position() - 0.75).abs() < 1e-9);
    assert_eq!(player.state(), PlaybackState::Playing);
}

#[tokio::test(start_paused = true)]
async fn test_second_play_replaces_first() {
    let backend = MockBackend::new();
    let mut player = engine(&backend);

    player.play(tone(1.0)).unwrap();
    backend.advance(0.4);
    settle().await;

    player.play(tone(0.5)).unwrap();

    assert_eq!(backend.nodes_started(), 2);
    assert_eq!(backend.audible(), vec![12_000], "Only the newest buffer may be audible");
    assert_eq!(player.position(), 0.0, "New session starts from zero");
    assert!((player.duration() - 0.5).abs() < 1e-12);
}

#[tokio::test(start_paused = true)]
async fn test_replaced_session_never_ends_the_new_one() {
    let backend = MockBackend::new();
    let mut player = engine(&backend);

    // The first buffer is almost done when the second one starts.
    player.play(tone(1.0)).unwrap();
    backend.advance(0.9);
    settle().await;

    player.play(tone(2.0)).unwrap();
    backend.advance(0.2);
    settle().await;
    settle().await;

    let status = player.status();
    assert_eq!(status.state, PlaybackState::Playing, "Old poll must not stop the new session");
    assert!((status.position - 0.2).abs() < 1e-9, "Position should be the new session's, got {}", status.position);
    assert!((status.duration - 2.0).abs() < 1e-12);
    assert_eq!(backend.audible(), vec![48_000]);
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_idempotent() {
    let backend = MockBackend::new();
    let mut player = engine(&backend);

    // Stopping before anything played is a no-op.
    player.stop();
    player.stop();
    assert_eq!(player.state(), PlaybackState::Stopped);

    player.play(tone(1.0)).unwrap();
    backend.advance(0.3);
    settle().await;

    player.stop();
    player.stop();

    assert_eq!(player.state(), PlaybackState::Stopped);
    assert_eq!(player.position(), 0.0, "Stop resets position");
    assert!(backend.audible().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_natural_end_stops_at_duration() {
    let backend = MockBackend::new();
    let mut player = engine(&backend);
    let mut updates = player.subscribe();

    player.play(tone(1.0)).unwrap();
    backend.advance(1.2);
    settle().await;

    let status = *updates.borrow_and_update();
    assert_eq!(status.state, PlaybackState::Stopped);
    assert!((status.position - 1.0).abs() < 1e-12, "Final position should equal duration");
    assert!(backend.audible().is_empty(), "Finished node should be released");

    // Stop after a natural end is still fine.
    player.stop();
    assert_eq!(player.state(), PlaybackState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_no_position_update_after_stop() {
    let backend = MockBackend::new();
    let mut player = engine(&backend);
    let mut updates = player.subscribe();

    player.play(tone(3.0)).unwrap();
    backend.advance(0.5);
    settle().await;
    assert!(player.position() > 0.0);

    player.stop();
    let stopped = *updates.borrow_and_update();
    assert_eq!(stopped.state, PlaybackState::Stopped);

    backend.advance(1.0);
    settle().await;
    settle().await;

    assert!(!updates.has_changed().unwrap(), "A stopped session must not publish again");
    assert_eq!(player.position(), 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_position_never_goes_backwards() {
    let backend = MockBackend::new();
    let mut player = engine(&backend);
    player.play(tone(2.0)).unwrap();

    let mut last = 0.0;
    for _ in 0..10 {
        backend.advance(0.1);
        settle().await;
        let position = player.position();
        assert!(position >= last, "Position went from {} to {}", last, position);
        last = position;
    }
    assert!((last - 1.0).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_output_leaves_engine_stopped() {
    let backend = MockBackend::unavailable();
    let mut player = engine(&backend);

    let result = player.play(tone(1.0));

    assert!(matches!(result, Err(AudioError::OutputUnavailable(_))), "got {:?}", result);
    assert_eq!(player.state(), PlaybackState::Stopped);
    assert!(!player.has_context());
    assert_eq!(backend.nodes_started(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_engine_recovers_once_output_is_available() {
    let backend = MockBackend::unavailable();
    let mut player = engine(&backend);
    assert!(player.play(tone(1.0)).is_err());

    backend.set_unavailable(false);
    player.play(tone(1.0)).unwrap();
    assert_eq!(player.state(), PlaybackState::Playing);
}

#[tokio::test(start_paused = true)]
async fn test_context_is_opened_once_and_reused() {
    let backend = MockBackend::new();
    let mut player = engine(&backend);

    player.play(tone(0.5)).unwrap();
    player.play(tone(0.5)).unwrap();
    player.stop();
    player.play(tone(0.5)).unwrap();

    assert_eq!(backend.contexts_opened(), 1);
    assert!(player.has_context());
}

#[tokio::test(start_paused = true)]
async fn test_suspended_context_is_resumed_before_play() {
    let backend = MockBackend::new();
    backend.start_suspended(true);
    let mut player = engine(&backend);

    player.play(tone(0.5)).unwrap();

    assert_eq!(backend.resumes(), 1);
    assert_eq!(player.state(), PlaybackState::Playing);
}

#[tokio::test(start_paused = true)]
async fn test_replay_after_natural_end() {
    let backend = MockBackend::new();
    let mut player = engine(&backend);

    player.play(tone(0.5)).unwrap();
    backend.advance(1.0);
    settle().await;
    assert_eq!(player.state(), PlaybackState::Stopped);

    player.play(tone(0.5)).unwrap();
    assert_eq!(player.state(), PlaybackState::Playing);
    assert_eq!(player.position(), 0.0);
    assert_eq!(backend.audible(), vec![12_000]);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_and_drop_close_the_context() {
    let backend = MockBackend::new();

    let mut player = engine(&backend);
    player.play(tone(1.0)).unwrap();
    player.shutdown();
    assert_eq!(backend.contexts_closed(), 1);
    assert!(backend.audible().is_empty());

    {
        let mut dropped = engine(&backend);
        dropped.play(tone(1.0)).unwrap();
    }
    assert_eq!(backend.contexts_closed(), 2, "Dropping the engine should release the device");
}

#[tokio::test(start_paused = true)]
async fn test_engine_without_playback_never_opens_output() {
    let backend = MockBackend::new();
    let player = engine(&backend);
    player.shutdown();
    assert_eq!(backend.contexts_opened(), 0);
    assert_eq!(backend.contexts_closed(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_node_start_failure_reports_output_unavailable() {
    let backend = MockBackend::new();
    backend.set_start_failure(true);
    let mut player = engine(&backend);

    let result = player.play(tone(1.0));

    assert!(matches!(result, Err(AudioError::OutputUnavailable(_))), "got {:?}", result);
    assert_eq!(player.state(), PlaybackState::Stopped);
    assert!(backend.audible().is_empty());

    backend.set_start_failure(false);
    player.play(tone(1.0)).unwrap();
    assert_eq!(backend.contexts_opened(), 1, "The open context is kept after a failed start");
}

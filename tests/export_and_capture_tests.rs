use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageBuffer, ImageOutputFormat, Rgb};
use lumina::audio::wav::write_wav;
use lumina::audio::{decode_pcm, DecodedAudioBuffer, PcmFormat};
use lumina::vision::capture::{MAX_UPLOAD_EDGE, THUMBNAIL_EDGE};
use lumina::vision::{CaptureError, CapturedImage};
use uuid::Uuid;

fn scratch(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("lumina_{}_{}", Uuid::new_v4(), name))
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]));
    let mut out = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageOutputFormat::Png)
        .unwrap();
    out
}

#[test]
fn test_wav_export_preserves_samples() {
    let path = scratch("narration.wav");
    // 0, 32767, -32768, 16384
    let buffer = decode_pcm("AAD/fwCAAEA=", PcmFormat::default()).unwrap();

    write_wav(&buffer, &path).unwrap();

    let mut reader = hound::WavReader::open(&path).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, 24_000);
    assert_eq!(spec.bits_per_sample, 16);
    let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(samples, vec![0, 32767, -32768, 16384]);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_wav_export_clamps_out_of_range_floats() {
    let path = scratch("clamped.wav");
    let buffer = DecodedAudioBuffer::new(vec![1.5, -2.0], PcmFormat::new(2, 16_000));

    write_wav(&buffer, &path).unwrap();

    let mut reader = hound::WavReader::open(&path).unwrap();
    assert_eq!(reader.spec().channels, 2);
    let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(samples, vec![i16::MAX, i16::MIN]);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_small_png_is_uploaded_as_is() {
    let bytes = png(64, 48);
    let image = CapturedImage::from_bytes(Path::new("small.png"), &bytes).unwrap();

    assert_eq!(image.mime_type, "image/png");
    assert!(image.thumbnail.starts_with("data:image/jpeg;base64,"));
    assert!(!image.data.is_empty());
}

#[test]
fn test_large_image_is_scaled_to_jpeg() {
    let bytes = png(MAX_UPLOAD_EDGE + 200, 100);
    let image = CapturedImage::from_bytes(Path::new("wide.png"), &bytes).unwrap();
    assert_eq!(image.mime_type, "image/jpeg");
}

#[test]
fn test_thumbnail_fits_preview_edge() {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use image::GenericImageView;

    let image = CapturedImage::from_bytes(Path::new("p.png"), &png(800, 600)).unwrap();
    let payload = image.thumbnail.trim_start_matches("data:image/jpeg;base64,");
    let preview = image::load_from_memory(&STANDARD.decode(payload).unwrap()).unwrap();
    let (w, h) = preview.dimensions();
    assert!(w.max(h) <= THUMBNAIL_EDGE, "Preview is {}x{}", w, h);
}

#[test]
fn test_missing_file_reports_path() {
    let path = scratch("missing.jpg");
    let err = CapturedImage::load(&path).unwrap_err();
    assert!(matches!(err, CaptureError::Read { .. }));
    assert!(err.to_string().contains("missing.jpg"));
}

#[test]
fn test_non_image_bytes_are_rejected() {
    let err = CapturedImage::from_bytes(Path::new("notes.txt"), b"hello, not an image").unwrap_err();
    assert!(matches!(err, CaptureError::Decode(_)));
}

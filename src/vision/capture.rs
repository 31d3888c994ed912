use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageOutputFormat};
use thiserror::Error;
use tracing::{debug, info};

/// Longest edge sent to the vision model.
pub const MAX_UPLOAD_EDGE: u32 = 1536;
/// Longest edge of the preview kept in history.
pub const THUMBNAIL_EDGE: u32 = 256;

const JPEG_QUALITY: u8 = 85;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unsupported or corrupt image: {0}")]
    Decode(#[from] image::ImageError),
}

/// A photo prepared for upload: base64 payload plus its mime type, and a
/// small preview for the history list.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    pub source: PathBuf,
    pub mime_type: String,
    pub data: String,
    pub thumbnail: String,
}

impl CapturedImage {
    pub fn load(path: &Path) -> Result<Self, CaptureError> {
        let bytes = std::fs::read(path).map_err(|source| CaptureError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(path, &bytes)
    }

    pub fn from_bytes(source: &Path, bytes: &[u8]) -> Result<Self, CaptureError> {
        let format = image::guess_format(bytes)?;
        let img = image::load_from_memory_with_format(bytes, format)?;
        let (width, height) = img.dimensions();

        info!("Captured image {}: {}x{} ({:?})", source.display(), width, height, format);

        // Small images in a web-safe format go up untouched.
        let (mime_type, payload) = match mime_for(format) {
            Some(mime) if width.max(height) <= MAX_UPLOAD_EDGE => (mime.to_string(), bytes.to_vec()),
            _ => {
                debug!("Re-encoding upload to JPEG, max edge {}", MAX_UPLOAD_EDGE);
                let scaled = fit_within(&img, MAX_UPLOAD_EDGE);
                ("image/jpeg".to_string(), encode_jpeg(&scaled)?)
            }
        };

        let preview = encode_jpeg(&img.thumbnail(THUMBNAIL_EDGE, THUMBNAIL_EDGE))?;

        Ok(Self {
            source: source.to_path_buf(),
            mime_type,
            data: STANDARD.encode(payload),
            thumbnail: format!("data:image/jpeg;base64,{}", STANDARD.encode(preview)),
        })
    }
}

fn fit_within(img: &DynamicImage, edge: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    if width.max(height) <= edge {
        img.clone()
    } else {
        img.resize(edge, edge, FilterType::Triangle)
    }
}

fn encode_jpeg(img: &DynamicImage) -> Result<Vec<u8>, CaptureError> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut out = Vec::new();
    rgb.write_to(&mut out, ImageOutputFormat::Jpeg(JPEG_QUALITY))?;
    Ok(out)
}

fn mime_for(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::Png => Some("image/png"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Gif => Some("image/gif"),
        _ => None,
    }
}

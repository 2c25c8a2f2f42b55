use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::RgbImage;
use log::info;
use std::path::PathBuf;
use thiserror::Error;

use crate::constants::{JPEG_QUALITY, TARGET_HEIGHT, TARGET_WIDTH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacingMode {
    /// Front camera
    User,
    Environment,
}

/// Video-only stream request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoConstraints {
    pub width: u32,
    pub height: u32,
    pub facing_mode: FacingMode,
}

impl Default for VideoConstraints {
    fn default() -> Self {
        Self {
            width: TARGET_WIDTH,
            height: TARGET_HEIGHT,
            facing_mode: FacingMode::User,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CameraError {
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("no camera device found")]
    NotFound,
    #[error("camera not ready")]
    NotReady,
    #[error("failed to capture frame: {0}")]
    Frame(String),
}

/// Platform camera
#[allow(async_fn_in_trait)]
pub trait Camera {
    type Stream: MediaStream;

    async fn open(&mut self, constraints: &VideoConstraints) -> Result<Self::Stream, CameraError>;
}

/// A live camera stream
pub trait MediaStream {
    /// Resolution the device actually delivers, when known
    fn native_resolution(&self) -> Option<(u32, u32)>;

    /// Draw the current frame into a raster of the given size
    fn draw_frame(&mut self, width: u32, height: u32) -> Result<RgbImage, CameraError>;

    /// Stop every track of the stream. Safe to call more than once.
    fn stop_tracks(&mut self);
}

/// Raster size for a capture: the stream's resolution, or the target size
pub fn capture_size<S: MediaStream>(stream: &S) -> (u32, u32) {
    match stream.native_resolution() {
        Some((w, h)) if w > 0 && h > 0 => (w, h),
        _ => (TARGET_WIDTH, TARGET_HEIGHT),
    }
}

/// Encode a frame as a JPEG data URI
pub fn encode_data_uri(frame: &RgbImage) -> Result<String, CameraError> {
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
        .encode_image(frame)
        .map_err(|e| CameraError::Frame(e.to_string()))?;
    Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(jpeg)))
}

/// Camera whose "video" is a still image read from disk
#[derive(Debug, Clone)]
pub struct StillImageCamera {
    path: PathBuf,
}

impl StillImageCamera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Camera for StillImageCamera {
    type Stream = StillImageStream;

    async fn open(&mut self, constraints: &VideoConstraints) -> Result<StillImageStream, CameraError> {
        if !self.path.exists() {
            return Err(CameraError::NotFound);
        }
        let path = self.path.clone();
        let frame = tokio::task::spawn_blocking(move || image::open(&path))
            .await
            .map_err(|e| CameraError::Frame(format!("Task join error: {}", e)))?
            .map_err(|e| CameraError::Frame(e.to_string()))?
            .to_rgb8();
        info!(
            "Opened still camera {} ({}x{}, requested {}x{})",
            self.path.display(),
            frame.width(),
            frame.height(),
            constraints.width,
            constraints.height
        );
        Ok(StillImageStream {
            frame,
            live: true,
        })
    }
}

pub struct StillImageStream {
    frame: RgbImage,
    live: bool,
}

impl StillImageStream {
    pub fn is_live(&self) -> bool {
        self.live
    }
}

impl MediaStream for StillImageStream {
    fn native_resolution(&self) -> Option<(u32, u32)> {
        Some(self.frame.dimensions())
    }

    fn draw_frame(&mut self, width: u32, height: u32) -> Result<RgbImage, CameraError> {
        if !self.live {
            return Err(CameraError::NotReady);
        }
        if self.frame.dimensions() == (width, height) {
            return Ok(self.frame.clone());
        }
        Ok(image::imageops::resize(
            &self.frame,
            width,
            height,
            FilterType::Triangle,
        ))
    }

    fn stop_tracks(&mut self) {
        self.live = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    struct UnsizedStream;

    impl MediaStream for UnsizedStream {
        fn native_resolution(&self) -> Option<(u32, u32)> {
            Some((0, 0))
        }
        fn draw_frame(&mut self, width: u32, height: u32) -> Result<RgbImage, CameraError> {
            Ok(RgbImage::new(width, height))
        }
        fn stop_tracks(&mut self) {}
    }

    #[test]
    fn test_capture_size_falls_back_to_target() {
        assert_eq!(capture_size(&UnsizedStream), (640, 480));
    }

    #[test]
    fn test_encode_data_uri_is_jpeg() {
        let frame = RgbImage::from_pixel(32, 24, Rgb([200, 30, 30]));
        let uri = encode_data_uri(&frame).unwrap();
        let payload = uri.strip_prefix("data:image/jpeg;base64,").unwrap();
        let bytes = STANDARD.decode(payload).unwrap();
        // JPEG SOI marker
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[tokio::test]
    async fn test_still_camera_scales_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("selfie.png");
        RgbImage::from_pixel(64, 48, Rgb([10, 120, 200]))
            .save(&path)
            .unwrap();

        let mut camera = StillImageCamera::new(&path);
        let mut stream = camera.open(&VideoConstraints::default()).await.unwrap();
        assert_eq!(capture_size(&stream), (64, 48));
        assert_eq!(stream.draw_frame(32, 24).unwrap().dimensions(), (32, 24));

        stream.stop_tracks();
        stream.stop_tracks();
        assert!(!stream.is_live());
        assert_eq!(stream.draw_frame(64, 48), Err(CameraError::NotReady));
    }

    #[tokio::test]
    async fn test_still_camera_missing_file() {
        let mut camera = StillImageCamera::new("/nonexistent/selfie.png");
        assert_eq!(
            camera.open(&VideoConstraints::default()).await.err(),
            Some(CameraError::NotFound)
        );
    }
}

//! Check-in workflow: camera lifecycle, location, and submission.
//!
//! ```text
//! Idle --start--> Streaming --capture--> Captured --submit--> Submitting --ok--> Submitted
//!  ^                 |                     |  ^                   |                |
//!  +------stop-------+                     |  +------failure------+                |
//!  |                  <------retake--------+                                       |
//!  +----------------------------------take another---------------------------------+
//! ```
//!
//! Every failure is turned into a message held by the controller; nothing is
//! retried on its own. All operations take `&mut self`, so a capture attempt
//! never has two operations in flight.

use chrono::{SecondsFormat, Utc};
use log::{error, info, warn};
use serde_json::Value;

use crate::camera::{capture_size, encode_data_uri, Camera, CameraError, MediaStream, VideoConstraints};
use crate::constants::{generate_user_id, ADDRESS_NOT_AVAILABLE, IP_UNAVAILABLE};
use crate::device::{describe_device, resolve_location, Geolocation, IpLookup, PositionError, ReverseGeocoder};
use crate::error::CaptureError;
use crate::record::{AttendanceRecord, Department, LocationInfo};
use crate::submission::Submitter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// No stream, no image
    Idle,
    /// Camera stream live
    Streaming,
    /// Still frame encoded, stream released
    Captured,
    /// Submission outstanding
    Submitting,
    /// Submission acknowledged
    Submitted,
}

/// Platform services the workflow talks to
pub struct Capabilities<C, G, R, I, S> {
    pub camera: C,
    pub geolocation: G,
    pub geocoder: R,
    pub ip_lookup: I,
    pub submitter: S,
}

pub struct CaptureController<C: Camera, G, R, I, S> {
    caps: Capabilities<C, G, R, I, S>,
    state: CaptureState,
    stream: Option<C::Stream>,
    captured_image: Option<String>,
    location_info: Option<LocationInfo>,
    location_error: Option<String>,
    location_loading: bool,
    ip_address: Option<String>,
    user_id: String,
    department: Option<Department>,
    error: Option<String>,
    success: bool,
    device: String,
}

impl<C, G, R, I, S> CaptureController<C, G, R, I, S>
where
    C: Camera,
    G: Geolocation,
    R: ReverseGeocoder,
    I: IpLookup,
    S: Submitter,
{
    pub fn new(caps: Capabilities<C, G, R, I, S>, user_agent: &str) -> Self {
        Self {
            caps,
            state: CaptureState::Idle,
            stream: None,
            captured_image: None,
            location_info: None,
            location_error: None,
            location_loading: false,
            ip_address: None,
            user_id: generate_user_id(),
            department: None,
            error: None,
            success: false,
            device: describe_device(user_agent),
        }
    }

    /// Resolve the public IP and the location side by side. Their results
    /// are independent; a failed location is reported, a failed IP lookup
    /// degrades to the fallback value.
    pub async fn initialize(&mut self) {
        self.location_loading = true;
        self.location_error = None;

        let (ip, location) = tokio::join!(
            self.caps.ip_lookup.public_ip(),
            resolve_location(&self.caps.geolocation, &self.caps.geocoder)
        );

        self.ip_address = Some(ip);
        self.location_loading = false;
        if let Err(e) = self.apply_location(location) {
            info!("Starting without a location: {}", e);
        }
    }

    /// Look up the public IP again; failure stores the fallback value
    pub async fn resolve_ip(&mut self) {
        let ip = self.caps.ip_lookup.public_ip().await;
        self.ip_address = Some(ip);
    }

    /// Ask for a fresh fix. Success replaces any earlier location; failure
    /// leaves it in place and records the reason.
    pub async fn request_location(&mut self) -> Result<(), CaptureError> {
        self.location_loading = true;
        self.location_error = None;
        let result = resolve_location(&self.caps.geolocation, &self.caps.geocoder).await;
        self.location_loading = false;
        self.apply_location(result)
    }

    fn apply_location(&mut self, result: Result<LocationInfo, PositionError>) -> Result<(), CaptureError> {
        match result {
            Ok(info) => {
                self.location_info = Some(info);
                Ok(())
            }
            Err(e) => {
                warn!("Geolocation error: {:?}", e);
                let err = CaptureError::from(e);
                self.location_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    pub async fn start_camera(&mut self) -> Result<(), CaptureError> {
        if self.state != CaptureState::Idle {
            return Err(CaptureError::InvalidState(self.state));
        }
        self.error = None;

        info!("Requesting camera access...");
        match self.caps.camera.open(&VideoConstraints::default()).await {
            Ok(stream) => {
                info!("Camera access granted");
                self.stream = Some(stream);
                self.state = CaptureState::Streaming;
                self.success = false;
                Ok(())
            }
            Err(e) => {
                error!("Camera error: {}", e);
                let err = match e {
                    CameraError::NotFound => CaptureError::from(e),
                    _ => CaptureError::from(CameraError::PermissionDenied),
                };
                Err(self.surface(err))
            }
        }
    }

    /// Freeze the current frame. The stream is released only after the
    /// frame is encoded; on failure the stream stays live.
    pub fn capture(&mut self) -> Result<(), CaptureError> {
        if self.state != CaptureState::Streaming {
            return Err(self.surface(CameraError::NotReady.into()));
        }
        let grabbed = self.stream.as_mut().map(|stream| {
            let (width, height) = capture_size(&*stream);
            stream
                .draw_frame(width, height)
                .and_then(|frame| encode_data_uri(&frame))
                .map(|image| (image, width, height))
        });

        match grabbed.unwrap_or(Err(CameraError::NotReady)) {
            Ok((image, width, height)) => {
                info!("Image captured ({}x{}) and encoded as base64", width, height);
                self.captured_image = Some(image);
                self.release_stream();
                self.state = CaptureState::Captured;
                Ok(())
            }
            Err(e) => {
                error!("Capture failed: {}", e);
                Err(self.surface(e.into()))
            }
        }
    }

    /// Release the camera. Safe to call without a stream.
    pub fn stop_camera(&mut self) {
        self.release_stream();
        if self.state == CaptureState::Streaming {
            self.state = CaptureState::Idle;
        }
    }

    fn release_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop_tracks();
        }
    }

    /// Discard the captured image and go straight back to streaming
    pub async fn retake(&mut self) -> Result<(), CaptureError> {
        if self.state != CaptureState::Captured {
            return Err(CaptureError::InvalidState(self.state));
        }
        self.captured_image = None;
        self.state = CaptureState::Idle;
        self.start_camera().await
    }

    pub fn select_department(&mut self, department: Option<Department>) {
        self.department = department;
    }

    pub fn set_user_id(&mut self, user_id: impl Into<String>) {
        self.user_id = user_id.into();
    }

    pub fn can_submit(&self) -> bool {
        self.state == CaptureState::Captured
    }

    /// Send the captured check-in. Outside `Captured` this does nothing.
    /// Validation failures never reach the network; any failure keeps the
    /// captured image so the user can resubmit.
    pub async fn submit(&mut self) -> Result<Value, CaptureError> {
        if !self.can_submit() {
            return Err(CaptureError::InvalidState(self.state));
        }

        let (image, department) = match (self.captured_image.as_deref(), self.department) {
            (Some(image), Some(department)) if !image.is_empty() => (image.to_string(), department),
            _ => {
                return Err(self.surface(CaptureError::Validation(
                    "Please select a department before submitting".to_string(),
                )))
            }
        };
        let location = match self.location_info.as_ref() {
            Some(location) => location,
            None => {
                return Err(self.surface(CaptureError::Validation(
                    "Location is required. Please allow location access and try again.".to_string(),
                )))
            }
        };

        let record = AttendanceRecord {
            id: self.user_id.clone(),
            image_url: image,
            department: department.submitted_value(),
            location: location.coordinates(),
            location_address: location
                .address
                .clone()
                .unwrap_or_else(|| ADDRESS_NOT_AVAILABLE.to_string()),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            ip_address: self
                .ip_address
                .clone()
                .unwrap_or_else(|| IP_UNAVAILABLE.to_string()),
        };

        self.state = CaptureState::Submitting;
        self.error = None;

        match self.caps.submitter.submit(&record).await {
            Ok(body) => {
                info!("Attendance submitted successfully for {}", record.id);
                self.success = true;
                self.captured_image = None;
                self.state = CaptureState::Submitted;
                Ok(body)
            }
            Err(e) => {
                error!("Submission failed: {:?}", e);
                self.state = CaptureState::Captured;
                Err(self.surface(e.into()))
            }
        }
    }

    /// Start over after a successful check-in with a fresh user id
    pub fn take_another(&mut self) -> Result<(), CaptureError> {
        if self.state != CaptureState::Submitted {
            return Err(CaptureError::InvalidState(self.state));
        }
        self.user_id = generate_user_id();
        self.success = false;
        self.error = None;
        self.state = CaptureState::Idle;
        Ok(())
    }

    fn surface(&mut self, err: CaptureError) -> CaptureError {
        self.error = Some(err.to_string());
        err
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn captured_image(&self) -> Option<&str> {
        self.captured_image.as_deref()
    }

    pub fn location_info(&self) -> Option<&LocationInfo> {
        self.location_info.as_ref()
    }

    pub fn location_error(&self) -> Option<&str> {
        self.location_error.as_deref()
    }

    pub fn is_location_loading(&self) -> bool {
        self.location_loading
    }

    /// Last workflow error shown to the user
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn ip_address(&self) -> Option<&str> {
        self.ip_address.as_deref()
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn department(&self) -> Option<Department> {
        self.department
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn device(&self) -> &str {
        &self.device
    }
}

impl<C: Camera, G, R, I, S> Drop for CaptureController<C, G, R, I, S> {
    fn drop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop_tracks();
        }
    }
}

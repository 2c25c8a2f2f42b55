// Library interface for the CLI and tests

pub mod camera;
pub mod capture;
pub mod config;
pub mod constants;
pub mod credentials;
pub mod dashboard;
pub mod device;
pub mod error;
pub mod record;
pub mod remote;
pub mod serve;
pub mod session;
pub mod submission;

pub use capture::{Capabilities, CaptureController, CaptureState};
pub use error::{CaptureError, HttpFailure};
pub use record::{AttendanceRecord, Department, LocationInfo};

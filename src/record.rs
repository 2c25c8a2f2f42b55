use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::constants::REQUIRED_FIELDS;

/// Departments a user can check in for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Department {
    Engineering,
    Marketing,
    Sales,
    #[value(name = "hr")]
    HR,
    Finance,
}

impl Department {
    pub const ALL: [Department; 5] = [
        Department::Engineering,
        Department::Marketing,
        Department::Sales,
        Department::HR,
        Department::Finance,
    ];

    /// Label shown in the department picker
    pub fn label(&self) -> &'static str {
        match self {
            Department::Engineering => "Engineering",
            Department::Marketing => "Marketing",
            Department::Sales => "Sales",
            Department::HR => "HR",
            Department::Finance => "Finance",
        }
    }

    /// Value sent to the gateway: the label, lower-cased
    pub fn submitted_value(&self) -> String {
        self.label().to_lowercase()
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One check-in as sent to the gateway and stored remotely
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: String,
    /// Base64 JPEG data URI of the captured selfie
    pub image_url: String,
    pub department: String,
    /// "<latitude>, <longitude>"
    pub location: String,
    pub location_address: String,
    /// ISO-8601 UTC instant
    pub timestamp: String,
    pub ip_address: String,
}

impl AttendanceRecord {
    /// Copy of the record safe to log: the image is cut to its first 50 chars
    pub fn for_log(&self) -> AttendanceRecord {
        AttendanceRecord {
            image_url: truncate_image(&self.image_url),
            ..self.clone()
        }
    }
}

/// Result of one geolocation request. Replaced wholesale on every retry.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationInfo {
    pub latitude: f64,
    pub longitude: f64,
    /// Accuracy radius in meters
    pub accuracy: f64,
    pub address: Option<String>,
}

impl LocationInfo {
    pub fn coordinates(&self) -> String {
        format_location(self.latitude, self.longitude)
    }
}

pub fn format_location(latitude: f64, longitude: f64) -> String {
    format!("{}, {}", latitude, longitude)
}

pub(crate) fn truncate_image(image_url: &str) -> String {
    if image_url.is_empty() {
        return "No image".to_string();
    }
    let head: String = image_url.chars().take(50).collect();
    format!("{}...[truncated]", head)
}

/// Falsy in the sense the gateway validation uses: null, false, 0, NaN and ""
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f == 0.0 || f.is_nan()),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Required fields absent or falsy in `body`, in the fixed field order.
/// A body that is not a JSON object is missing every field.
pub fn missing_fields(body: &Value) -> Vec<&'static str> {
    REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| body.get(field).map_or(true, is_falsy))
        .collect()
}

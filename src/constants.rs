use rand::Rng;
use std::time::Duration;

/// Fields the gateway requires on every submitted record, in reporting order
pub const REQUIRED_FIELDS: [&str; 7] = [
    "id",
    "image_url",
    "department",
    "location",
    "location_address",
    "timestamp",
    "ip_address",
];

/// Stored in place of the public IP when the echo service cannot be reached
pub const IP_UNAVAILABLE: &str = "Unable to fetch IP";

/// Reverse geocoding answered but without both city and country
pub const ADDRESS_NOT_AVAILABLE: &str = "Address not available";

/// Reverse geocoding request or response parsing failed
pub const ADDRESS_LOOKUP_FAILED: &str = "Address lookup failed";

/// Key under which the login session is kept in the client key-value store
pub const SESSION_STORAGE_KEY: &str = "attendance_auth_session";

pub const DEFAULT_IP_ECHO_URL: &str = "https://api.ipify.org?format=json";
pub const DEFAULT_REVERSE_GEOCODE_URL: &str =
    "https://api.bigdatacloud.net/data/reverse-geocode-client";

/// Gateway route used for both reading and writing records
pub const ATTENDANCE_PATH: &str = "/api/attendance";

/// Upper bound for submission and relay requests
pub const SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound for a geolocation fix
pub const GEOLOCATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Cached positions younger than this are accepted
pub const GEOLOCATION_MAX_AGE: Duration = Duration::from_secs(60);

/// Requested capture resolution, also the raster fallback when the stream has none
pub const TARGET_WIDTH: u32 = 640;
pub const TARGET_HEIGHT: u32 = 480;

/// JPEG quality for captured stills (0.8 on a 0..1 scale)
pub const JPEG_QUALITY: u8 = 80;

/// Generate a client-side user id: "USR" followed by up to four digits.
/// Not collision safe; two devices can pick the same id.
pub fn generate_user_id() -> String {
    format!("USR{}", rand::thread_rng().gen_range(0..10000))
}

//! Contextual values a check-in needs besides the photo: public IP, position,
//! a readable address for the position, and a device description.

use log::{info, warn};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::constants::{
    ADDRESS_LOOKUP_FAILED, ADDRESS_NOT_AVAILABLE, GEOLOCATION_MAX_AGE, GEOLOCATION_TIMEOUT,
    IP_UNAVAILABLE,
};
use crate::record::LocationInfo;

/// Options for a one-shot position request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionOptions {
    pub enable_high_accuracy: bool,
    /// How long to wait for a fix
    pub timeout: Duration,
    /// Cached positions up to this age are acceptable
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            enable_high_accuracy: true,
            timeout: GEOLOCATION_TIMEOUT,
            maximum_age: GEOLOCATION_MAX_AGE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
}

/// Why a position could not be obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("Location access denied. Please allow location permissions.")]
    PermissionDenied,
    #[error("Location access denied. Location information unavailable.")]
    PositionUnavailable,
    #[error("Location access denied. Location request timed out.")]
    Timeout,
    #[error("Location access denied. Unknown location error.")]
    Unknown,
    #[error("Geolocation is not supported by this browser")]
    Unsupported,
}

impl PositionError {
    /// Map a platform error code (1 = denied, 2 = unavailable, 3 = timeout)
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => PositionError::PermissionDenied,
            2 => PositionError::PositionUnavailable,
            3 => PositionError::Timeout,
            _ => PositionError::Unknown,
        }
    }
}

/// Platform location service
#[allow(async_fn_in_trait)]
pub trait Geolocation {
    async fn current_position(&self, options: &PositionOptions)
        -> Result<Position, PositionError>;
}

/// Coordinates -> human readable locality. Never fails: failures become sentinels.
#[allow(async_fn_in_trait)]
pub trait ReverseGeocoder {
    async fn locality(&self, latitude: f64, longitude: f64) -> String;
}

/// Public IP of this client. Never fails: failures become the sentinel.
#[allow(async_fn_in_trait)]
pub trait IpLookup {
    async fn public_ip(&self) -> String;
}

/// Position taken from configuration rather than a sensor
#[derive(Debug, Clone)]
pub struct FixedGeolocation {
    position: Option<Position>,
    /// Simulated time to obtain a fix
    fix_delay: Duration,
}

impl FixedGeolocation {
    pub fn new(latitude: f64, longitude: f64, accuracy: f64) -> Self {
        Self {
            position: Some(Position {
                latitude,
                longitude,
                accuracy,
            }),
            fix_delay: Duration::ZERO,
        }
    }

    /// A provider that never has a position to give
    pub fn unavailable() -> Self {
        Self {
            position: None,
            fix_delay: Duration::ZERO,
        }
    }

    pub fn with_fix_delay(mut self, fix_delay: Duration) -> Self {
        self.fix_delay = fix_delay;
        self
    }
}

impl Geolocation for FixedGeolocation {
    async fn current_position(
        &self,
        options: &PositionOptions,
    ) -> Result<Position, PositionError> {
        let fix = async {
            tokio::time::sleep(self.fix_delay).await;
            self.position.ok_or(PositionError::PositionUnavailable)
        };
        match tokio::time::timeout(options.timeout, fix).await {
            Ok(result) => result,
            Err(_) => Err(PositionError::Timeout),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IpEcho {
    ip: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Locality {
    city: Option<String>,
    country_name: Option<String>,
}

/// IP lookup through a public echo service answering `{ "ip": "..." }`
#[derive(Debug, Clone)]
pub struct HttpIpLookup {
    client: Client,
    url: String,
}

impl HttpIpLookup {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    async fn fetch(&self) -> Result<String, reqwest::Error> {
        let echo: IpEcho = self.client.get(&self.url).send().await?.json().await?;
        Ok(echo.ip)
    }
}

impl IpLookup for HttpIpLookup {
    async fn public_ip(&self) -> String {
        match self.fetch().await {
            Ok(ip) => ip,
            Err(e) => {
                warn!("IP lookup via {} failed: {}", self.url, e);
                IP_UNAVAILABLE.to_string()
            }
        }
    }
}

/// Reverse geocoding through a service answering `{ "city": .., "countryName": .. }`
#[derive(Debug, Clone)]
pub struct HttpReverseGeocoder {
    client: Client,
    url: String,
}

impl HttpReverseGeocoder {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    async fn fetch(&self, latitude: f64, longitude: f64) -> Result<Locality, reqwest::Error> {
        self.client
            .get(&self.url)
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("localityLanguage", "en".to_string()),
            ])
            .send()
            .await?
            .json()
            .await
    }
}

impl ReverseGeocoder for HttpReverseGeocoder {
    async fn locality(&self, latitude: f64, longitude: f64) -> String {
        match self.fetch(latitude, longitude).await {
            Ok(locality) => compose_address(&locality),
            Err(e) => {
                warn!("Reverse geocoding failed: {}", e);
                ADDRESS_LOOKUP_FAILED.to_string()
            }
        }
    }
}

fn compose_address(locality: &Locality) -> String {
    match (locality.city.as_deref(), locality.country_name.as_deref()) {
        (Some(city), Some(country)) if !city.is_empty() && !country.is_empty() => {
            format!("{}, {}", city, country)
        }
        _ => ADDRESS_NOT_AVAILABLE.to_string(),
    }
}

/// One-shot fix followed by reverse geocoding. The returned info always
/// carries an address, possibly a sentinel.
pub async fn resolve_location<G, R>(
    geolocation: &G,
    geocoder: &R,
) -> Result<LocationInfo, PositionError>
where
    G: Geolocation,
    R: ReverseGeocoder,
{
    let position = geolocation
        .current_position(&PositionOptions::default())
        .await?;
    info!(
        "Location obtained: {}, {}",
        position.latitude, position.longitude
    );

    let address = geocoder
        .locality(position.latitude, position.longitude)
        .await;

    Ok(LocationInfo {
        latitude: position.latitude,
        longitude: position.longitude,
        accuracy: position.accuracy,
        address: Some(address),
    })
}

const BROWSER_TOKENS: [(&str, &str); 4] = [
    ("Chrome", "Chrome"),
    ("Safari", "Safari"),
    ("Firefox", "Firefox"),
    ("Edge", "Edge"),
];

const OS_TOKENS: [(&str, &str); 5] = [
    ("Win", "Windows"),
    ("Mac", "macOS"),
    ("Linux", "Linux"),
    ("Android", "Android"),
    ("iOS", "iOS"),
];

fn first_match(user_agent: &str, tokens: &[(&str, &'static str)]) -> &'static str {
    tokens
        .iter()
        .find(|(token, _)| user_agent.contains(token))
        .map(|(_, name)| *name)
        .unwrap_or("Unknown")
}

/// "Browser / OS" from a user-agent string, first listed token wins
pub fn describe_device(user_agent: &str) -> String {
    format!(
        "{} / {}",
        first_match(user_agent, &BROWSER_TOKENS),
        first_match(user_agent, &OS_TOKENS)
    )
}

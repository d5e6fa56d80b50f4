//! IP geolocation against an offline MaxMind-format city database
//!
//! A lookup that finds nothing is an explicit empty result: no geo field is
//! produced for the pod in that pass.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::Path;

use maxminddb::{MaxMindDBError, Reader, geoip2};
use tracing::{debug, info, instrument, warn};

/// Sentinel stored as city when the database knows none
pub const UNKNOWN_CITY: &str = "null";

/// Raw location data for one address
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoRecord {
    pub country: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Location of a pod, ready to be persisted
#[derive(Debug, Clone, PartialEq)]
pub struct GeoResult {
    pub country: Option<String>,
    /// City name or [`UNKNOWN_CITY`]
    pub city: String,
    pub region: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Human readable summary stored as the pod's whois
    pub summary: String,
}

#[derive(Debug)]
pub enum GeoError {
    /// The database file could not be opened or read
    Open(String),
}

impl std::fmt::Display for GeoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeoError::Open(msg) => write!(f, "failed to open geo database: {msg}"),
        }
    }
}

impl std::error::Error for GeoError {}

/// Source of location data for IP addresses
pub trait GeoLocator: Send + Sync {
    fn lookup(&self, ip: IpAddr) -> Option<GeoRecord>;
}

/// [`GeoLocator`] backed by a city database loaded once at start-up
pub struct MaxMindLocator {
    reader: Reader<Vec<u8>>,
}

impl MaxMindLocator {
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GeoError> {
        let reader = Reader::open_readfile(path.as_ref()).map_err(|e| GeoError::Open(e.to_string()))?;
        info!("loaded geo database ({})", reader.metadata.database_type);
        Ok(Self { reader })
    }
}

impl GeoLocator for MaxMindLocator {
    fn lookup(&self, ip: IpAddr) -> Option<GeoRecord> {
        let city: geoip2::City = match self.reader.lookup(ip) {
            Ok(city) => city,
            Err(MaxMindDBError::AddressNotFoundError(_)) => {
                debug!("{ip} not found in geo database");
                return None;
            }
            Err(e) => {
                warn!("geo lookup for {ip} failed: {e}");
                return None;
            }
        };

        let (latitude, longitude) = city
            .location
            .as_ref()
            .map(|location| (location.latitude, location.longitude))
            .unwrap_or((None, None));

        Some(GeoRecord {
            country: english(city.country.and_then(|country| country.names)),
            city: english(city.city.and_then(|city| city.names)),
            region: english(
                city.subdivisions
                    .and_then(|subdivisions| subdivisions.into_iter().next())
                    .and_then(|subdivision| subdivision.names),
            ),
            latitude,
            longitude,
        })
    }
}

fn english(names: Option<BTreeMap<&str, &str>>) -> Option<String> {
    names.and_then(|names| names.get("en").map(|name| name.to_string()))
}

/// [`GeoLocator`] used when no database is configured
pub struct DisabledLocator;

impl GeoLocator for DisabledLocator {
    fn lookup(&self, _ip: IpAddr) -> Option<GeoRecord> {
        None
    }
}

/// Locate an address given as text
///
/// Empty or unparsable addresses and unknown addresses yield `None`.
pub fn locate(locator: &dyn GeoLocator, ip: &str) -> Option<GeoResult> {
    let ip: IpAddr = ip.trim().parse().ok()?;
    let record = locator.lookup(ip)?;

    let summary = format!(
        "Country: {}\n Lat:{} Long:{}",
        record.country.as_deref().unwrap_or(""),
        record.latitude.map(|lat| lat.to_string()).unwrap_or_default(),
        record.longitude.map(|long| long.to_string()).unwrap_or_default()
    );

    Some(GeoResult {
        city: record
            .city
            .filter(|city| !city.is_empty())
            .unwrap_or_else(|| UNKNOWN_CITY.to_string()),
        country: record.country,
        region: record.region,
        latitude: record.latitude,
        longitude: record.longitude,
        summary,
    })
}

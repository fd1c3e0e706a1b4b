/// Core data types for the quakeledger catalog query service.
///
/// This module defines the shared domain model imported by all other modules:
/// catalog events, hazard-grid sites, disaggregation bins, and the error
/// types raised by each layer. It contains no I/O.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// The kind of rupture a catalog row describes, as stored in `events.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Observed,
    Stochastic,
    Expert,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Observed => "observed",
            EventType::Stochastic => "stochastic",
            EventType::Expert => "expert",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "observed" => Ok(EventType::Observed),
            "stochastic" => Ok(EventType::Stochastic),
            "expert" => Ok(EventType::Expert),
            other => Err(CatalogError::InvalidRow(format!("unknown event type '{}'", other))),
        }
    }
}

/// The `etype` a caller asks for. `Deaggregation` reads stochastic events
/// and replaces them with one representative per occupied disaggregation bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Observed,
    Expert,
    Stochastic,
    Deaggregation,
}

impl QueryType {
    /// The catalog type the query reads from.
    pub fn catalog_type(&self) -> EventType {
        match self {
            QueryType::Observed => EventType::Observed,
            QueryType::Expert => EventType::Expert,
            QueryType::Stochastic | QueryType::Deaggregation => EventType::Stochastic,
        }
    }

    pub fn needs_deaggregation(&self) -> bool {
        matches!(self, QueryType::Deaggregation)
    }
}

impl FromStr for QueryType {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "observed" => Ok(QueryType::Observed),
            "expert" => Ok(QueryType::Expert),
            "stochastic" => Ok(QueryType::Stochastic),
            "deaggregation" => Ok(QueryType::Deaggregation),
            other => Err(QueryError::UnknownEventType(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Event record
// ---------------------------------------------------------------------------

/// Origin time of an event. Historical and synthetic events frequently
/// lack some components, so each one is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OriginTime {
    pub year: Option<i32>,
    pub month: Option<i32>,
    pub day: Option<i32>,
    pub hour: Option<i32>,
    pub minute: Option<i32>,
    pub second: Option<f64>,
    /// Seconds.
    pub uncertainty: Option<f64>,
}

/// Horizontal location error ellipse, km.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HorizontalUncertainty {
    pub horizontal: Option<f64>,
    pub min_horizontal: Option<f64>,
    pub max_horizontal: Option<f64>,
    /// Degrees from north.
    pub azimuth_max_horizontal: Option<f64>,
}

/// Strike/dip/rake of the first nodal plane, degrees.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocalMechanism {
    pub strike: Option<f64>,
    pub strike_uncertainty: Option<f64>,
    pub dip: Option<f64>,
    pub dip_uncertainty: Option<f64>,
    pub rake: Option<f64>,
    pub rake_uncertainty: Option<f64>,
}

impl FocalMechanism {
    pub fn is_empty(&self) -> bool {
        self.strike.is_none() && self.dip.is_none() && self.rake.is_none()
    }
}

/// A single rupture from the `events` relation.
///
/// `probability` is the annual rate of occurrence as stored in the catalog.
/// After disaggregation matching it carries the probability of exceedance
/// of the bin the event represents instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,
    #[serde(default)]
    pub agency: Option<String>,
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub time: OriginTime,
    pub longitude: f64,
    #[serde(default)]
    pub longitude_uncertainty: Option<f64>,
    pub latitude: f64,
    #[serde(default)]
    pub latitude_uncertainty: Option<f64>,
    #[serde(default)]
    pub horizontal: HorizontalUncertainty,
    /// km, positive down.
    pub depth: f64,
    #[serde(default)]
    pub depth_uncertainty: Option<f64>,
    /// Moment magnitude.
    pub magnitude: f64,
    #[serde(default)]
    pub magnitude_uncertainty: Option<f64>,
    #[serde(default)]
    pub mechanism: FocalMechanism,
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub probability: Option<f64>,
}

// ---------------------------------------------------------------------------
// Hazard grid types
// ---------------------------------------------------------------------------

/// A node of the precomputed hazard-disaggregation grid (`sites` relation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub sid: i64,
    pub lon: f64,
    pub lat: f64,
}

/// One cell of a mean disaggregation result (`mean_disagg` relation).
///
/// `lon`, `lat`, and `mag` are bin centers; `poe` is the contribution of the
/// bin to the exceedance probability `poe50y` at site `sid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisaggregationBin {
    pub sid: i64,
    pub poe50y: f64,
    pub lon: f64,
    pub lat: f64,
    pub mag: f64,
    pub poe: f64,
}

/// Bin widths of a disaggregation grid on each axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Precision {
    pub lon: f64,
    pub lat: f64,
    pub mag: f64,
}

impl Precision {
    /// Used when no disaggregation is involved; widening by it is a no-op.
    pub const ZERO: Precision = Precision { lon: 0.0, lat: 0.0, mag: 0.0 };
}

/// Grid axis of a disaggregation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Longitude,
    Latitude,
    Magnitude,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Longitude => write!(f, "Lon"),
            Axis::Latitude => write!(f, "Lat"),
            Axis::Magnitude => write!(f, "Mag"),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised by a catalog gateway.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("database error: {0}")]
    Database(#[from] postgres::Error),
    #[error("fixture error: {0}")]
    Fixture(String),
    #[error("invalid catalog row: {0}")]
    InvalidRow(String),
}

/// Errors raised while analysing or matching a disaggregation result.
#[derive(Debug, Error, PartialEq)]
pub enum DeaggError {
    #[error("disaggregation result is empty")]
    EmptyResult,
    /// A single-value axis has no minimal gap, so no bin width can be inferred.
    #[error("axis {axis} has {distinct} distinct value(s); at least two are needed to infer a bin width")]
    DegenerateAxis { axis: Axis, distinct: usize },
    #[error("axis {axis} has a bin width that rounds to zero")]
    ZeroPrecision { axis: Axis },
    #[error("axis {axis} contains a non-finite grid value")]
    NonFinite { axis: Axis },
}

/// Errors raised by the event query pipeline.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("unknown event type '{0}' (expected observed, expert, stochastic or deaggregation)")]
    UnknownEventType(String),
    #[error("deaggregation queries need a target longitude and latitude")]
    MissingTarget,
    #[error("site table is empty; cannot resolve nearest site")]
    NoSites,
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Deagg(#[from] DeaggError),
}

/// Errors raised while writing or reading QuakeML documents.
#[derive(Debug, Error)]
pub enum QuakeMlError {
    #[error("xml error: {0}")]
    Xml(String),
    #[error("missing element '{element}' in event '{event}'")]
    MissingElement { event: String, element: String },
    #[error("invalid value '{value}' for '{element}'")]
    InvalidValue { element: String, value: String },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while loading the service configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("failed to parse config {path}: {source}")]
    Parse { path: String, source: toml::de::Error },
    #[error("no database url configured (set [database] url or DATABASE_URL)")]
    MissingDatabaseUrl,
    #[error("unknown log level '{0}'")]
    LogLevel(String),
}

/// Errors raised while importing rupture exports.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("rupture file has no header line")]
    MissingHeader,
    #[error("rupture file is missing column '{0}'")]
    MissingColumn(String),
    #[error("line {line}: invalid value '{value}' in column '{column}'")]
    InvalidValue { line: usize, column: String, value: String },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

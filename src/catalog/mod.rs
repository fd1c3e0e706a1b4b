/// Read access to the event catalog.
///
/// The catalog holds three relations: `events`, `sites`, and `mean_disagg`.
/// The query pipeline only ever reads from it through [`CatalogGateway`],
/// so the same engine runs against the Postgres store in production and an
/// in-memory snapshot in tests and offline runs.
///
/// Submodules:
/// - `memory`   — `MemoryCatalog`, a snapshot held in memory (TOML fixtures).
/// - `postgres` — `PostgresCatalog`, the blocking Postgres gateway.

pub mod memory;
pub mod postgres;

pub use memory::MemoryCatalog;
pub use self::postgres::{with_catalog, PostgresCatalog};

use crate::model::{CatalogError, DisaggregationBin, Event, EventType, Site};

// ---------------------------------------------------------------------------
// Filter types
// ---------------------------------------------------------------------------

/// Inclusive longitude/latitude/depth box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialBounds {
    pub lonmin: f64,
    pub lonmax: f64,
    pub latmin: f64,
    pub latmax: f64,
    pub zmin: f64,
    pub zmax: f64,
}

impl SpatialBounds {
    pub fn contains(&self, event: &Event) -> bool {
        event.longitude >= self.lonmin
            && event.longitude <= self.lonmax
            && event.latitude >= self.latmin
            && event.latitude <= self.latmax
            && event.depth >= self.zmin
            && event.depth <= self.zmax
    }

    /// Grows the horizontal extent by `lon`/`lat` on each side. Depth is kept.
    pub fn widened(&self, lon: f64, lat: f64) -> SpatialBounds {
        SpatialBounds {
            lonmin: self.lonmin - lon,
            lonmax: self.lonmax + lon,
            latmin: self.latmin - lat,
            latmax: self.latmax + lat,
            ..*self
        }
    }
}

/// Inclusive magnitude range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MagnitudeRange {
    pub min: f64,
    pub max: f64,
}

impl MagnitudeRange {
    pub fn contains(&self, event: &Event) -> bool {
        event.magnitude >= self.min && event.magnitude <= self.max
    }

    pub fn widened(&self, by: f64) -> MagnitudeRange {
        MagnitudeRange {
            min: self.min - by,
            max: self.max + by,
        }
    }
}

/// Predicate for an `events` read.
#[derive(Debug, Clone, PartialEq)]
pub struct EventFilter {
    pub event_type: EventType,
    /// Keep only events whose `probability` is strictly greater than this.
    /// Events without a probability never pass.
    pub min_probability: Option<f64>,
    pub bounds: Option<SpatialBounds>,
    pub magnitude: Option<MagnitudeRange>,
}

impl EventFilter {
    pub fn of_type(event_type: EventType) -> Self {
        Self {
            event_type,
            min_probability: None,
            bounds: None,
            magnitude: None,
        }
    }

    pub fn matches(&self, event: &Event) -> bool {
        event.event_type == self.event_type
            && self
                .min_probability
                .is_none_or(|min| event.probability.is_some_and(|p| p > min))
            && self.bounds.is_none_or(|b| b.contains(event))
            && self.magnitude.is_none_or(|m| m.contains(event))
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// Read contract of the catalog store.
///
/// Each call is an all-or-nothing snapshot read: it returns every matching
/// row or fails. Retrying is left to the implementation's caller.
pub trait CatalogGateway {
    /// Events matching `filter`, highest magnitude first, catalog row order
    /// breaking ties.
    fn events(&mut self, filter: &EventFilter) -> Result<Vec<Event>, CatalogError>;

    /// The full site table in catalog row order.
    fn sites(&mut self) -> Result<Vec<Site>, CatalogError>;

    /// All bins of the disaggregation result for `sid` at `poe50y`, in
    /// catalog row order. Zero-`poe` bins are included.
    fn disaggregation_bins(&mut self, sid: i64, poe50y: f64) -> Result<Vec<DisaggregationBin>, CatalogError>;
}

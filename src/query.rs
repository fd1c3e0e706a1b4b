/// Event query pipeline.
///
/// Narrows the catalog to the events a caller asked for:
///
/// 1. longitude bounds given in 0-360° form are normalized to ±180°
/// 2. events are read by type (and rate, for `stochastic`)
/// 3. for `deaggregation`, the nearest site's disaggregation result replaces
///    the candidates with one representative per occupied bin
/// 4. spatial, depth, and magnitude bounds are applied (inclusive)
/// 5. the result is ordered by magnitude, highest first
/// 6. an optional event limit keeps the first N
///
/// The read in step 2 is widened by the disaggregation bin widths so that
/// events just outside the box still take part in binning; step 4 then
/// applies the exact bounds to the representatives' own coordinates.

use crate::catalog::{CatalogGateway, EventFilter, MagnitudeRange, SpatialBounds};
use crate::deagg::{infer_precision, DeaggregationSampler, DEFAULT_SEED};
use crate::logging::{self, Component};
use crate::model::{DisaggregationBin, Event, Precision, QueryError, QueryType, Site};
use crate::sites;

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

/// The externally observable request shape.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParams {
    pub lonmin: f64,
    pub lonmax: f64,
    pub latmin: f64,
    pub latmax: f64,
    pub mmin: f64,
    pub mmax: f64,
    pub zmin: f64,
    pub zmax: f64,
    /// Rate threshold for `stochastic`, exceedance-probability tier
    /// (`poe50y`) for `deaggregation`, unused otherwise.
    pub probability: f64,
    pub etype: QueryType,
    /// (lon, lat) of the site of interest; required for `deaggregation`.
    pub target: Option<(f64, f64)>,
    /// Keep only the N highest-magnitude events. `None` keeps all.
    pub num_events: Option<usize>,
}

impl QueryParams {
    /// Spatial bounds with longitudes normalized to ±180°.
    pub fn bounds(&self) -> SpatialBounds {
        SpatialBounds {
            lonmin: normalize_longitude(self.lonmin),
            lonmax: normalize_longitude(self.lonmax),
            latmin: self.latmin,
            latmax: self.latmax,
            zmin: self.zmin,
            zmax: self.zmax,
        }
    }

    pub fn magnitude(&self) -> MagnitudeRange {
        MagnitudeRange {
            min: self.mmin,
            max: self.mmax,
        }
    }
}

// ---------------------------------------------------------------------------
// Filter stages
// ---------------------------------------------------------------------------

/// Converts a longitude given in 0-360° form to ±180°. Values at or below
/// 180° are returned unchanged.
pub fn normalize_longitude(lon: f64) -> f64 {
    if lon > 180.0 { lon - 360.0 } else { lon }
}

/// Catalog predicate for the type stage.
///
/// `stochastic` also requires a rate strictly above `probability`.
/// `deaggregation` reads stochastic events without a rate threshold; its
/// `probability` selects the disaggregation tier later on.
pub fn type_filter(etype: QueryType, probability: f64) -> EventFilter {
    let min_probability = match etype {
        QueryType::Stochastic => Some(probability),
        QueryType::Observed | QueryType::Expert | QueryType::Deaggregation => None,
    };
    EventFilter {
        min_probability,
        ..EventFilter::of_type(etype.catalog_type())
    }
}

pub fn filter_spatial(events: Vec<Event>, bounds: &SpatialBounds) -> Vec<Event> {
    events.into_iter().filter(|e| bounds.contains(e)).collect()
}

pub fn filter_magnitude(events: Vec<Event>, range: &MagnitudeRange) -> Vec<Event> {
    events.into_iter().filter(|e| range.contains(e)).collect()
}

/// Stable sort, highest magnitude first.
pub fn order_by_magnitude_desc(events: &mut [Event]) {
    events.sort_by(|a, b| b.magnitude.total_cmp(&a.magnitude));
}

/// Keeps the first `limit` events. `None` and `Some(0)` keep everything.
pub fn truncate(mut events: Vec<Event>, limit: Option<usize>) -> Vec<Event> {
    if let Some(n) = limit.filter(|&n| n > 0) {
        events.truncate(n);
    }
    events
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Disaggregation context resolved for a deaggregation query.
struct DeaggContext {
    site: Site,
    bins: Vec<DisaggregationBin>,
    precision: Precision,
}

pub struct EventQuery<'g, G: CatalogGateway> {
    gateway: &'g mut G,
    seed: u64,
}

impl<'g, G: CatalogGateway> EventQuery<'g, G> {
    pub fn new(gateway: &'g mut G) -> Self {
        Self {
            gateway,
            seed: DEFAULT_SEED,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Runs the full pipeline. An empty result is not an error.
    pub fn run(&mut self, params: &QueryParams) -> Result<Vec<Event>, QueryError> {
        let bounds = params.bounds();
        let magnitude = params.magnitude();

        let deagg = if params.etype.needs_deaggregation() {
            let (lon, lat) = params.target.ok_or(QueryError::MissingTarget)?;
            Some(self.prepare_deaggregation(lon, lat, params.probability)?)
        } else {
            None
        };
        let precision = deagg.as_ref().map_or(Precision::ZERO, |d| d.precision);

        let filter = EventFilter {
            bounds: Some(bounds.widened(precision.lon, precision.lat)),
            magnitude: Some(magnitude.widened(precision.mag)),
            ..type_filter(params.etype, params.probability)
        };
        let mut candidates = self.gateway.events(&filter)?;
        order_by_magnitude_desc(&mut candidates);
        logging::info(
            Component::Query,
            None,
            &format!("{} candidate {} events", candidates.len(), filter.event_type),
        );

        let selected = match deagg {
            Some(ctx) => {
                let outcome = DeaggregationSampler::new(&ctx.bins, ctx.precision)
                    .with_seed(self.seed)
                    .sample(&candidates);
                logging::log_matching_summary(ctx.site.sid, outcome.occupied_bins, outcome.representatives.len());
                outcome.representatives
            }
            None => candidates,
        };

        let mut events = filter_magnitude(filter_spatial(selected, &bounds), &magnitude);
        order_by_magnitude_desc(&mut events);
        let events = truncate(events, params.num_events);

        logging::info(Component::Query, None, &format!("{} events selected", events.len()));
        Ok(events)
    }

    fn prepare_deaggregation(&mut self, lon: f64, lat: f64, poe50y: f64) -> Result<DeaggContext, QueryError> {
        let site_table = self.gateway.sites()?;
        let site = sites::find_nearest(&site_table, lon, lat).cloned().ok_or(QueryError::NoSites)?;

        let sid = site.sid.to_string();
        let bins = self.gateway.disaggregation_bins(site.sid, poe50y)?;
        logging::debug(
            Component::Deagg,
            Some(&sid),
            &format!("Nearest site ({}, {}); {} bins at poe50y={}", site.lon, site.lat, bins.len(), poe50y),
        );

        let precision = infer_precision(&bins)?;
        logging::debug(
            Component::Deagg,
            Some(&sid),
            &format!("Bin widths lon={} lat={} mag={}", precision.lon, precision.lat, precision.mag),
        );

        Ok(DeaggContext { site, bins, precision })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

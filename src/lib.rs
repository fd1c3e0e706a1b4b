/// Earthquake catalog query service.
///
/// Selects observed, expert, or stochastic events from a catalog by
/// spatial, depth, magnitude and rate bounds, and reduces a stochastic
/// catalog to one representative rupture per occupied cell of a site's
/// hazard-disaggregation grid. Results are written as QuakeML.

pub mod catalog;
pub mod config;
pub mod deagg;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod quakeml;
pub mod query;
pub mod sites;

#[cfg(test)]
mod test_support;

/// Hazard-grid site lookup.
///
/// Disaggregation results are stored per site of the hazard grid. A query
/// names an arbitrary target location, so the first step of a deaggregation
/// query is resolving the grid site closest to it.

use crate::model::Site;

/// Squared distance in (longitude, latitude) degree space.
///
/// Not a geographic distance: one degree of longitude counts the same as one
/// degree of latitude at every latitude. Stored disaggregation results were
/// assigned to sites with this metric.
pub fn squared_degree_distance(site: &Site, lon: f64, lat: f64) -> f64 {
    (site.lon - lon).powi(2) + (site.lat - lat).powi(2)
}

/// Returns the site nearest to (`lon`, `lat`), or `None` for an empty table.
///
/// Ties resolve to the site that appears first in `sites`.
pub fn find_nearest(sites: &[Site], lon: f64, lat: f64) -> Option<&Site> {
    let mut best: Option<(&Site, f64)> = None;
    for site in sites {
        let dist = squared_degree_distance(site, lon, lat);
        match best {
            Some((_, best_dist)) if dist >= best_dist => {}
            _ => best = Some((site, dist)),
        }
    }
    best.map(|(site, _)| site)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

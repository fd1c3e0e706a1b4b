/// In-memory catalog snapshot.
///
/// Holds the three catalog relations as plain vectors. Used for offline
/// runs against a TOML fixture file and as the gateway in tests.
///
/// Fixture format:
///
/// ```toml
/// [[events]]
/// event_id = "chile_0001"
/// longitude = -71.6
/// latitude = -33.1
/// depth = 25.0
/// magnitude = 8.1
/// type = "stochastic"
/// probability = 2.0e-4
///
/// [[sites]]
/// sid = 1
/// lon = -71.6
/// lat = -33.1
///
/// [[bins]]
/// sid = 1
/// poe50y = 0.1
/// lon = -71.6
/// lat = -33.1
/// mag = 8.0
/// poe = 0.02
/// ```

use serde::Deserialize;
use std::fs;
use std::path::Path;

use super::{CatalogGateway, EventFilter};
use crate::model::{CatalogError, DisaggregationBin, Event, Site};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryCatalog {
    #[serde(default)]
    events: Vec<Event>,
    #[serde(default)]
    sites: Vec<Site>,
    #[serde(default)]
    bins: Vec<DisaggregationBin>,
}

impl MemoryCatalog {
    pub fn new(events: Vec<Event>, sites: Vec<Site>, bins: Vec<DisaggregationBin>) -> Self {
        Self { events, sites, bins }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, CatalogError> {
        toml::from_str(contents).map_err(|e| CatalogError::Fixture(e.to_string()))
    }

    /// Loads a fixture file. Every `bins` entry must reference a site.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| CatalogError::Fixture(format!("{}: {}", path.display(), e)))?;
        let catalog = Self::from_toml_str(&contents)?;
        catalog.check_site_references()?;
        Ok(catalog)
    }

    fn check_site_references(&self) -> Result<(), CatalogError> {
        match self.bins.iter().find(|b| !self.sites.iter().any(|s| s.sid == b.sid)) {
            Some(orphan) => Err(CatalogError::InvalidRow(format!(
                "disaggregation bin references unknown site {}",
                orphan.sid
            ))),
            None => Ok(()),
        }
    }
}

impl CatalogGateway for MemoryCatalog {
    fn events(&mut self, filter: &EventFilter) -> Result<Vec<Event>, CatalogError> {
        let mut selected: Vec<Event> = self.events.iter().filter(|e| filter.matches(e)).cloned().collect();
        // Stable, so catalog order breaks ties.
        selected.sort_by(|a, b| b.magnitude.total_cmp(&a.magnitude));
        Ok(selected)
    }

    fn sites(&mut self) -> Result<Vec<Site>, CatalogError> {
        Ok(self.sites.clone())
    }

    fn disaggregation_bins(&mut self, sid: i64, poe50y: f64) -> Result<Vec<DisaggregationBin>, CatalogError> {
        Ok(self
            .bins
            .iter()
            .filter(|b| b.sid == sid && b.poe50y == poe50y)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EventType;

    const FIXTURE: &str = r#"
        [[events]]
        event_id = "obs_1960"
        agency = "ISC"
        longitude = -73.05
        latitude = -38.24
        depth = 25.0
        magnitude = 9.5
        type = "observed"
        time = { year = 1960, month = 5, day = 22, hour = 19, minute = 11, second = 14.0 }

        [[events]]
        event_id = "rup_1"
        longitude = -71.62
        latitude = -33.08
        depth = 30.0
        magnitude = 7.1
        type = "stochastic"
        probability = 3.0e-4
        mechanism = { strike = 10.0, dip = 18.0, rake = 90.0 }

        [[events]]
        event_id = "rup_2"
        longitude = -71.41
        latitude = -33.21
        depth = 32.0
        magnitude = 7.6
        type = "stochastic"
        probability = 1.0e-5

        [[sites]]
        sid = 1
        lon = -71.6
        lat = -33.1

        [[bins]]
        sid = 1
        poe50y = 0.1
        lon = -71.6
        lat = -33.1
        mag = 7.0
        poe = 0.02

        [[bins]]
        sid = 1
        poe50y = 0.02
        lon = -71.6
        lat = -33.1
        mag = 7.5
        poe = 0.01
    "#;

    #[test]
    fn test_fixture_parses_all_relations() {
        let mut catalog = MemoryCatalog::from_toml_str(FIXTURE).unwrap();
        assert_eq!(catalog.sites().unwrap().len(), 1);

        let observed = catalog.events(&EventFilter::of_type(EventType::Observed)).unwrap();
        assert_eq!(observed.len(), 1);
        assert_eq!(observed[0].time.year, Some(1960));
        assert_eq!(observed[0].agency.as_deref(), Some("ISC"));
        assert_eq!(observed[0].probability, None);
    }

    #[test]
    fn test_events_come_back_highest_magnitude_first() {
        let mut catalog = MemoryCatalog::from_toml_str(FIXTURE).unwrap();
        let events = catalog.events(&EventFilter::of_type(EventType::Stochastic)).unwrap();
        let ids: Vec<&str> = events.iter().map(|e| e.event_id.as_str()).collect();
        assert_eq!(ids, vec!["rup_2", "rup_1"]);
        assert_eq!(events[1].mechanism.strike, Some(10.0));
    }

    #[test]
    fn test_bins_are_selected_by_site_and_tier() {
        let mut catalog = MemoryCatalog::from_toml_str(FIXTURE).unwrap();
        let bins = catalog.disaggregation_bins(1, 0.1).unwrap();
        assert_eq!(bins.len(), 1);
        assert_eq!(bins[0].mag, 7.0);
        assert!(catalog.disaggregation_bins(2, 0.1).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_fixture_is_an_error() {
        let result = MemoryCatalog::from_toml_str("[[events]]\nevent_id = 3");
        assert!(matches!(result, Err(CatalogError::Fixture(_))), "got {:?}", result);
    }

    #[test]
    fn test_load_rejects_orphan_bins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.toml");
        std::fs::write(
            &path,
            "[[bins]]\nsid = 9\npoe50y = 0.1\nlon = 0.0\nlat = 0.0\nmag = 7.0\npoe = 0.1\n",
        )
        .unwrap();

        let result = MemoryCatalog::load(&path);
        assert!(matches!(result, Err(CatalogError::InvalidRow(_))), "got {:?}", result);
    }
}

/// Postgres-backed catalog gateway.
///
/// Reads use parameterized SQL against the schema in `sql/001_catalog.sql`.
/// The connection is owned by a `PostgresCatalog`; `with_catalog` scopes it
/// to a single unit of work and closes it on every exit path.

use postgres::types::ToSql;
use postgres::{Client, NoTls, Row};

use super::{CatalogGateway, EventFilter};
use crate::logging::{self, Component};
use crate::model::{
    CatalogError, DisaggregationBin, Event, FocalMechanism, HorizontalUncertainty, OriginTime, Site,
};

const EVENT_COLUMNS: &str = "event_id, agency, identifier, \
     year, month, day, hour, minute, second, time_uncertainty, \
     longitude, longitude_uncertainty, latitude, latitude_uncertainty, \
     horizontal_uncertainty, min_horizontal_uncertainty, max_horizontal_uncertainty, \
     azimuth_max_horizontal_uncertainty, depth, depth_uncertainty, \
     magnitude, magnitude_uncertainty, strike, strike_uncertainty, \
     dip, dip_uncertainty, rake, rake_uncertainty, type, probability";

pub struct PostgresCatalog {
    client: Client,
}

impl PostgresCatalog {
    pub fn connect(database_url: &str) -> Result<Self, CatalogError> {
        let client = Client::connect(database_url, NoTls)?;
        logging::debug(Component::Catalog, None, "Connected to catalog database");
        Ok(Self { client })
    }

    pub fn close(self) -> Result<(), CatalogError> {
        self.client.close()?;
        Ok(())
    }

    /// Inserts events in a single transaction. Either all rows are stored
    /// or none are.
    pub fn insert_events(&mut self, events: &[Event]) -> Result<u64, CatalogError> {
        let mut tx = self.client.transaction()?;
        let statement = tx.prepare(&format!(
            "INSERT INTO events ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, \
             $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, \
             $21, $22, $23, $24, $25, $26, $27, $28, $29, $30)",
            EVENT_COLUMNS
        ))?;

        let mut inserted = 0;
        for e in events {
            let event_type = e.event_type.as_str();
            inserted += tx.execute(
                &statement,
                &[
                    &e.event_id,
                    &e.agency,
                    &e.identifier,
                    &e.time.year,
                    &e.time.month,
                    &e.time.day,
                    &e.time.hour,
                    &e.time.minute,
                    &e.time.second,
                    &e.time.uncertainty,
                    &e.longitude,
                    &e.longitude_uncertainty,
                    &e.latitude,
                    &e.latitude_uncertainty,
                    &e.horizontal.horizontal,
                    &e.horizontal.min_horizontal,
                    &e.horizontal.max_horizontal,
                    &e.horizontal.azimuth_max_horizontal,
                    &e.depth,
                    &e.depth_uncertainty,
                    &e.magnitude,
                    &e.magnitude_uncertainty,
                    &e.mechanism.strike,
                    &e.mechanism.strike_uncertainty,
                    &e.mechanism.dip,
                    &e.mechanism.dip_uncertainty,
                    &e.mechanism.rake,
                    &e.mechanism.rake_uncertainty,
                    &event_type,
                    &e.probability,
                ],
            )?;
        }

        tx.commit()?;
        Ok(inserted)
    }
}

/// Opens a catalog connection, runs `work` against it, and closes the
/// connection whether `work` succeeded or not.
///
/// If `work` fails its error is returned even when closing fails as well.
pub fn with_catalog<T, E, F>(database_url: &str, work: F) -> Result<T, E>
where
    F: FnOnce(&mut PostgresCatalog) -> Result<T, E>,
    E: From<CatalogError>,
{
    let mut catalog = PostgresCatalog::connect(database_url)?;
    let result = work(&mut catalog);
    let closed = catalog.close();

    let value = result?;
    closed?;
    Ok(value)
}

// ---------------------------------------------------------------------------
// Query building
// ---------------------------------------------------------------------------

/// Builds the WHERE clause and parameter list for an event filter.
fn event_query(filter: &EventFilter) -> (String, Vec<Box<dyn ToSql + Sync>>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut params: Vec<Box<dyn ToSql + Sync>> = Vec::new();

    let mut push = |clause: &str, value: Box<dyn ToSql + Sync>| {
        params.push(value);
        clauses.push(format!("{} ${}", clause, params.len()));
    };

    push("type =", Box::new(filter.event_type.as_str().to_string()));
    if let Some(min) = filter.min_probability {
        push("probability >", Box::new(min));
    }
    if let Some(b) = filter.bounds {
        push("longitude >=", Box::new(b.lonmin));
        push("longitude <=", Box::new(b.lonmax));
        push("latitude >=", Box::new(b.latmin));
        push("latitude <=", Box::new(b.latmax));
        push("depth >=", Box::new(b.zmin));
        push("depth <=", Box::new(b.zmax));
    }
    if let Some(m) = filter.magnitude {
        push("magnitude >=", Box::new(m.min));
        push("magnitude <=", Box::new(m.max));
    }

    let sql = format!(
        "SELECT {} FROM events WHERE {} ORDER BY magnitude DESC, idx ASC",
        EVENT_COLUMNS,
        clauses.join(" AND ")
    );
    (sql, params)
}

fn event_from_row(row: &Row) -> Result<Event, CatalogError> {
    let event_type: String = row.try_get("type")?;
    Ok(Event {
        event_id: row.try_get("event_id")?,
        agency: row.try_get("agency")?,
        identifier: row.try_get("identifier")?,
        time: OriginTime {
            year: row.try_get("year")?,
            month: row.try_get("month")?,
            day: row.try_get("day")?,
            hour: row.try_get("hour")?,
            minute: row.try_get("minute")?,
            second: row.try_get("second")?,
            uncertainty: row.try_get("time_uncertainty")?,
        },
        longitude: row.try_get("longitude")?,
        longitude_uncertainty: row.try_get("longitude_uncertainty")?,
        latitude: row.try_get("latitude")?,
        latitude_uncertainty: row.try_get("latitude_uncertainty")?,
        horizontal: HorizontalUncertainty {
            horizontal: row.try_get("horizontal_uncertainty")?,
            min_horizontal: row.try_get("min_horizontal_uncertainty")?,
            max_horizontal: row.try_get("max_horizontal_uncertainty")?,
            azimuth_max_horizontal: row.try_get("azimuth_max_horizontal_uncertainty")?,
        },
        depth: row.try_get("depth")?,
        depth_uncertainty: row.try_get("depth_uncertainty")?,
        magnitude: row.try_get("magnitude")?,
        magnitude_uncertainty: row.try_get("magnitude_uncertainty")?,
        mechanism: FocalMechanism {
            strike: row.try_get("strike")?,
            strike_uncertainty: row.try_get("strike_uncertainty")?,
            dip: row.try_get("dip")?,
            dip_uncertainty: row.try_get("dip_uncertainty")?,
            rake: row.try_get("rake")?,
            rake_uncertainty: row.try_get("rake_uncertainty")?,
        },
        event_type: event_type.parse()?,
        probability: row.try_get("probability")?,
    })
}

impl CatalogGateway for PostgresCatalog {
    fn events(&mut self, filter: &EventFilter) -> Result<Vec<Event>, CatalogError> {
        let (sql, params) = event_query(filter);
        let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|p| p.as_ref()).collect();

        let rows = self.client.query(sql.as_str(), &refs)?;
        let events = rows.iter().map(event_from_row).collect::<Result<Vec<_>, _>>()?;

        logging::debug(
            Component::Catalog,
            None,
            &format!("Fetched {} {} events", events.len(), filter.event_type),
        );
        Ok(events)
    }

    fn sites(&mut self) -> Result<Vec<Site>, CatalogError> {
        let rows = self.client.query("SELECT sid, lon, lat FROM sites ORDER BY idx", &[])?;

        let mut sites = Vec::with_capacity(rows.len());
        for row in rows {
            sites.push(Site {
                sid: row.try_get(0)?,
                lon: row.try_get(1)?,
                lat: row.try_get(2)?,
            });
        }
        Ok(sites)
    }

    fn disaggregation_bins(&mut self, sid: i64, poe50y: f64) -> Result<Vec<DisaggregationBin>, CatalogError> {
        let rows = self.client.query(
            "SELECT sid, poe50y, lon, lat, mag, poe
             FROM mean_disagg
             WHERE sid = $1 AND poe50y = $2
             ORDER BY idx",
            &[&sid, &poe50y],
        )?;

        let mut bins = Vec::with_capacity(rows.len());
        for row in rows {
            bins.push(DisaggregationBin {
                sid: row.try_get(0)?,
                poe50y: row.try_get(1)?,
                lon: row.try_get(2)?,
                lat: row.try_get(3)?,
                mag: row.try_get(4)?,
                poe: row.try_get(5)?,
            });
        }
        Ok(bins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MagnitudeRange, SpatialBounds};
    use crate::model::EventType;

    #[test]
    fn test_type_only_filter_has_single_parameter() {
        let (sql, params) = event_query(&EventFilter::of_type(EventType::Observed));
        assert!(sql.ends_with("WHERE type = $1 ORDER BY magnitude DESC, idx ASC"), "got: {}", sql);
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_full_filter_numbers_parameters_in_order() {
        let filter = EventFilter {
            event_type: EventType::Stochastic,
            min_probability: Some(0.1),
            bounds: Some(SpatialBounds { lonmin: -72.0, lonmax: -68.0, latmin: -70.0, latmax: -10.0, zmin: 5.0, zmax: 140.0 }),
            magnitude: Some(MagnitudeRange { min: 6.6, max: 8.5 }),
        };
        let (sql, params) = event_query(&filter);

        assert_eq!(params.len(), 10);
        assert!(sql.contains("type = $1 AND probability > $2 AND longitude >= $3"), "got: {}", sql);
        assert!(sql.contains("magnitude <= $10 ORDER BY"), "got: {}", sql);
    }

    #[test]
    fn test_probability_compares_column_to_parameter() {
        // The column must be compared with the caller's threshold, never with itself.
        let filter = EventFilter {
            min_probability: Some(0.5),
            ..EventFilter::of_type(EventType::Stochastic)
        };
        let (sql, _) = event_query(&filter);
        assert!(sql.contains("probability > $2"));
        assert!(!sql.contains("probability > probability"));
    }
}

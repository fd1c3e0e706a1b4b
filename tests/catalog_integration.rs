/// Integration tests for the Postgres catalog gateway
///
/// Tests verify:
/// 1. Rupture import stores every event in one transaction
/// 2. Filtered reads apply type, rate, bounds and magnitude in SQL
/// 3. Sites and disaggregation bins are read back in row order
/// 4. A deaggregation query runs end to end against the database
///
/// Prerequisites:
/// - PostgreSQL with the schema from sql/001_catalog.sql
/// - DATABASE_URL set in .env
///
/// Run with: cargo test --test catalog_integration -- --ignored --test-threads=1

use postgres::{Client, NoTls};
use std::env;

use quakeledger::catalog::{with_catalog, CatalogGateway, EventFilter, MagnitudeRange, PostgresCatalog, SpatialBounds};
use quakeledger::ingest::ruptures::{parse_rupture_csv, RuptureImportOptions};
use quakeledger::model::{CatalogError, EventType, QueryError, QueryType};
use quakeledger::query::{EventQuery, QueryParams};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const TEST_PREFIX: &str = "itest_";
const TEST_SID: i64 = 990_001;

const EXPORT: &str = "# itest export\n\
    rupid\tmag\tcentroid_lon\tcentroid_lat\tcentroid_depth\tstrike\tdip\trake\tpoe\n\
    1\t7.1\t-71.62\t-33.08\t30.0\t8.0\t18.0\t110.0\t2.0e-4\n\
    2\t7.4\t-71.52\t-33.09\t30.0\t8.0\t18.0\t110.0\t3.0e-4\n\
    3\t7.9\t-71.61\t-33.01\t30.0\t8.0\t18.0\t110.0\t5.0e-5\n";

fn database_url() -> String {
    dotenv::dotenv().ok();
    env::var("DATABASE_URL").expect("DATABASE_URL must be set")
}

fn setup_test_db() -> Client {
    let mut client = Client::connect(&database_url(), NoTls).expect("Failed to connect to test database");
    client
        .batch_execute(include_str!("../sql/001_catalog.sql"))
        .expect("Failed to apply catalog schema");
    cleanup(&mut client);

    client
        .execute(
            "INSERT INTO sites (sid, lon, lat) VALUES ($1, -71.6, -33.1)",
            &[&TEST_SID],
        )
        .expect("Failed to insert test site");
    for (lon, lat, mag, poe) in [
        (-71.6_f64, -33.1_f64, 7.0_f64, 0.02_f64),
        (-71.5, -33.1, 7.5, 0.01),
        (-71.6, -33.0, 8.0, 0.005),
    ] {
        client
            .execute(
                "INSERT INTO mean_disagg (sid, poe50y, lon, lat, mag, poe) VALUES ($1, 0.1, $2, $3, $4, $5)",
                &[&TEST_SID, &lon, &lat, &mag, &poe],
            )
            .expect("Failed to insert test bin");
    }
    client
}

fn cleanup(client: &mut Client) {
    let pattern = format!("{}%", TEST_PREFIX);
    let _ = client.execute("DELETE FROM events WHERE event_id LIKE $1", &[&pattern]);
    let _ = client.execute("DELETE FROM mean_disagg WHERE sid = $1", &[&TEST_SID]);
    let _ = client.execute("DELETE FROM sites WHERE sid = $1", &[&TEST_SID]);
}

fn import_test_ruptures() {
    let options = RuptureImportOptions {
        prefix: TEST_PREFIX.to_string(),
        agency: Some("GFZ".to_string()),
    };
    let events = parse_rupture_csv(EXPORT, &options).unwrap();
    let inserted = with_catalog(&database_url(), |catalog: &mut PostgresCatalog| {
        catalog.insert_events(&events)
    })
    .expect("Failed to import ruptures");
    assert_eq!(inserted, 3);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
#[ignore]
fn test_imported_ruptures_read_back_through_filter() {
    let mut client = setup_test_db();
    import_test_ruptures();

    let filter = EventFilter {
        event_type: EventType::Stochastic,
        min_probability: Some(1.0e-4),
        bounds: Some(SpatialBounds { lonmin: -71.7, lonmax: -71.5, latmin: -33.2, latmax: -33.0, zmin: 0.0, zmax: 100.0 }),
        magnitude: Some(MagnitudeRange { min: 7.0, max: 8.0 }),
    };
    let events = with_catalog(&database_url(), |catalog: &mut PostgresCatalog| catalog.events(&filter))
        .expect("Failed to read events");
    let ours: Vec<&str> = events
        .iter()
        .map(|e| e.event_id.as_str())
        .filter(|id| id.starts_with(TEST_PREFIX))
        .collect();

    assert_eq!(ours, vec!["itest_2", "itest_1"], "rate 5e-5 is below the threshold");
    let first = events.iter().find(|e| e.event_id == "itest_2").unwrap();
    assert_eq!(first.agency.as_deref(), Some("GFZ"));
    assert_eq!(first.mechanism.rake, Some(110.0));

    cleanup(&mut client);
}

#[test]
#[ignore]
fn test_sites_and_bins_read_back() {
    let mut client = setup_test_db();

    let (sites, bins) = with_catalog(&database_url(), |catalog: &mut PostgresCatalog| {
        Ok::<_, CatalogError>((catalog.sites()?, catalog.disaggregation_bins(TEST_SID, 0.1)?))
    })
    .expect("Failed to read grid");

    assert!(sites.iter().any(|s| s.sid == TEST_SID));
    let mags: Vec<f64> = bins.iter().map(|b| b.mag).collect();
    assert_eq!(mags, vec![7.0, 7.5, 8.0], "bins come back in row order");

    cleanup(&mut client);
}

#[test]
#[ignore]
fn test_deaggregation_query_against_database() {
    let mut client = setup_test_db();
    import_test_ruptures();

    let params = QueryParams {
        lonmin: 288.0,
        lonmax: 292.0,
        latmin: -70.0,
        latmax: -10.0,
        mmin: 6.6,
        mmax: 8.5,
        zmin: 5.0,
        zmax: 140.0,
        probability: 0.1,
        etype: QueryType::Deaggregation,
        target: Some((-71.6, -33.1)),
        num_events: None,
    };
    let events = with_catalog(&database_url(), |catalog: &mut PostgresCatalog| -> Result<_, QueryError> {
        EventQuery::new(catalog).run(&params)
    })
    .expect("Deaggregation query failed");

    println!("Selected {} representatives", events.len());
    assert!(events.iter().all(|e| e.probability.is_some_and(|p| p > 0.0)));
    assert!(events.windows(2).all(|w| w[0].magnitude >= w[1].magnitude));

    cleanup(&mut client);
}

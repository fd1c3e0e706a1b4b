/// OpenQuake rupture export parser.
///
/// The export starts with a single `#` comment line followed by a
/// tab-delimited header. Required columns are `rupid`, `mag`,
/// `centroid_lon`, `centroid_lat` and `centroid_depth`; `strike`, `dip`,
/// `rake` and `poe` (or `occurrence_rate`) are read when present.
/// Every rupture becomes one stochastic event.

use std::collections::HashMap;

use crate::model::{Event, EventType, FocalMechanism, HorizontalUncertainty, IngestError, OriginTime};

const REQUIRED_COLUMNS: [&str; 5] = ["rupid", "mag", "centroid_lon", "centroid_lat", "centroid_depth"];

#[derive(Debug, Clone)]
pub struct RuptureImportOptions {
    /// Prepended to `rupid` to form the event id.
    pub prefix: String,
    pub agency: Option<String>,
}

impl Default for RuptureImportOptions {
    fn default() -> Self {
        Self {
            prefix: "peru_".to_string(),
            agency: None,
        }
    }
}

struct Columns {
    index: HashMap<String, usize>,
}

impl Columns {
    fn from_header(header: &str) -> Result<Self, IngestError> {
        let index: HashMap<String, usize> = header
            .split('\t')
            .enumerate()
            .map(|(i, name)| (name.trim().to_string(), i))
            .collect();

        for name in REQUIRED_COLUMNS {
            if !index.contains_key(name) {
                return Err(IngestError::MissingColumn(name.to_string()));
            }
        }
        Ok(Self { index })
    }

    fn raw<'a>(&self, fields: &[&'a str], name: &str) -> Option<&'a str> {
        self.index
            .get(name)
            .and_then(|&i| fields.get(i))
            .copied()
            .map(str::trim)
            .filter(|s| !s.is_empty() && *s != "nan")
    }

    fn required(&self, fields: &[&str], name: &str, line: usize) -> Result<f64, IngestError> {
        match self.raw(fields, name) {
            Some(value) => parse_number(value, name, line),
            None => Err(IngestError::InvalidValue {
                line,
                column: name.to_string(),
                value: String::new(),
            }),
        }
    }

    fn optional(&self, fields: &[&str], name: &str, line: usize) -> Result<Option<f64>, IngestError> {
        self.raw(fields, name)
            .map(|value| parse_number(value, name, line))
            .transpose()
    }
}

fn parse_number(value: &str, column: &str, line: usize) -> Result<f64, IngestError> {
    value.parse().map_err(|_| IngestError::InvalidValue {
        line,
        column: column.to_string(),
        value: value.to_string(),
    })
}

/// Parses a rupture export into stochastic events, in file order.
pub fn parse_rupture_csv(text: &str, options: &RuptureImportOptions) -> Result<Vec<Event>, IngestError> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .filter(|(_, line)| !line.trim().is_empty() && !line.starts_with('#'));

    let (_, header) = lines.next().ok_or(IngestError::MissingHeader)?;
    let columns = Columns::from_header(header)?;

    let mut events = Vec::new();
    for (line, row) in lines {
        let fields: Vec<&str> = row.split('\t').collect();

        let rupid = columns.raw(&fields, "rupid").ok_or_else(|| IngestError::InvalidValue {
            line,
            column: "rupid".to_string(),
            value: String::new(),
        })?;
        let event_id = format!("{}{}", options.prefix, rupid);

        let probability = match columns.optional(&fields, "poe", line)? {
            Some(poe) => Some(poe),
            None => columns.optional(&fields, "occurrence_rate", line)?,
        };

        events.push(Event {
            identifier: Some(event_id.clone()),
            event_id,
            agency: options.agency.clone(),
            time: OriginTime::default(),
            longitude: columns.required(&fields, "centroid_lon", line)?,
            longitude_uncertainty: None,
            latitude: columns.required(&fields, "centroid_lat", line)?,
            latitude_uncertainty: None,
            horizontal: HorizontalUncertainty::default(),
            depth: columns.required(&fields, "centroid_depth", line)?,
            depth_uncertainty: None,
            magnitude: columns.required(&fields, "mag", line)?,
            magnitude_uncertainty: None,
            mechanism: FocalMechanism {
                strike: columns.optional(&fields, "strike", line)?,
                dip: columns.optional(&fields, "dip", line)?,
                rake: columns.optional(&fields, "rake", line)?,
                ..FocalMechanism::default()
            },
            event_type: EventType::Stochastic,
            probability,
        });
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = "#,,,,,\"generated_by='OpenQuake engine 3.11'\"\n\
        rupid\tmultiplicity\tmag\tcentroid_lon\tcentroid_lat\tcentroid_depth\ttrt\tstrike\tdip\trake\tpoe\n\
        4400\t1\t8.55\t-77.29\t-12.04\t28.4\tSubduction Interface\t331.2\t17.0\t90.0\t2.1e-05\n\
        4401\t1\t7.05\t-76.91\t-12.51\t31.0\tSubduction Interface\tnan\t\t90.0\t\n";

    #[test]
    fn test_parses_rows_into_stochastic_events() {
        let events = parse_rupture_csv(EXPORT, &RuptureImportOptions::default()).unwrap();
        assert_eq!(events.len(), 2);

        let first = &events[0];
        assert_eq!(first.event_id, "peru_4400");
        assert_eq!(first.identifier.as_deref(), Some("peru_4400"));
        assert_eq!(first.event_type, EventType::Stochastic);
        assert_eq!(first.magnitude, 8.55);
        assert_eq!(first.longitude, -77.29);
        assert_eq!(first.latitude, -12.04);
        assert_eq!(first.depth, 28.4);
        assert_eq!(first.mechanism.strike, Some(331.2));
        assert_eq!(first.probability, Some(2.1e-05));
    }

    #[test]
    fn test_blank_and_nan_optional_fields_become_none() {
        let events = parse_rupture_csv(EXPORT, &RuptureImportOptions::default()).unwrap();
        let second = &events[1];
        assert_eq!(second.mechanism.strike, None, "nan strike should be absent");
        assert_eq!(second.mechanism.dip, None, "blank dip should be absent");
        assert_eq!(second.mechanism.rake, Some(90.0));
        assert_eq!(second.probability, None);
    }

    #[test]
    fn test_prefix_and_agency_are_applied() {
        let options = RuptureImportOptions {
            prefix: "chile_".to_string(),
            agency: Some("GFZ".to_string()),
        };
        let events = parse_rupture_csv(EXPORT, &options).unwrap();
        assert_eq!(events[0].event_id, "chile_4400");
        assert!(events.iter().all(|e| e.agency.as_deref() == Some("GFZ")));
    }

    #[test]
    fn test_occurrence_rate_is_used_without_poe() {
        let text = "# export\n\
            rupid\tmag\tcentroid_lon\tcentroid_lat\tcentroid_depth\toccurrence_rate\n\
            7\t6.8\t-71.5\t-33.0\t20.0\t3.5e-04\n";
        let events = parse_rupture_csv(text, &RuptureImportOptions::default()).unwrap();
        assert_eq!(events[0].probability, Some(3.5e-04));
    }

    #[test]
    fn test_missing_required_column_is_an_error() {
        let text = "# export\nrupid\tmag\tcentroid_lon\tcentroid_lat\n1\t7.0\t-71.0\t-33.0\n";
        let result = parse_rupture_csv(text, &RuptureImportOptions::default());
        assert!(
            matches!(result, Err(IngestError::MissingColumn(ref c)) if c == "centroid_depth"),
            "got {:?}",
            result
        );
    }

    #[test]
    fn test_unparseable_value_reports_line_and_column() {
        let text = "# export\n\
            rupid\tmag\tcentroid_lon\tcentroid_lat\tcentroid_depth\n\
            1\tbig\t-71.0\t-33.0\t10.0\n";
        match parse_rupture_csv(text, &RuptureImportOptions::default()) {
            Err(IngestError::InvalidValue { line, column, value }) => {
                assert_eq!(line, 3);
                assert_eq!(column, "mag");
                assert_eq!(value, "big");
            }
            other => panic!("expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_comment_only_file_has_no_header() {
        let result = parse_rupture_csv("# nothing here\n", &RuptureImportOptions::default());
        assert!(matches!(result, Err(IngestError::MissingHeader)));
    }
}

/// QuakeML output (and read-back) for query results.
///
/// Documents follow the QuakeML 1.2 BED layout: one `event` per catalog
/// event with an `origin`, a `magnitude`, and, where known, a
/// `focalMechanism`. Catalog fields that QuakeML has no slot for (event
/// type, probability, identifier) travel in `description` and `comment`
/// elements so that `read_catalog` can rebuild the original records.
///
/// Conventions:
/// - depth is written in km, as stored in the catalog
/// - absent uncertainties are omitted; absent strike/dip/rake inside a
///   focal mechanism are written as `nan`
/// - absent time components are written as 0 (month and day as 1) and
///   named in an `absentTime` comment

use chrono::NaiveDate;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event as XmlEvent};
use quick_xml::{Reader, Writer};
use std::fs;
use std::path::{Path, PathBuf};

use crate::logging::{self, Component};
use crate::model::{Event, EventType, FocalMechanism, HorizontalUncertainty, OriginTime, QuakeMlError};

const QUAKEML_NS: &str = "http://quakeml.org/xmlns/quakeml/1.2";
const BED_NS: &str = "http://quakeml.org/xmlns/bed/1.2";
const RESOURCE_PREFIX: &str = "quakeml:quakeledger/";
const MISSING: &str = "nan";

fn xml_err(e: impl std::fmt::Display) -> QuakeMlError {
    QuakeMlError::Xml(e.to_string())
}

fn resource_id(event_id: &str) -> String {
    format!("{}{}", RESOURCE_PREFIX, event_id)
}

/// Renders an origin time as `YYYY-MM-DDTHH:MM:SS[.f]Z`.
///
/// Absent components are filled (0, month and day 1) so the value stays a
/// valid dateTime; `absent_time_parts` lists which ones were filled.
/// Seconds keep every significant digit.
pub fn format_origin_time(time: &OriginTime) -> String {
    let second = time.second.unwrap_or(0.0);
    let pad = if second < 10.0 { "0" } else { "" };
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{}{}Z",
        time.year.unwrap_or(0),
        time.month.unwrap_or(0).max(1),
        time.day.unwrap_or(0).max(1),
        time.hour.unwrap_or(0),
        time.minute.unwrap_or(0),
        pad,
        second,
    )
}

/// Names of the time components that are absent, in field order.
pub fn absent_time_parts(time: &OriginTime) -> Vec<&'static str> {
    let parts = [
        ("year", time.year.is_none()),
        ("month", time.month.is_none()),
        ("day", time.day.is_none()),
        ("hour", time.hour.is_none()),
        ("minute", time.minute.is_none()),
        ("second", time.second.is_none()),
    ];
    parts.iter().filter(|(_, absent)| *absent).map(|(name, _)| *name).collect()
}

/// Parses a time written by `format_origin_time`. All components come back
/// present; absent ones are cleared from the comment afterwards.
pub fn parse_origin_time(value: &str) -> Result<OriginTime, QuakeMlError> {
    let invalid = || QuakeMlError::InvalidValue {
        element: "time".to_string(),
        value: value.to_string(),
    };
    let (date, clock) = value
        .strip_suffix('Z')
        .and_then(|v| v.split_once('T'))
        .ok_or_else(invalid)?;

    let date: Vec<i32> = date
        .split('-')
        .map(|p| p.parse::<i32>())
        .collect::<Result<_, _>>()
        .map_err(|_| invalid())?;
    let clock: Vec<&str> = clock.split(':').collect();
    let (&[year, month, day], &[hour, minute, second]) = (date.as_slice(), clock.as_slice()) else {
        return Err(invalid());
    };
    NaiveDate::from_ymd_opt(year, month as u32, day as u32).ok_or_else(invalid)?;

    Ok(OriginTime {
        year: Some(year),
        month: Some(month),
        day: Some(day),
        hour: Some(hour.parse().map_err(|_| invalid())?),
        minute: Some(minute.parse().map_err(|_| invalid())?),
        second: Some(second.parse().map_err(|_| invalid())?),
        uncertainty: None,
    })
}

fn clear_time_part(time: &mut OriginTime, part: &str) {
    match part {
        "year" => time.year = None,
        "month" => time.month = None,
        "day" => time.day = None,
        "hour" => time.hour = None,
        "minute" => time.minute = None,
        "second" => time.second = None,
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

struct DocumentWriter {
    writer: Writer<Vec<u8>>,
}

impl DocumentWriter {
    fn new() -> Self {
        Self {
            writer: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), QuakeMlError> {
        let element = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.writer.write_event(XmlEvent::Start(element)).map_err(xml_err)
    }

    fn end(&mut self, name: &str) -> Result<(), QuakeMlError> {
        self.writer.write_event(XmlEvent::End(BytesEnd::new(name))).map_err(xml_err)
    }

    fn text(&mut self, name: &str, text: &str) -> Result<(), QuakeMlError> {
        self.start(name, &[])?;
        self.writer.write_event(XmlEvent::Text(BytesText::new(text))).map_err(xml_err)?;
        self.end(name)
    }

    /// `<name><value>..</value><uncertainty>..</uncertainty></name>`
    fn quantity(&mut self, name: &str, value: Option<f64>, uncertainty: Option<f64>) -> Result<(), QuakeMlError> {
        self.start(name, &[])?;
        self.text("value", &value.map_or_else(|| MISSING.to_string(), |v| v.to_string()))?;
        if let Some(u) = uncertainty {
            self.text("uncertainty", &u.to_string())?;
        }
        self.end(name)
    }

    fn creation_info(&mut self, agency: &str) -> Result<(), QuakeMlError> {
        self.start("creationInfo", &[])?;
        self.text("agencyID", agency)?;
        self.end("creationInfo")
    }

    fn event(&mut self, event: &Event, provider: &str) -> Result<(), QuakeMlError> {
        let id = resource_id(&event.event_id);
        let agency = event.agency.as_deref().unwrap_or(provider);

        self.start("event", &[("publicID", id.as_str())])?;
        self.text("preferredOriginID", &id)?;
        self.text("preferredMagnitudeID", &id)?;
        self.text("type", "earthquake")?;

        self.start("description", &[])?;
        self.text("text", event.event_type.as_str())?;
        self.end("description")?;

        if let Some(p) = event.probability {
            self.comment(&format!("{}/probability", id), &p.to_string())?;
        }
        if let Some(identifier) = &event.identifier {
            self.comment(&format!("{}/identifier", id), identifier)?;
        }
        let absent = absent_time_parts(&event.time);
        if !absent.is_empty() {
            self.comment(&format!("{}/absentTime", id), &absent.join(" "))?;
        }

        self.start("origin", &[("publicID", id.as_str())])?;
        self.start("time", &[])?;
        self.text("value", &format_origin_time(&event.time))?;
        if let Some(u) = event.time.uncertainty {
            self.text("uncertainty", &u.to_string())?;
        }
        self.end("time")?;
        self.quantity("latitude", Some(event.latitude), event.latitude_uncertainty)?;
        self.quantity("longitude", Some(event.longitude), event.longitude_uncertainty)?;
        self.quantity("depth", Some(event.depth), event.depth_uncertainty)?;

        let h = &event.horizontal;
        let horizontal = [
            ("horizontalUncertainty", h.horizontal),
            ("minHorizontalUncertainty", h.min_horizontal),
            ("maxHorizontalUncertainty", h.max_horizontal),
            ("azimuthMaxHorizontalUncertainty", h.azimuth_max_horizontal),
        ];
        if horizontal.iter().any(|(_, v)| v.is_some()) {
            self.start("originUncertainty", &[])?;
            for (name, value) in horizontal {
                if let Some(v) = value {
                    self.text(name, &v.to_string())?;
                }
            }
            self.end("originUncertainty")?;
        }
        self.creation_info(agency)?;
        self.end("origin")?;

        self.start("magnitude", &[("publicID", id.as_str())])?;
        self.quantity("mag", Some(event.magnitude), event.magnitude_uncertainty)?;
        self.text("type", "MW")?;
        self.text("originID", &id)?;
        self.creation_info(agency)?;
        self.end("magnitude")?;

        let m = &event.mechanism;
        if !m.is_empty() {
            self.start("focalMechanism", &[("publicID", id.as_str())])?;
            self.start("nodalPlanes", &[])?;
            self.start("nodalPlane1", &[])?;
            self.quantity("strike", m.strike, m.strike_uncertainty)?;
            self.quantity("dip", m.dip, m.dip_uncertainty)?;
            self.quantity("rake", m.rake, m.rake_uncertainty)?;
            self.end("nodalPlane1")?;
            self.end("nodalPlanes")?;
            self.end("focalMechanism")?;
        }

        self.end("event")
    }

    fn comment(&mut self, id: &str, text: &str) -> Result<(), QuakeMlError> {
        self.start("comment", &[("id", id)])?;
        self.text("text", text)?;
        self.end("comment")
    }

    fn finish(self) -> Result<String, QuakeMlError> {
        String::from_utf8(self.writer.into_inner()).map_err(xml_err)
    }
}

/// Renders events as a QuakeML document, in the given order.
///
/// `provider` is used as agency for events that do not name one.
pub fn write_catalog(events: &[Event], provider: &str) -> Result<String, QuakeMlError> {
    let mut doc = DocumentWriter::new();
    doc.writer
        .write_event(XmlEvent::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_err)?;
    doc.start("q:quakeml", &[("xmlns:q", QUAKEML_NS), ("xmlns", BED_NS)])?;
    let catalog_id = format!("{}catalog", RESOURCE_PREFIX);
    doc.start("eventParameters", &[("publicID", catalog_id.as_str())])?;
    for event in events {
        doc.event(event, provider)?;
    }
    doc.end("eventParameters")?;
    doc.end("q:quakeml")?;
    doc.finish()
}

/// Writes query results to a QuakeML file.
pub struct QuakeMlWriter {
    path: PathBuf,
    provider: String,
}

impl QuakeMlWriter {
    pub fn new(path: impl Into<PathBuf>, provider: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            provider: provider.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, events: &[Event]) -> Result<(), QuakeMlError> {
        let document = write_catalog(events, &self.provider)?;
        fs::write(&self.path, document)?;
        logging::info(
            Component::QuakeMl,
            None,
            &format!("Wrote {} events to {}", events.len(), self.path.display()),
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

#[derive(Default)]
struct EventBuilder {
    event_id: String,
    event_type: Option<EventType>,
    agency: Option<String>,
    identifier: Option<String>,
    probability: Option<f64>,
    time: OriginTime,
    longitude: Option<f64>,
    longitude_uncertainty: Option<f64>,
    latitude: Option<f64>,
    latitude_uncertainty: Option<f64>,
    depth: Option<f64>,
    depth_uncertainty: Option<f64>,
    magnitude: Option<f64>,
    magnitude_uncertainty: Option<f64>,
    horizontal: HorizontalUncertainty,
    mechanism: FocalMechanism,
    comment_id: Option<String>,
    absent_time: Vec<String>,
}

fn number(element: &str, text: &str) -> Result<Option<f64>, QuakeMlError> {
    if text.eq_ignore_ascii_case(MISSING) {
        return Ok(None);
    }
    text.parse::<f64>().map(Some).map_err(|_| QuakeMlError::InvalidValue {
        element: element.to_string(),
        value: text.to_string(),
    })
}

impl EventBuilder {
    fn assign(&mut self, tail: &[&str], text: &str) -> Result<(), QuakeMlError> {
        let element = tail.join("/");
        match tail {
            ["description", "text"] => {
                let event_type = text.parse().map_err(|_| QuakeMlError::InvalidValue {
                    element,
                    value: text.to_string(),
                })?;
                self.event_type = Some(event_type);
            }
            ["comment", "text"] => match self.comment_id.as_deref() {
                Some(id) if id.ends_with("/probability") => self.probability = number(&element, text)?,
                Some(id) if id.ends_with("/identifier") => self.identifier = Some(text.to_string()),
                Some(id) if id.ends_with("/absentTime") => {
                    self.absent_time = text.split_whitespace().map(String::from).collect();
                }
                _ => {}
            },
            ["origin", "time", "value"] => {
                let uncertainty = self.time.uncertainty;
                self.time = parse_origin_time(text)?;
                self.time.uncertainty = uncertainty;
            }
            ["origin", "time", "uncertainty"] => self.time.uncertainty = number(&element, text)?,
            ["origin", "latitude", "value"] => self.latitude = number(&element, text)?,
            ["origin", "latitude", "uncertainty"] => self.latitude_uncertainty = number(&element, text)?,
            ["origin", "longitude", "value"] => self.longitude = number(&element, text)?,
            ["origin", "longitude", "uncertainty"] => self.longitude_uncertainty = number(&element, text)?,
            ["origin", "depth", "value"] => self.depth = number(&element, text)?,
            ["origin", "depth", "uncertainty"] => self.depth_uncertainty = number(&element, text)?,
            ["origin", "originUncertainty", field] => {
                let value = number(&element, text)?;
                match *field {
                    "horizontalUncertainty" => self.horizontal.horizontal = value,
                    "minHorizontalUncertainty" => self.horizontal.min_horizontal = value,
                    "maxHorizontalUncertainty" => self.horizontal.max_horizontal = value,
                    "azimuthMaxHorizontalUncertainty" => self.horizontal.azimuth_max_horizontal = value,
                    _ => {}
                }
            }
            ["origin", "creationInfo", "agencyID"] => self.agency = Some(text.to_string()),
            ["magnitude", "mag", "value"] => self.magnitude = number(&element, text)?,
            ["magnitude", "mag", "uncertainty"] => self.magnitude_uncertainty = number(&element, text)?,
            ["focalMechanism", "nodalPlanes", "nodalPlane1", angle, part] => {
                let value = number(&element, text)?;
                let m = &mut self.mechanism;
                match (*angle, *part) {
                    ("strike", "value") => m.strike = value,
                    ("strike", "uncertainty") => m.strike_uncertainty = value,
                    ("dip", "value") => m.dip = value,
                    ("dip", "uncertainty") => m.dip_uncertainty = value,
                    ("rake", "value") => m.rake = value,
                    ("rake", "uncertainty") => m.rake_uncertainty = value,
                    _ => {}
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn build(mut self) -> Result<Event, QuakeMlError> {
        for part in &self.absent_time {
            clear_time_part(&mut self.time, part);
        }
        let missing = |element: &str| QuakeMlError::MissingElement {
            event: self.event_id.clone(),
            element: element.to_string(),
        };
        Ok(Event {
            event_type: self.event_type.ok_or_else(|| missing("description/text"))?,
            longitude: self.longitude.ok_or_else(|| missing("origin/longitude"))?,
            latitude: self.latitude.ok_or_else(|| missing("origin/latitude"))?,
            depth: self.depth.ok_or_else(|| missing("origin/depth"))?,
            magnitude: self.magnitude.ok_or_else(|| missing("magnitude/mag"))?,
            agency: self.agency,
            identifier: self.identifier,
            time: self.time,
            longitude_uncertainty: self.longitude_uncertainty,
            latitude_uncertainty: self.latitude_uncertainty,
            horizontal: self.horizontal,
            depth_uncertainty: self.depth_uncertainty,
            magnitude_uncertainty: self.magnitude_uncertainty,
            mechanism: self.mechanism,
            probability: self.probability,
            event_id: self.event_id,
        })
    }
}

fn attribute(start: &BytesStart<'_>, name: &str) -> Result<Option<String>, QuakeMlError> {
    match start.try_get_attribute(name).map_err(xml_err)? {
        Some(attr) => Ok(Some(attr.unescape_value().map_err(xml_err)?.into_owned())),
        None => Ok(None),
    }
}

/// Parses a QuakeML document produced by `write_catalog` back into events.
pub fn read_catalog(xml: &str) -> Result<Vec<Event>, QuakeMlError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut events = Vec::new();
    let mut path: Vec<String> = Vec::new();
    let mut current: Option<EventBuilder> = None;

    loop {
        match reader.read_event().map_err(xml_err)? {
            XmlEvent::Start(start) => {
                let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
                match name.as_str() {
                    "event" => {
                        let public_id = attribute(&start, "publicID")?.unwrap_or_default();
                        current = Some(EventBuilder {
                            event_id: public_id.strip_prefix(RESOURCE_PREFIX).unwrap_or(&public_id).to_string(),
                            ..EventBuilder::default()
                        });
                    }
                    "comment" => {
                        if let Some(builder) = current.as_mut() {
                            builder.comment_id = attribute(&start, "id")?;
                            // An empty identifier has no text node.
                            if builder.comment_id.as_deref().is_some_and(|id| id.ends_with("/identifier")) {
                                builder.identifier = Some(String::new());
                            }
                        }
                    }
                    _ => {}
                }
                path.push(name);
            }
            XmlEvent::Text(text) => {
                if let Some(builder) = current.as_mut() {
                    let value = text.unescape().map_err(xml_err)?;
                    if let Some(pos) = path.iter().rposition(|p| p == "event") {
                        let tail: Vec<&str> = path[pos + 1..].iter().map(String::as_str).collect();
                        builder.assign(&tail, value.trim())?;
                    }
                }
            }
            XmlEvent::End(_) => {
                if path.pop().as_deref() == Some("event") {
                    if let Some(builder) = current.take() {
                        events.push(builder.build()?);
                    }
                }
            }
            XmlEvent::Eof => break,
            _ => {}
        }
    }

    Ok(events)
}

/// Reads a QuakeML file.
pub fn read_catalog_file(path: impl AsRef<Path>) -> Result<Vec<Event>, QuakeMlError> {
    let contents = fs::read_to_string(path)?;
    read_catalog(&contents)
}

/// Shared fixtures for unit tests.

use crate::model::{Event, EventType, FocalMechanism, HorizontalUncertainty, OriginTime};

/// A stochastic event with only the fields the engine looks at filled in.
pub fn stochastic(event_id: &str, lon: f64, lat: f64, mag: f64) -> Event {
    Event {
        event_id: event_id.to_string(),
        agency: Some("GFZ".to_string()),
        identifier: None,
        time: OriginTime::default(),
        longitude: lon,
        longitude_uncertainty: None,
        latitude: lat,
        latitude_uncertainty: None,
        horizontal: HorizontalUncertainty::default(),
        depth: 30.0,
        depth_uncertainty: None,
        magnitude: mag,
        magnitude_uncertainty: None,
        mechanism: FocalMechanism::default(),
        event_type: EventType::Stochastic,
        probability: Some(1e-4),
    }
}

pub fn typed(event_id: &str, event_type: EventType, mag: f64) -> Event {
    Event {
        event_type,
        ..stochastic(event_id, -71.5, -33.0, mag)
    }
}

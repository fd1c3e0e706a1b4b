/// Snaps event coordinates to disaggregation bin centers.

use crate::model::{Event, Precision};

/// Bin-snapped coordinates of one candidate event.
///
/// `row` is the index of the event in the slice passed to [`bin_events`], so
/// the original (un-binned) record can be recovered after matching.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinnedEvent {
    pub row: usize,
    pub longitude: f64,
    pub latitude: f64,
    pub magnitude: f64,
}

/// Rounds `value` to the nearest multiple of `precision`.
///
/// Ties go to the even multiple (`f64::round_ties_even`), so an event lying
/// exactly on a bin edge always lands in the same bin regardless of sign.
pub fn snap(value: f64, precision: f64) -> f64 {
    (value / precision).round_ties_even() * precision
}

/// Bins every event on longitude, latitude, and magnitude independently.
///
/// Output is in input order, one entry per event. Precision values must be
/// positive; `infer_precision` guarantees that.
pub fn bin_events(events: &[Event], precision: &Precision) -> Vec<BinnedEvent> {
    events
        .iter()
        .enumerate()
        .map(|(row, e)| BinnedEvent {
            row,
            longitude: snap(e.longitude, precision.lon),
            latitude: snap(e.latitude, precision.lat),
            magnitude: snap(e.magnitude, precision.mag),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::stochastic;
    use approx::assert_abs_diff_eq;

    fn event(lon: f64, lat: f64, mag: f64) -> Event {
        stochastic("rup", lon, lat, mag)
    }

    #[test]
    fn test_events_snap_to_nearest_bin_center() {
        let precision = Precision { lon: 0.1, lat: 0.1, mag: 0.25 };
        let binned = bin_events(&[event(-71.63, -33.07, 7.09)], &precision);

        assert_abs_diff_eq!(binned[0].longitude, -71.6, epsilon = 1e-9);
        assert_abs_diff_eq!(binned[0].latitude, -33.1, epsilon = 1e-9);
        assert_abs_diff_eq!(binned[0].magnitude, 7.0, epsilon = 1e-9);
    }

    #[test]
    fn test_row_identity_and_order_are_preserved() {
        let precision = Precision { lon: 0.5, lat: 0.5, mag: 0.5 };
        let events = vec![event(1.0, 1.0, 8.0), event(2.0, 2.0, 6.0), event(3.0, 3.0, 7.0)];
        let binned = bin_events(&events, &precision);

        let rows: Vec<usize> = binned.iter().map(|b| b.row).collect();
        assert_eq!(rows, vec![0, 1, 2]);
        assert_abs_diff_eq!(binned[1].magnitude, 6.0);
    }

    #[test]
    fn test_half_way_values_round_to_even_multiple() {
        // 7.125 / 0.25 = 28.5 -> 28 -> 7.0 ; 7.375 / 0.25 = 29.5 -> 30 -> 7.5
        assert_abs_diff_eq!(snap(7.125, 0.25), 7.0);
        assert_abs_diff_eq!(snap(7.375, 0.25), 7.5);
        // Sign does not change the tie rule.
        assert_abs_diff_eq!(snap(-7.125, 0.25), -7.0);
    }

    #[test]
    fn test_binning_is_idempotent() {
        let p = 0.1;
        for v in [-71.63, 100.04, 0.05, 179.96] {
            let once = snap(v, p);
            assert_abs_diff_eq!(snap(once, p), once, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_empty_input_gives_empty_output() {
        let precision = Precision { lon: 0.1, lat: 0.1, mag: 0.1 };
        assert!(bin_events(&[], &precision).is_empty());
    }
}

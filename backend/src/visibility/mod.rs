//! Target visibility from an observing site.
//!
//! Times are [`ModifiedJulianDate`]; the intervals stored in a
//! [`RiseSetIndex`] built here are raw MJD values. Altitudes and the
//! crossing searches come from `siderust`.

pub mod ephemeris;

pub use ephemeris::{
    angular_separation, gmst, local_sidereal_time, moon_illumination, moon_position,
    moon_separation, sun_position, EquatorialCoord,
};

use qtty::{Degrees, Hours};
use serde::{Deserialize, Serialize};
use siderust::bodies::Sun;
use siderust::coordinates::centers::Geodetic;
use siderust::coordinates::frames::ECEF;
use siderust::event::altitude::{above_threshold, below_threshold, AltitudeProvider, SearchOpts};
use siderust::qtty::{Meter, Quantity};
use siderust::time::Interval;

use crate::models::{ModifiedJulianDate, Target};
use crate::rise_set::{RiseSetIndex, RiseSetPair};

/// Astronomical twilight: Sun 18 degrees below the horizon.
pub const ASTRONOMICAL_TWILIGHT: f64 = -18.0;

const CROSSING_TOLERANCE_DAYS: f64 = 1.0 / 86_400.0;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VisibilityError {
    #[error("Sampling step must be positive, got {0} hours")]
    InvalidStep(f64),
    #[error("Search window ends ({end}) before it starts ({start})")]
    InvalidWindow { start: f64, end: f64 },
}

/// Observer location; longitude is east-positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub latitude: Degrees,
    pub longitude: Degrees,
    #[serde(default)]
    pub elevation_m: f64,
}

impl Site {
    pub fn new(latitude: impl Into<Degrees>, longitude: impl Into<Degrees>, elevation_m: f64) -> Self {
        Self {
            latitude: latitude.into(),
            longitude: longitude.into(),
            elevation_m,
        }
    }

    pub fn geodetic(&self) -> Geodetic<ECEF> {
        Geodetic::<ECEF>::new(
            siderust::qtty::Degrees::new(self.longitude.value()),
            siderust::qtty::Degrees::new(self.latitude.value()),
            Quantity::<Meter>::new(self.elevation_m),
        )
    }
}

impl From<&Target> for EquatorialCoord {
    fn from(target: &Target) -> Self {
        EquatorialCoord::new(target.ra, target.dec)
    }
}

/// Geometric altitude of `coord` above the horizon (no refraction).
pub fn altitude(coord: EquatorialCoord, site: &Site, time: ModifiedJulianDate) -> Degrees {
    let alt = coord
        .to_icrs()
        .altitude_at(&site.geodetic(), ephemeris::siderust_mjd(time));
    Degrees::new(alt.value().to_degrees())
}

/// Plane-parallel airmass, `sec(z)`. `None` at or below the horizon.
pub fn airmass(altitude: Degrees) -> Option<f64> {
    let alt = altitude.value();
    if alt <= 0.0 {
        return None;
    }
    Some(1.0 / alt.to_radians().sin())
}

/// Samples of `(time, airmass)` between `start` and `end`.
///
/// Samples below the horizon or above `max_airmass` carry `None`.
pub fn airmass_series(
    coord: EquatorialCoord,
    site: &Site,
    start: ModifiedJulianDate,
    end: ModifiedJulianDate,
    step: Hours,
    max_airmass: f64,
) -> Result<Vec<(ModifiedJulianDate, Option<f64>)>, VisibilityError> {
    sample_times(start, end, step).map(|times| {
        times
            .map(|t| {
                let value = airmass(altitude(coord, site, t)).filter(|am| *am <= max_airmass);
                (t, value)
            })
            .collect()
    })
}

/// Intervals in `[start, end]` during which `coord` is above `min_altitude`.
///
/// `step` is validated like the other sampled helpers; the crossing search
/// itself is `siderust`'s, refined to about one second. Intervals already
/// in progress at `start`, or still open at `end`, are clipped to the window.
pub fn rise_set_intervals(
    coord: EquatorialCoord,
    site: &Site,
    start: ModifiedJulianDate,
    end: ModifiedJulianDate,
    step: Hours,
    min_altitude: Degrees,
) -> Result<RiseSetIndex, VisibilityError> {
    let Some(window) = search_window(start, end, step)? else {
        return Ok(RiseSetIndex::new());
    };
    let threshold = siderust::qtty::Degrees::new(min_altitude.value());
    let found = above_threshold(
        &coord.to_icrs(),
        &site.geodetic(),
        window,
        threshold,
        search_opts(),
    );
    Ok(to_index(found))
}

/// Astronomical nights: Sun below [`ASTRONOMICAL_TWILIGHT`].
pub fn night_intervals(
    site: &Site,
    start: ModifiedJulianDate,
    end: ModifiedJulianDate,
    step: Hours,
) -> Result<RiseSetIndex, VisibilityError> {
    let Some(window) = search_window(start, end, step)? else {
        return Ok(RiseSetIndex::new());
    };
    let found = below_threshold(
        &Sun,
        &site.geodetic(),
        window,
        siderust::twilight::ASTRONOMICAL,
        search_opts(),
    );
    Ok(to_index(found))
}

/// Whether `time` falls inside one of the indexed intervals.
pub fn is_observable(index: &RiseSetIndex, time: ModifiedJulianDate) -> bool {
    index.active_at(time.value()).is_some()
}

fn validate(
    start: ModifiedJulianDate,
    end: ModifiedJulianDate,
    step: Hours,
) -> Result<(), VisibilityError> {
    if step.value().is_nan() || step.value() <= 0.0 {
        return Err(VisibilityError::InvalidStep(step.value()));
    }
    if end.value() < start.value() {
        return Err(VisibilityError::InvalidWindow {
            start: start.value(),
            end: end.value(),
        });
    }
    Ok(())
}

fn sample_times(
    start: ModifiedJulianDate,
    end: ModifiedJulianDate,
    step: Hours,
) -> Result<impl Iterator<Item = ModifiedJulianDate>, VisibilityError> {
    validate(start, end, step)?;
    let step_days = step.value() / 24.0;
    let span = end.value() - start.value();
    let steps = (span / step_days).ceil() as usize;
    Ok((0..=steps).map(move |i| {
        ModifiedJulianDate::new((start.value() + i as f64 * step_days).min(end.value()))
    }))
}

/// `None` for an empty window.
fn search_window(
    start: ModifiedJulianDate,
    end: ModifiedJulianDate,
    step: Hours,
) -> Result<Option<Interval<siderust::time::ModifiedJulianDate>>, VisibilityError> {
    validate(start, end, step)?;
    if end.value() == start.value() {
        return Ok(None);
    }
    Ok(Some(Interval::new(
        ephemeris::siderust_mjd(start),
        ephemeris::siderust_mjd(end),
    )))
}

fn search_opts() -> SearchOpts {
    SearchOpts {
        time_tolerance: siderust::qtty::Days::new(CROSSING_TOLERANCE_DAYS),
    }
}

fn to_index(found: Vec<Interval<siderust::time::ModifiedJulianDate>>) -> RiseSetIndex {
    let mut index = RiseSetIndex::new();
    for interval in found {
        index.insert_pair(RiseSetPair::new(
            interval.start.raw().value(),
            interval.end.raw().value(),
        ));
    }
    index
}

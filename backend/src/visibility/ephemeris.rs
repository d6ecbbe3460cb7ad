//! Sidereal time and Sun/Moon geometry on top of `siderust`.
//!
//! Values cross the boundary as plain `f64`: `siderust` carries its own
//! units crate, while the rest of this crate uses `qtty` 0.2.

use qtty::Degrees;
use siderust::astro::earth_rotation::gmst_default;
use siderust::bodies::{Moon, Sun};
use siderust::coordinates::centers::Geodetic;
use siderust::coordinates::frames::ECEF;
use siderust::coordinates::spherical::direction;
use siderust::qtty::{AstronomicalUnit, Kilometer};
use siderust::time::JulianDate;

use crate::models::ModifiedJulianDate;

/// JD of the J2000.0 epoch.
pub const J2000: f64 = 2_451_545.0;

/// Equatorial (RA, Dec) direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquatorialCoord {
    pub ra: Degrees,
    pub dec: Degrees,
}

impl EquatorialCoord {
    pub fn new(ra: impl Into<Degrees>, dec: impl Into<Degrees>) -> Self {
        Self {
            ra: ra.into(),
            dec: dec.into(),
        }
    }

    pub(crate) fn to_icrs(self) -> direction::ICRS {
        direction::ICRS::new(
            siderust::qtty::Degrees::new(self.ra.value()),
            siderust::qtty::Degrees::new(self.dec.value()),
        )
    }
}

fn wrap_degrees(deg: f64) -> f64 {
    deg.rem_euclid(360.0)
}

pub(crate) fn julian_date(time: ModifiedJulianDate) -> JulianDate {
    JulianDate::new(time.julian_date())
}

pub(crate) fn siderust_mjd(time: ModifiedJulianDate) -> siderust::time::ModifiedJulianDate {
    siderust::time::ModifiedJulianDate::new(time.value())
}

/// Greenwich mean sidereal time.
pub fn gmst(time: ModifiedJulianDate) -> Degrees {
    Degrees::new(wrap_degrees(gmst_default(julian_date(time)).value().to_degrees()))
}

/// Local mean sidereal time at an east-positive `longitude`.
pub fn local_sidereal_time(time: ModifiedJulianDate, longitude: Degrees) -> Degrees {
    Degrees::new(wrap_degrees(gmst(time).value() + longitude.value()))
}

/// Apparent geocentric position of the Sun, true equator of date.
pub fn sun_position(time: ModifiedJulianDate) -> EquatorialCoord {
    let sun = Sun::get_apparent_geocentric_equ::<AstronomicalUnit>(julian_date(time));
    EquatorialCoord::new(wrap_degrees(sun.ra().value()), sun.dec().value())
}

/// Apparent topocentric position of the Moon, true equator of date.
pub fn moon_position(time: ModifiedJulianDate, site: Geodetic<ECEF>) -> EquatorialCoord {
    let moon = Moon::get_apparent_topocentric_equ::<Kilometer>(julian_date(time), site);
    EquatorialCoord::new(wrap_degrees(moon.ra().value()), moon.dec().value())
}

/// Great-circle distance using the Vincenty formula (stable at 0 and 180 degrees).
pub fn angular_separation(a: EquatorialCoord, b: EquatorialCoord) -> Degrees {
    let (ra1, dec1) = (a.ra.value().to_radians(), a.dec.value().to_radians());
    let (ra2, dec2) = (b.ra.value().to_radians(), b.dec.value().to_radians());
    let dra = ra2 - ra1;

    let num = ((dec2.cos() * dra.sin()).powi(2)
        + (dec1.cos() * dec2.sin() - dec1.sin() * dec2.cos() * dra.cos()).powi(2))
    .sqrt();
    let den = dec1.sin() * dec2.sin() + dec1.cos() * dec2.cos() * dra.cos();
    Degrees::new(num.atan2(den).to_degrees())
}

/// Distance between a target direction and the Moon seen from `site`.
pub fn moon_separation(
    target: EquatorialCoord,
    site: Geodetic<ECEF>,
    time: ModifiedJulianDate,
) -> Degrees {
    angular_separation(target, moon_position(time, site))
}

/// Illuminated fraction of the lunar disk, 0 (new) to 1 (full).
pub fn moon_illumination(time: ModifiedJulianDate) -> f64 {
    Moon::phase_geocentric(julian_date(time))
        .illuminated_fraction
        .value()
}

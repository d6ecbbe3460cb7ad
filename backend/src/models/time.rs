use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Offset between Julian Date and Modified Julian Date.
pub const MJD_OFFSET: f64 = 2_400_000.5;

/// MJD of the Unix epoch (1970-01-01 00:00:00 UTC).
const MJD_UNIX_EPOCH: f64 = 40587.0;

/// Modified Julian Date representation.
/// MJD 0 = 1858-11-17 00:00:00 UTC
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct ModifiedJulianDate(qtty::Days);

impl ModifiedJulianDate {
    /// Create a new MJD value.
    pub fn new<V: Into<qtty::Days>>(v: V) -> Self {
        Self(v.into())
    }

    /// Raw MJD value as f64.
    pub fn value(&self) -> f64 {
        self.0.value()
    }

    /// Julian Date for this instant.
    pub fn julian_date(&self) -> f64 {
        self.value() + MJD_OFFSET
    }

    pub fn from_julian_date(jd: f64) -> Self {
        Self::new(jd - MJD_OFFSET)
    }

    /// Convert to Unix timestamp (seconds since 1970-01-01 00:00:00 UTC).
    pub fn to_unix_timestamp(&self) -> f64 {
        (self.value() - MJD_UNIX_EPOCH) * 86400.0
    }

    /// Create from Unix timestamp (seconds since 1970-01-01 00:00:00 UTC).
    pub fn from_unix_timestamp(timestamp: f64) -> Self {
        Self::new(timestamp / 86400.0 + MJD_UNIX_EPOCH)
    }

    /// Convert to chrono DateTime<Utc>.
    pub fn to_datetime(&self) -> DateTime<Utc> {
        let secs = self.to_unix_timestamp();
        let secs_i64 = secs.floor() as i64;
        let nanos = ((secs - secs.floor()) * 1e9) as u32;
        DateTime::from_timestamp(secs_i64, nanos).unwrap_or(DateTime::UNIX_EPOCH)
    }

    /// Create from chrono DateTime<Utc>.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self::from_unix_timestamp(dt.timestamp() as f64 + dt.timestamp_subsec_nanos() as f64 / 1e9)
    }

    /// Shift by a duration expressed in hours.
    pub fn add_hours(&self, hours: qtty::Hours) -> Self {
        Self(self.0 + hours.to::<qtty::Day>())
    }

    /// Signed distance `self - earlier`.
    pub fn days_since(&self, earlier: ModifiedJulianDate) -> qtty::Days {
        self.0 - earlier.0
    }
}

impl From<f64> for ModifiedJulianDate {
    fn from(v: f64) -> Self {
        ModifiedJulianDate::new(v)
    }
}

impl From<DateTime<Utc>> for ModifiedJulianDate {
    fn from(dt: DateTime<Utc>) -> Self {
        ModifiedJulianDate::from_datetime(dt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_mjd_to_unix_timestamp() {
        // MJD 40587.0 corresponds to Unix epoch (1970-01-01)
        let mjd = ModifiedJulianDate::new(40587.0);
        assert!((mjd.to_unix_timestamp()).abs() < 1.0);
    }

    #[test]
    fn test_mjd_roundtrip_datetime() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 1, 6, 30, 0).unwrap();
        let mjd = ModifiedJulianDate::from_datetime(dt);
        let back = mjd.to_datetime();
        assert!((back - dt).num_milliseconds().abs() < 1);
    }

    #[test]
    fn test_j2000_julian_date() {
        let dt = Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap();
        let mjd = ModifiedJulianDate::from_datetime(dt);
        assert!((mjd.julian_date() - 2_451_545.0).abs() < 1e-6);
        assert!((mjd.value() - 51544.5).abs() < 1e-6);
    }

    #[test]
    fn test_add_hours() {
        let mjd = ModifiedJulianDate::new(60000.0);
        let later = mjd.add_hours(qtty::Hours::new(36.0));
        assert!((later.value() - 60001.5).abs() < 1e-9);
        assert!((later.days_since(mjd).value() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_mjd_ordering() {
        let mjd1 = ModifiedJulianDate::new(50000.0);
        let mjd2 = ModifiedJulianDate::new(51000.0);

        assert!(mjd1 < mjd2);
        assert!(mjd2 > mjd1);
    }
}

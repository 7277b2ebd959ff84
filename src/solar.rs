//! Sunrise for a fixed site, from the standard sunrise equation.
//!
//! Accuracy is a few minutes, which is plenty for a deadline polled every
//! thirty seconds.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use crate::config::ObservatoryConfig;
use crate::error::{Error, Result};

const J2000: f64 = 2_451_545.0;
const UNIX_EPOCH_JD: f64 = 2_440_587.5;
const OBLIQUITY_DEG: f64 = 23.4397;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Site {
    pub latitude_deg: f64,
    /// East positive.
    pub longitude_deg: f64,
    pub horizon_deg: f64,
}

impl From<&ObservatoryConfig> for Site {
    fn from(cfg: &ObservatoryConfig) -> Self {
        Self {
            latitude_deg: cfg.latitude_deg,
            longitude_deg: cfg.longitude_deg,
            horizon_deg: cfg.horizon_deg,
        }
    }
}

fn to_julian(t: DateTime<Utc>) -> f64 {
    t.timestamp_millis() as f64 / 86_400_000.0 + UNIX_EPOCH_JD
}

fn from_julian(jd: f64) -> Option<DateTime<Utc>> {
    let millis = ((jd - UNIX_EPOCH_JD) * 86_400_000.0).round() as i64;
    Utc.timestamp_millis_opt(millis).single()
}

impl Site {
    /// Sunrise belonging to the solar day whose local noon falls on `date`
    /// (UTC calendar).
    pub fn sunrise_on(&self, date: NaiveDate) -> Result<DateTime<Utc>> {
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .map(|dt| Utc.from_utc_datetime(&dt))
            .ok_or_else(|| Error::Astronomy(format!("invalid date {date}")))?;

        let n = (to_julian(midnight) - J2000 + 0.0008).ceil();
        let mean_solar_noon = n - self.longitude_deg / 360.0;

        let m = (357.5291 + 0.985_600_28 * mean_solar_noon).rem_euclid(360.0);
        let m_rad = m.to_radians();
        let center = 1.9148 * m_rad.sin() + 0.0200 * (2.0 * m_rad).sin()
            + 0.0003 * (3.0 * m_rad).sin();
        let ecliptic_lon = (m + center + 180.0 + 102.9372).rem_euclid(360.0).to_radians();

        let transit = J2000 + mean_solar_noon + 0.0053 * m_rad.sin()
            - 0.0069 * (2.0 * ecliptic_lon).sin();

        let sin_dec = ecliptic_lon.sin() * OBLIQUITY_DEG.to_radians().sin();
        let cos_dec = sin_dec.asin().cos();
        let lat = self.latitude_deg.to_radians();
        let cos_hour_angle = (self.horizon_deg.to_radians().sin() - lat.sin() * sin_dec)
            / (lat.cos() * cos_dec);

        if !(-1.0..=1.0).contains(&cos_hour_angle) {
            return Err(Error::Astronomy(format!(
                "sun does not cross {:.2} deg at latitude {:.3} on {}",
                self.horizon_deg, self.latitude_deg, date
            )));
        }

        let hour_angle_deg = cos_hour_angle.acos().to_degrees();
        from_julian(transit - hour_angle_deg / 360.0)
            .ok_or_else(|| Error::Astronomy(format!("sunrise out of range on {date}")))
    }

    /// First sunrise strictly after `now`.
    pub fn next_sunrise(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let today = now.date_naive();
        for offset in -1..=2 {
            let date = today + Duration::days(offset);
            let rise = self.sunrise_on(date)?;
            if rise > now {
                return Ok(rise);
            }
        }
        Err(Error::Astronomy(format!("no sunrise found after {now}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ObservatoryConfig;
    use chrono::Timelike;

    fn palomar() -> Site {
        Site::from(&ObservatoryConfig::default())
    }

    #[test]
    fn test_palomar_summer_solstice_sunrise() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
        let rise = palomar().sunrise_on(date).unwrap();
        // About 05:44 PDT
        let minutes = rise.hour() * 60 + rise.minute();
        assert!(
            (12 * 60 + 20..=13 * 60 + 10).contains(&minutes),
            "unexpected sunrise {rise}"
        );
        assert_eq!(rise.date_naive(), date);
    }

    #[test]
    fn test_winter_sunrise_later_than_summer() {
        let site = palomar();
        let summer = site
            .sunrise_on(NaiveDate::from_ymd_opt(2024, 6, 21).unwrap())
            .unwrap();
        let winter = site
            .sunrise_on(NaiveDate::from_ymd_opt(2024, 12, 21).unwrap())
            .unwrap();
        let summer_min = summer.hour() * 60 + summer.minute();
        let winter_min = winter.hour() * 60 + winter.minute();
        assert!(winter_min > summer_min + 60);
    }

    #[test]
    fn test_next_sunrise_is_after_now_and_within_a_day() {
        let site = palomar();
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 4, 0, 0).unwrap();
        let rise = site.next_sunrise(now).unwrap();
        assert!(rise > now);
        assert!(rise - now < Duration::hours(24));

        // Just after sunrise, the next one is tomorrow's
        let later = rise + Duration::minutes(1);
        let next = site.next_sunrise(later).unwrap();
        assert!(next - rise > Duration::hours(23));
    }

    #[test]
    fn test_polar_night_is_error() {
        let site = Site {
            latitude_deg: 80.0,
            longitude_deg: 0.0,
            horizon_deg: 0.0,
        };
        let date = NaiveDate::from_ymd_opt(2024, 12, 21).unwrap();
        assert!(matches!(site.sunrise_on(date), Err(Error::Astronomy(_))));
    }
}

//! Lead-time identifiers and the naming conventions derived from them.
//!
//! A lead time is identified by the model run's issuance time and the
//! forecast offset in whole hours. DWD publishes one file per lead time:
//!
//! ```text
//! icon-d2_germany_regular-lat-lon_single-level_2024060100_003_2d_tot_prec.grib2.bz2
//!                                              ^issuance  ^offset
//! ```
//!
//! Locally each lead time gets its own directory named
//! `dd.mm.YYYY_HH:MM_{valid unix time}`, e.g. `01.06.2024_03:00_1717210800`.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Identifies one forecast lead time of one model run.
///
/// Ordered by issuance, then offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LeadTimeId {
    /// Model run issuance time
    pub issued: DateTime<Utc>,
    /// Forecast offset in hours
    pub offset_hours: u32,
}

impl LeadTimeId {
    pub fn new(issued: DateTime<Utc>, offset_hours: u32) -> Self {
        Self {
            issued,
            offset_hours,
        }
    }

    /// The lead time one hour earlier in the same run, if any.
    pub fn predecessor(&self) -> Option<Self> {
        self.offset_hours
            .checked_sub(1)
            .map(|offset| Self::new(self.issued, offset))
    }

    /// The lead time one hour later in the same run.
    pub fn successor(&self) -> Option<Self> {
        self.offset_hours
            .checked_add(1)
            .map(|offset| Self::new(self.issued, offset))
    }

    /// Whether `next` directly follows `self` in the same run.
    pub fn is_followed_by(&self, next: &LeadTimeId) -> bool {
        self.issued == next.issued && self.successor().map_or(false, |s| s == *next)
    }

    /// Time the forecast is valid for.
    pub fn valid_time(&self) -> DateTime<Utc> {
        self.issued + Duration::hours(i64::from(self.offset_hours))
    }

    /// Parse a DWD open-data file name (with or without directories and
    /// compression suffix).
    ///
    /// Returns `None` if the name has no `_{YYYYMMDDHH}_{FFF}_` pair.
    pub fn from_filename(file_path: &str) -> Option<Self> {
        let filename = Path::new(file_path).file_name().and_then(|s| s.to_str())?;

        let tokens: Vec<&str> = filename.split('_').collect();
        tokens.windows(2).find_map(|pair| {
            let (stamp, offset) = (pair[0], pair[1]);
            if stamp.len() != 10 || offset.len() != 3 || !is_digits(stamp) || !is_digits(offset) {
                return None;
            }
            let naive = NaiveDateTime::parse_from_str(&format!("{}00", stamp), "%Y%m%d%H%M").ok()?;
            let offset_hours = offset.parse::<u32>().ok()?;
            Some(Self::new(Utc.from_utc_datetime(&naive), offset_hours))
        })
    }

    /// Local directory name for this lead time.
    pub fn dir_name(&self) -> String {
        format!(
            "{}_{:02}:{:02}_{}",
            self.issued.format("%d.%m.%Y"),
            self.offset_hours,
            0,
            self.valid_time().timestamp()
        )
    }

    /// Inverse of [`LeadTimeId::dir_name`].
    pub fn from_dir_name(name: &str) -> Option<Self> {
        let mut parts = name.split('_');
        let date = parts.next()?;
        let offset = parts.next()?;
        let valid = parts.next()?;
        if parts.next().is_some() {
            return None;
        }

        let (hours, minutes) = offset.split_once(':')?;
        if minutes != "00" {
            return None;
        }
        let offset_hours = hours.parse::<u32>().ok()?;
        let valid = Utc.timestamp_opt(valid.parse::<i64>().ok()?, 0).single()?;
        let issued = valid - Duration::hours(i64::from(offset_hours));

        let id = Self::new(issued, offset_hours);
        (id.issued.format("%d.%m.%Y").to_string() == date).then_some(id)
    }
}

impl fmt::Display for LeadTimeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{:03}", self.issued.format("%Y%m%d%H"), self.offset_hours)
    }
}

fn is_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issued() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_from_filename() {
        let id = LeadTimeId::from_filename(
            "icon-d2_germany_regular-lat-lon_single-level_2024060100_003_2d_tot_prec.grib2.bz2",
        )
        .unwrap();
        assert_eq!(id.issued, issued());
        assert_eq!(id.offset_hours, 3);
    }

    #[test]
    fn test_from_filename_with_directory() {
        let id = LeadTimeId::from_filename(
            "/data/tot_prec/icon-d2_germany_regular-lat-lon_single-level_2024060112_048_2d_tot_prec.grib2",
        )
        .unwrap();
        assert_eq!(id.issued, Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap());
        assert_eq!(id.offset_hours, 48);
    }

    #[test]
    fn test_from_filename_rejects_unrelated_names() {
        assert!(LeadTimeId::from_filename("gfs_20241201_00z_f003.grib2").is_none());
        assert!(LeadTimeId::from_filename("icon-d2_2024139900_003_x.grib2").is_none());
        assert!(LeadTimeId::from_filename("").is_none());
    }

    #[test]
    fn test_dir_name() {
        let id = LeadTimeId::new(issued(), 3);
        // 2024-06-01T03:00:00Z
        assert_eq!(id.dir_name(), "01.06.2024_03:00_1717210800");
    }

    #[test]
    fn test_dir_name_round_trip_beyond_a_day() {
        let id = LeadTimeId::new(Utc.with_ymd_and_hms(2024, 6, 1, 18, 0, 0).unwrap(), 27);
        assert_eq!(LeadTimeId::from_dir_name(&id.dir_name()), Some(id));
    }

    #[test]
    fn test_from_dir_name_rejects_inconsistent_date() {
        assert!(LeadTimeId::from_dir_name("02.06.2024_03:00_1717210800").is_none());
        assert!(LeadTimeId::from_dir_name("01.06.2024_03:30_1717210800").is_none());
        assert!(LeadTimeId::from_dir_name("grib").is_none());
    }

    #[test]
    fn test_adjacency() {
        let first = LeadTimeId::new(issued(), 0);
        let second = LeadTimeId::new(issued(), 1);
        let other_run = LeadTimeId::new(issued() + Duration::hours(3), 1);

        assert!(first.predecessor().is_none());
        assert_eq!(second.predecessor(), Some(first));
        assert!(first.is_followed_by(&second));
        assert!(!second.is_followed_by(&first));
        assert!(!first.is_followed_by(&other_run));
    }

    #[test]
    fn test_display() {
        assert_eq!(LeadTimeId::new(issued(), 7).to_string(), "2024060100_007");
    }
}

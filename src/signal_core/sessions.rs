//! Trading sessions and kill zones
//!
//! Hour windows are `[start_hour, end_hour)` in the configured time zone
//! (UTC by default). Defaults:
//! - Sessions: Asia 00-07, London 07-12, New York 13-18
//! - Kill zones: Asia Range 00-07, London Open 07-10, New York Open 13-16

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::types::{KillZone, Session};

/// Half-open hour window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl HourWindow {
    pub const fn new(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour,
            end_hour,
        }
    }

    pub fn contains(&self, hour: u32) -> bool {
        hour >= self.start_hour && hour < self.end_hour
    }

    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if self.start_hour >= self.end_hour || self.end_hour > 24 {
            return Err(ConfigError::InvalidWindow {
                name: name.to_string(),
                start: self.start_hour,
                end: self.end_hour,
            });
        }
        Ok(())
    }
}

/// Session and kill-zone calendar
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// IANA time zone the windows are expressed in (default: "UTC")
    pub timezone: String,
    pub asia: HourWindow,
    pub london: HourWindow,
    pub new_york: HourWindow,
    pub asia_range: HourWindow,
    pub london_open: HourWindow,
    pub new_york_open: HourWindow,
    /// Session whose high/low feeds the range tracker (default: Asia)
    pub reference_session: Session,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            asia: HourWindow::new(0, 7),
            london: HourWindow::new(7, 12),
            new_york: HourWindow::new(13, 18),
            asia_range: HourWindow::new(0, 7),
            london_open: HourWindow::new(7, 10),
            new_york_open: HourWindow::new(13, 16),
            reference_session: Session::Asia,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.parse_timezone()?;
        self.asia.validate("asia")?;
        self.london.validate("london")?;
        self.new_york.validate("new_york")?;
        self.asia_range.validate("asia_range")?;
        self.london_open.validate("london_open")?;
        self.new_york_open.validate("new_york_open")?;
        Ok(())
    }

    fn parse_timezone(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::UnknownTimezone(self.timezone.clone()))
    }
}

/// Resolves timestamps to sessions and kill zones
#[derive(Debug, Clone)]
pub struct SessionClock {
    tz: Tz,
    config: SessionConfig,
}

impl SessionClock {
    pub fn new(config: SessionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let tz = config.parse_timezone()?;
        Ok(Self { tz, config })
    }

    fn local_hour(&self, ts: DateTime<Utc>) -> u32 {
        ts.with_timezone(&self.tz).hour()
    }

    /// Calendar date in the session time zone
    pub fn local_date(&self, ts: DateTime<Utc>) -> NaiveDate {
        ts.with_timezone(&self.tz).date_naive()
    }

    fn window(&self, session: Session) -> HourWindow {
        match session {
            Session::Asia => self.config.asia,
            Session::London => self.config.london,
            Session::NewYork => self.config.new_york,
        }
    }

    /// Active session, if any. Earlier sessions win on overlap.
    pub fn session_at(&self, ts: DateTime<Utc>) -> Option<Session> {
        let hour = self.local_hour(ts);
        [Session::Asia, Session::London, Session::NewYork]
            .into_iter()
            .find(|s| self.window(*s).contains(hour))
    }

    /// Active kill zone, if any
    pub fn kill_zone_at(&self, ts: DateTime<Utc>) -> Option<KillZone> {
        let hour = self.local_hour(ts);
        [
            (KillZone::AsiaRange, self.config.asia_range),
            (KillZone::LondonOpen, self.config.london_open),
            (KillZone::NewYorkOpen, self.config.new_york_open),
        ]
        .into_iter()
        .find(|(_, window)| window.contains(hour))
        .map(|(zone, _)| zone)
    }

    /// Whether the range tracker should be widening at `ts`
    pub fn in_reference_session(&self, ts: DateTime<Utc>) -> bool {
        self.window(self.config.reference_session)
            .contains(self.local_hour(ts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_default_sessions() {
        let clock = SessionClock::new(SessionConfig::default()).unwrap();

        assert_eq!(clock.session_at(utc(0, 0)), Some(Session::Asia));
        assert_eq!(clock.session_at(utc(6, 59)), Some(Session::Asia));
        assert_eq!(clock.session_at(utc(7, 0)), Some(Session::London));
        assert_eq!(clock.session_at(utc(11, 59)), Some(Session::London));
        assert_eq!(clock.session_at(utc(12, 30)), None);
        assert_eq!(clock.session_at(utc(13, 0)), Some(Session::NewYork));
        assert_eq!(clock.session_at(utc(17, 59)), Some(Session::NewYork));
        assert_eq!(clock.session_at(utc(18, 0)), None);
        assert_eq!(clock.session_at(utc(23, 0)), None);
    }

    #[test]
    fn test_default_kill_zones() {
        let clock = SessionClock::new(SessionConfig::default()).unwrap();

        assert_eq!(clock.kill_zone_at(utc(3, 0)), Some(KillZone::AsiaRange));
        assert_eq!(clock.kill_zone_at(utc(8, 0)), Some(KillZone::LondonOpen));
        assert_eq!(clock.kill_zone_at(utc(10, 0)), None);
        assert_eq!(clock.kill_zone_at(utc(14, 15)), Some(KillZone::NewYorkOpen));
        assert_eq!(clock.kill_zone_at(utc(16, 0)), None);
    }

    #[test]
    fn test_reference_session() {
        let clock = SessionClock::new(SessionConfig::default()).unwrap();
        assert!(clock.in_reference_session(utc(2, 0)));
        assert!(!clock.in_reference_session(utc(8, 0)));
    }

    #[test]
    fn test_non_utc_timezone() {
        let config = SessionConfig {
            timezone: "America/New_York".to_string(),
            ..Default::default()
        };
        let clock = SessionClock::new(config).unwrap();
        // 05:00 UTC in March (EST, before DST on Mar 9) = 00:00 New York
        assert_eq!(clock.session_at(utc(5, 0)), Some(Session::Asia));
        assert_eq!(
            clock.local_date(utc(3, 0)),
            NaiveDate::from_ymd_opt(2025, 3, 2).unwrap()
        );
    }

    #[test]
    fn test_invalid_config() {
        let bad_tz = SessionConfig {
            timezone: "Mars/Olympus".to_string(),
            ..Default::default()
        };
        assert!(matches!(SessionClock::new(bad_tz), Err(ConfigError::UnknownTimezone(_))));

        let inverted = SessionConfig {
            london: HourWindow::new(12, 7),
            ..Default::default()
        };
        assert!(matches!(
            SessionClock::new(inverted),
            Err(ConfigError::InvalidWindow { .. })
        ));
    }
}

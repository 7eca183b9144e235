//! Time windows a simulation can replay.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use trada_core::Error;

/// Which prices a simulation run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimulationWindow {
    /// Last 24 hours
    LastDay,
    /// Last 7 days
    LastWeek,
    /// Last 30 days
    LastMonth,
    /// Last 10 years
    AllTime,
    /// Ride live price updates instead of replaying history.
    Realtime,
}

impl SimulationWindow {
    pub fn is_realtime(&self) -> bool {
        matches!(self, SimulationWindow::Realtime)
    }

    /// Replay range `(from, to)` ending at `now`; `None` for realtime.
    pub fn range_ending(&self, now: DateTime<Utc>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let from = match self {
            SimulationWindow::LastDay => now - Duration::days(1),
            SimulationWindow::LastWeek => now - Duration::days(7),
            SimulationWindow::LastMonth => now - Duration::days(30),
            SimulationWindow::AllTime => now
                .checked_sub_months(Months::new(120))
                .unwrap_or_else(|| now - Duration::days(3650)),
            SimulationWindow::Realtime => return None,
        };
        Some((from, now))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SimulationWindow::LastDay => "LAST_DAY",
            SimulationWindow::LastWeek => "LAST_WEEK",
            SimulationWindow::LastMonth => "LAST_MONTH",
            SimulationWindow::AllTime => "ALL_TIME",
            SimulationWindow::Realtime => "REALTIME",
        }
    }
}

impl fmt::Display for SimulationWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SimulationWindow {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LAST_DAY" => Ok(SimulationWindow::LastDay),
            "LAST_WEEK" => Ok(SimulationWindow::LastWeek),
            "LAST_MONTH" => Ok(SimulationWindow::LastMonth),
            "ALL_TIME" | "THE_LOT" => Ok(SimulationWindow::AllTime),
            "REALTIME" => Ok(SimulationWindow::Realtime),
            other => Err(Error::InvalidWindow(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse() {
        assert_eq!("LAST_DAY".parse::<SimulationWindow>().unwrap(), SimulationWindow::LastDay);
        assert_eq!("THE_LOT".parse::<SimulationWindow>().unwrap(), SimulationWindow::AllTime);
        assert_eq!("REALTIME".parse::<SimulationWindow>().unwrap(), SimulationWindow::Realtime);

        let err = "YESTERDAY".parse::<SimulationWindow>().unwrap_err();
        assert_eq!(err.to_string(), "When value YESTERDAY is not valid");
        assert_eq!(err.kind(), trada_core::ErrorKind::Validation);
    }

    #[test]
    fn test_ranges() {
        let now = Utc.with_ymd_and_hms(2018, 5, 5, 12, 0, 0).unwrap();

        assert_eq!(
            SimulationWindow::LastWeek.range_ending(now),
            Some((now - Duration::days(7), now))
        );
        assert_eq!(
            SimulationWindow::AllTime.range_ending(now),
            Some((Utc.with_ymd_and_hms(2008, 5, 5, 12, 0, 0).unwrap(), now))
        );
        assert_eq!(SimulationWindow::Realtime.range_ending(now), None);
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for window in [
            SimulationWindow::LastDay,
            SimulationWindow::LastMonth,
            SimulationWindow::AllTime,
        ] {
            assert_eq!(window.to_string().parse::<SimulationWindow>().unwrap(), window);
        }
    }
}

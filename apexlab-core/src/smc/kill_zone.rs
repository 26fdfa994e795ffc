//! Kill-zone session classification.
//!
//! Classifies UTC timestamps into ICT trading sessions by converting to
//! US-Eastern local time; chrono-tz handles the EDT/EST transition.

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::America::New_York;
use serde::{Deserialize, Serialize};

/// ICT trading sessions in US-Eastern local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Session {
    /// 02:00-04:59 ET
    LondonOpen,
    /// 07:00-09:59 ET
    NyOpen,
    /// 10:00-11:59 ET
    LondonClose,
    /// 14:00-15:59 ET
    NyClose,
    OffSession,
}

/// Classify a timestamp into its ET session bucket.
pub fn classify_session(timestamp: DateTime<Utc>) -> Session {
    let hour = timestamp.with_timezone(&New_York).hour();
    match hour {
        2..=4 => Session::LondonOpen,
        7..=9 => Session::NyOpen,
        10..=11 => Session::LondonClose,
        14..=15 => Session::NyClose,
        _ => Session::OffSession,
    }
}

/// Filters timestamps against a configured set of active sessions.
#[derive(Debug, Clone)]
pub struct KillZoneFilter {
    active_sessions: Vec<Session>,
}

impl Default for KillZoneFilter {
    fn default() -> Self {
        Self {
            active_sessions: vec![Session::LondonOpen, Session::NyOpen, Session::NyClose],
        }
    }
}

impl KillZoneFilter {
    pub fn new(active_sessions: Vec<Session>) -> Self {
        Self { active_sessions }
    }

    pub fn is_kill_zone(&self, timestamp: DateTime<Utc>) -> bool {
        self.active_sessions.contains(&classify_session(timestamp))
    }
}

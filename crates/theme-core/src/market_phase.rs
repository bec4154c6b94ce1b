use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Trading-session phase in Korea Standard Time, used to gate star ratings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionPhase {
    PreMarket,
    Opening,
    Morning,
    Midday,
    Closing,
    AfterMarket,
    Closed,
}

fn kst_minutes(now: DateTime<Utc>) -> Option<u32> {
    let kst = now.with_timezone(&chrono_tz::Asia::Seoul);
    if kst.weekday() == Weekday::Sat || kst.weekday() == Weekday::Sun {
        return None;
    }
    Some(kst.hour() * 60 + kst.minute())
}

impl SessionPhase {
    pub fn at(now: DateTime<Utc>) -> Self {
        let Some(minutes) = kst_minutes(now) else {
            return SessionPhase::Closed;
        };

        match minutes {
            m if m < 8 * 60 => SessionPhase::Closed,
            m if m < 9 * 60 => SessionPhase::PreMarket,
            m if m < 9 * 60 + 30 => SessionPhase::Opening,
            m if m < 11 * 60 + 30 => SessionPhase::Morning,
            m if m < 14 * 60 => SessionPhase::Midday,
            m if m < 15 * 60 + 30 => SessionPhase::Closing,
            m if m < 20 * 60 => SessionPhase::AfterMarket,
            _ => SessionPhase::Closed,
        }
    }

    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    pub fn max_stars(&self) -> u8 {
        match self {
            SessionPhase::PreMarket | SessionPhase::Opening => 0,
            SessionPhase::Morning => 1,
            SessionPhase::Midday => 2,
            SessionPhase::Closing | SessionPhase::AfterMarket | SessionPhase::Closed => 3,
        }
    }

    /// Outside the live session a theme keeps its last rating instead of decaying.
    pub fn retains_rating(&self) -> bool {
        matches!(self, SessionPhase::AfterMarket | SessionPhase::Closed)
    }
}

/// Coarse market status published alongside the theme set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketStatus {
    PreMarket,
    Regular,
    AfterMarket,
    Closed,
}

impl MarketStatus {
    pub fn at(now: DateTime<Utc>) -> Self {
        let Some(minutes) = kst_minutes(now) else {
            return MarketStatus::Closed;
        };

        if (8 * 60..9 * 60).contains(&minutes) {
            MarketStatus::PreMarket
        } else if (9 * 60..15 * 60 + 30).contains(&minutes) {
            MarketStatus::Regular
        } else if (15 * 60 + 40..20 * 60).contains(&minutes) {
            MarketStatus::AfterMarket
        } else {
            MarketStatus::Closed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketStatus::PreMarket => "PRE_MARKET",
            MarketStatus::Regular => "REGULAR",
            MarketStatus::AfterMarket => "AFTER_MARKET",
            MarketStatus::Closed => "CLOSED",
        }
    }
}

impl std::fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

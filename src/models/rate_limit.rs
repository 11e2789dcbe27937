use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// API usage left for the current hour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    /// Calls left before the limit kicks in
    pub remaining_hits: u32,
    /// Calls allowed per hour
    pub hourly_limit: u32,
    /// Unix time at which the counter resets
    pub reset_time_in_seconds: i64,
    /// Reset time in the server's date format
    #[serde(default)]
    pub reset_time: Option<String>,
}

impl RateLimit {
    /// When the counter resets
    pub fn reset_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.reset_time_in_seconds, 0)
    }

    /// Whether no calls are left
    pub const fn is_exhausted(&self) -> bool {
        self.remaining_hits == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_from_json() {
        let limit: RateLimit = serde_json::from_str(
            r#"{"remaining_hits": 0, "hourly_limit": 100,
                "reset_time_in_seconds": 1200000000,
                "reset_time": "Thu Jan 10 21:20:00 +0000 2008"}"#,
        )
        .unwrap();
        assert!(limit.is_exhausted());
        assert_eq!(limit.reset_at().unwrap().timestamp(), 1_200_000_000);
    }
}

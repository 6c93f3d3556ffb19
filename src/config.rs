use anyhow::{bail, Context};
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_BASE_URL: &str = "https://ais.usvisa-info.com";

// Consulate locations, in the order they are polled each round.
pub const FACILITIES: &[(&str, &str)] = &[
    ("OTTAWA", "92"),
    ("MONTREAL", "91"),
    ("TORONTO", "94"),
    ("QUEBEC", "93"),
];

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub username: String,
    pub password: String,
    pub schedule_id: String,
    pub country_code: String,
    /// Only dates strictly earlier than this one are worth rebooking.
    pub date_before: NaiveDate,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Anonymous session cookies on the portal stay short; an authenticated
    /// one exceeds this length. Site-specific heuristic.
    #[serde(default = "default_cookie_min_len")]
    pub session_cookie_min_len: usize,
    #[serde(default)]
    pub working_hours: Option<WorkingHours>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_cookie_min_len() -> usize {
    350
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct WorkingHours {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl WorkingHours {
    /// Window is half-open [start, end); start > end wraps past midnight.
    pub fn contains(&self, hour: u32) -> bool {
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    fn parse(raw: &str) -> anyhow::Result<Self> {
        let cfg: Config = serde_json::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> anyhow::Result<()> {
        for (field, value) in [
            ("username", &self.username),
            ("password", &self.password),
            ("schedule_id", &self.schedule_id),
            ("country_code", &self.country_code),
            ("base_url", &self.base_url),
        ] {
            if value.trim().is_empty() {
                bail!("{field} must not be empty");
            }
        }

        if let Some(hours) = &self.working_hours {
            if hours.start_hour > 23 || hours.end_hour > 23 {
                bail!("working_hours must use hours in 0..=23");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_config() -> &'static str {
        r#"{
            "username": "me@example.com",
            "password": "hunter2",
            "schedule_id": "12345678",
            "country_code": "en-ca",
            "date_before": "2024-06-01"
        }"#
    }

    #[test]
    fn parses_required_fields_and_defaults() {
        let cfg = Config::parse(full_config()).unwrap();
        assert_eq!(cfg.schedule_id, "12345678");
        assert_eq!(cfg.date_before, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.session_cookie_min_len, 350);
        assert!(cfg.working_hours.is_none());
    }

    #[test]
    fn missing_key_names_the_field() {
        let err = Config::parse(r#"{"username": "u"}"#).unwrap_err();
        assert!(format!("{err:#}").contains("password"));
    }

    #[test]
    fn rejects_malformed_threshold_date() {
        let raw = full_config().replace("2024-06-01", "June 1st");
        assert!(Config::parse(&raw).is_err());
    }

    #[test]
    fn rejects_blank_credentials() {
        let raw = full_config().replace("hunter2", "  ");
        let err = Config::parse(&raw).unwrap_err();
        assert!(format!("{err:#}").contains("password"));
    }

    #[test]
    fn rejects_out_of_range_working_hours() {
        let raw = full_config().replace(
            "\"date_before\": \"2024-06-01\"",
            "\"date_before\": \"2024-06-01\", \"working_hours\": {\"start_hour\": 8, \"end_hour\": 24}",
        );
        assert!(Config::parse(&raw).is_err());
    }

    #[test]
    fn working_hours_window() {
        let day = WorkingHours { start_hour: 8, end_hour: 18 };
        assert!(day.contains(8));
        assert!(day.contains(17));
        assert!(!day.contains(18));
        assert!(!day.contains(3));

        let night = WorkingHours { start_hour: 22, end_hour: 6 };
        assert!(night.contains(23));
        assert!(night.contains(2));
        assert!(!night.contains(12));
    }

    #[test]
    fn facilities_keep_polling_order() {
        let names: Vec<&str> = FACILITIES.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, ["OTTAWA", "MONTREAL", "TORONTO", "QUEBEC"]);
    }
}

use crate::config::Config;

/// Builds every portal URL from the country code and schedule id.
#[derive(Debug, Clone)]
pub struct UrlBuilder {
    base_url: String,
    country_code: String,
    schedule_id: String,
}

impl UrlBuilder {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            country_code: cfg.country_code.clone(),
            schedule_id: cfg.schedule_id.clone(),
        }
    }

    pub fn login_url(&self) -> String {
        format!("{}/{}/niv", self.base_url, self.country_code)
    }

    pub fn appointment_url(&self) -> String {
        format!(
            "{}/{}/niv/schedule/{}/appointment",
            self.base_url, self.country_code, self.schedule_id
        )
    }

    pub fn dates_url(&self, facility_id: &str) -> String {
        format!(
            "{}/days/{}.json?appointments[expedite]=false",
            self.appointment_url(),
            facility_id
        )
    }

    pub fn times_url(&self, date: &str, facility_id: &str) -> String {
        format!(
            "{}/times/{}.json?date={}&appointments[expedite]=false",
            self.appointment_url(),
            facility_id,
            date
        )
    }
}

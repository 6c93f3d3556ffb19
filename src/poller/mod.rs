use anyhow::Result;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::Config;
use crate::session::browser::Browser;
use crate::session::SessionManager;
use crate::urls::UrlBuilder;

mod fetcher;
pub mod models;

use models::{
    accept_any_date, accept_any_time, DateEntry, DateFilter, ReschedulePayload, TimeFilter,
    TimesResponse,
};

/// Marker the portal embeds in the confirmation page.
pub const SUCCESS_MARKER: &str = "Successfully Scheduled";

/// Queries availability and submits the rebooking over raw HTTP, riding on
/// the browser session's cookies. Never issues a request while the session
/// is invalid.
pub struct AvailabilityClient {
    http: Client,
    urls: UrlBuilder,
    date_before: NaiveDate,
    date_filter: DateFilter,
    time_filter: TimeFilter,
    dump_dir: PathBuf,
}

impl AvailabilityClient {
    pub fn new(cfg: &Config) -> Self {
        Self {
            http: fetcher::build_client(),
            urls: UrlBuilder::from_config(cfg),
            date_before: cfg.date_before,
            date_filter: accept_any_date(),
            time_filter: accept_any_time(),
            dump_dir: PathBuf::from("."),
        }
    }

    pub fn with_date_filter(mut self, filter: DateFilter) -> Self {
        self.date_filter = filter;
        self
    }

    pub fn with_time_filter(mut self, filter: TimeFilter) -> Self {
        self.time_filter = filter;
        self
    }

    pub fn with_dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump_dir = dir.into();
        self
    }

    pub async fn find_earlier_date<B: Browser>(
        &self,
        session: &mut SessionManager<B>,
        facility_id: &str,
    ) -> Result<Option<String>> {
        if !session.is_authenticated() {
            return Ok(None);
        }

        let url = self.urls.dates_url(facility_id);
        info!(facility_id, "querying available dates");
        let referer = self.urls.appointment_url();
        let headers = session.request_headers(&referer, true, true).await?;

        let resp = self.http.get(&url).headers(headers).send().await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            warn!("portal returned 401, session expired");
            session.mark_expired();
            return Ok(None);
        }
        if !resp.status().is_success() {
            warn!(status = %resp.status(), "failed to fetch available dates");
            return Ok(None);
        }

        let entries: Vec<DateEntry> = resp.json().await?;
        Ok(models::first_earlier_date(
            &entries,
            self.date_before,
            &self.date_filter,
        ))
    }

    pub async fn find_available_time<B: Browser>(
        &self,
        session: &mut SessionManager<B>,
        date: &str,
        facility_id: &str,
    ) -> Result<Option<String>> {
        if !session.is_authenticated() {
            return Ok(None);
        }

        let url = self.urls.times_url(date, facility_id);
        info!(facility_id, date, "querying available time slots");
        let referer = self.urls.appointment_url();
        let headers = session.request_headers(&referer, true, true).await?;

        let resp = self.http.get(&url).headers(headers).send().await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            warn!("portal returned 401, session expired");
            session.mark_expired();
            return Ok(None);
        }
        if !resp.status().is_success() {
            warn!(status = %resp.status(), "failed to fetch available time slots");
            return Ok(None);
        }

        let times: TimesResponse = resp.json().await?;
        let picked = models::pick_time(&times.available_times, &self.time_filter);
        if let Some(time) = &picked {
            info!(date, time = %time, "available appointment time");
        }
        Ok(picked)
    }

    /// Submit the rebooking. The anti-forgery token and capacity fields come
    /// from the rendered appointment page the browser is parked on.
    pub async fn reschedule<B: Browser>(
        &self,
        session: &mut SessionManager<B>,
        facility_id: &str,
        date: &str,
        time: &str,
    ) -> Result<bool> {
        if !session.is_authenticated() {
            return Ok(false);
        }

        let url = self.urls.appointment_url();
        let payload = ReschedulePayload {
            authenticity_token: session.form_field("authenticity_token").await?,
            confirmed_limit_message: session.form_field("confirmed_limit_message").await?,
            use_consulate_appointment_capacity: session
                .form_field("use_consulate_appointment_capacity")
                .await?,
            facility_id: facility_id.to_string(),
            date: date.to_string(),
            time: time.to_string(),
        };
        let headers = session.request_headers(&url, false, false).await?;

        let resp = self
            .http
            .post(&url)
            .headers(headers)
            .form(&payload)
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;

        if reschedule_succeeded(status, &body) {
            info!(facility_id, date, time, "rescheduled successfully");
            return Ok(true);
        }

        if status == StatusCode::UNAUTHORIZED {
            session.mark_expired();
        }
        let dump = fetcher::dump_failure_body(&self.dump_dir, facility_id, &body).await?;
        warn!(
            facility_id,
            date,
            time,
            status = %status,
            dump = %dump.display(),
            "reschedule rejected"
        );
        Ok(false)
    }
}

fn reschedule_succeeded(status: StatusCode, body: &str) -> bool {
    status == StatusCode::OK && body.contains(SUCCESS_MARKER)
}

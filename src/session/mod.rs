use anyhow::{anyhow, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, COOKIE, REFERER, USER_AGENT};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::Config;
use crate::urls::UrlBuilder;

pub mod browser;

use browser::{Browser, Locator};

pub const SESSION_COOKIE: &str = "_yatri_session";

const LOGIN_FORM_WAIT: Duration = Duration::from_secs(60);

/// Pauses between login-form interactions. The portal drops inputs fired too
/// quickly after one another.
#[derive(Debug, Clone, Copy)]
pub struct LoginPacing {
    pub step: Duration,
    pub field: Duration,
    pub settle: Duration,
}

impl Default for LoginPacing {
    fn default() -> Self {
        Self {
            step: Duration::from_millis(500),
            field: Duration::from_secs(1),
            settle: Duration::from_secs(5),
        }
    }
}

const DOWN_ARROW: &str = r#"//a[@class="down-arrow bounce"]"#;
const SIGN_IN_LINK: &str = r#"//*[@id="header"]/nav/div[1]/div[1]/div[2]/div[1]/ul/li[3]/a"#;

/// Owns the browser and the authenticated-session state. All portal cookies
/// live in the browser; everything here reads them live, nothing is persisted.
pub struct SessionManager<B: Browser> {
    browser: B,
    username: String,
    password: String,
    login_url: String,
    appointment_url: String,
    cookie_min_len: usize,
    pacing: LoginPacing,
    authenticated: bool,
}

impl<B: Browser> SessionManager<B> {
    pub fn new(browser: B, cfg: &Config) -> Self {
        let urls = UrlBuilder::from_config(cfg);
        Self {
            browser,
            username: cfg.username.clone(),
            password: cfg.password.clone(),
            login_url: urls.login_url(),
            appointment_url: urls.appointment_url(),
            cookie_min_len: cfg.session_cookie_min_len,
            pacing: LoginPacing::default(),
            authenticated: false,
        }
    }

    pub fn with_pacing(mut self, pacing: LoginPacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Hand the browser back for teardown.
    pub fn into_browser(self) -> B {
        self.browser
    }

    /// Downgrade after the portal answered 401; the next round re-logs-in.
    pub fn mark_expired(&mut self) {
        self.authenticated = false;
    }

    /// Live cookie check: present and longer than the configured threshold.
    pub async fn is_session_valid(&mut self) -> Result<bool> {
        match self.browser.cookie_value(SESSION_COOKIE).await? {
            Some(value) => Ok(value.len() > self.cookie_min_len),
            None => Ok(false),
        }
    }

    /// Log in if needed; otherwise just make sure the browser is parked on
    /// the appointment page.
    pub async fn ensure_session(&mut self) -> Result<()> {
        if self.authenticated && self.is_session_valid().await? {
            let url = self.appointment_url.clone();
            self.go_to_page(&url).await?;
            return Ok(());
        }
        self.login().await
    }

    async fn go_to_page(&mut self, url: &str) -> Result<()> {
        if self.browser.current_url().await? != url {
            debug!(url, "navigating");
            self.browser.navigate(url).await?;
        }
        Ok(())
    }

    async fn login(&mut self) -> Result<()> {
        info!("login start");
        self.browser.navigate(&self.login_url).await?;
        sleep(self.pacing.step).await;

        self.browser.click(&Locator::xpath(DOWN_ARROW)).await?;
        sleep(self.pacing.step).await;

        self.browser.click(&Locator::xpath(SIGN_IN_LINK)).await?;
        sleep(self.pacing.step).await;
        self.browser
            .wait_for(&Locator::name("commit"), LOGIN_FORM_WAIT)
            .await?;

        self.browser.click(&Locator::xpath(DOWN_ARROW)).await?;
        sleep(self.pacing.step).await;

        self.browser
            .fill(&Locator::id("user_email"), &self.username)
            .await?;
        sleep(self.pacing.field).await;
        self.browser
            .fill(&Locator::id("user_password"), &self.password)
            .await?;
        sleep(self.pacing.field).await;
        self.browser.click(&Locator::class("icheckbox")).await?;
        sleep(self.pacing.field).await;
        self.browser.click(&Locator::name("commit")).await?;
        sleep(self.pacing.field).await;

        info!("login submitted");
        sleep(self.pacing.settle).await;
        let url = self.appointment_url.clone();
        self.go_to_page(&url).await?;

        self.authenticated = true;
        Ok(())
    }

    /// Headers for raw HTTP calls that piggyback on the browser session.
    pub async fn request_headers(
        &mut self,
        referer: &str,
        xhr: bool,
        json_accept: bool,
    ) -> Result<HeaderMap> {
        let agent = self.browser.user_agent().await?;
        let cookie = self
            .browser
            .cookie_value(SESSION_COOKIE)
            .await?
            .ok_or_else(|| anyhow!("session cookie missing from browser"))?;

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_str(&agent)?);
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("{SESSION_COOKIE}={cookie}"))?,
        );
        headers.insert(REFERER, HeaderValue::from_str(referer)?);

        if xhr {
            headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));
        }
        if json_accept {
            headers.insert(
                ACCEPT,
                HeaderValue::from_static("application/json, text/javascript, */*; q=0.01"),
            );
        }

        Ok(headers)
    }

    /// Value of a named hidden input on the page the browser is parked on.
    pub async fn form_field(&mut self, name: &str) -> Result<String> {
        self.browser.form_field_value(name).await
    }
}

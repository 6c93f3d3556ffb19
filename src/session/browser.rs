use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use thirtyfour::prelude::*;

/// Element locator understood by any [`Browser`] backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    XPath(String),
    Id(String),
    Name(String),
    Class(String),
}

impl Locator {
    pub fn css(s: impl Into<String>) -> Self {
        Locator::Css(s.into())
    }

    pub fn xpath(s: impl Into<String>) -> Self {
        Locator::XPath(s.into())
    }

    pub fn id(s: impl Into<String>) -> Self {
        Locator::Id(s.into())
    }

    pub fn name(s: impl Into<String>) -> Self {
        Locator::Name(s.into())
    }

    pub fn class(s: impl Into<String>) -> Self {
        Locator::Class(s.into())
    }
}

/// The slice of browser behavior the session layer depends on. Production
/// runs against a WebDriver; tests script this directly.
#[async_trait]
pub trait Browser: Send {
    async fn navigate(&mut self, url: &str) -> Result<()>;
    async fn current_url(&mut self) -> Result<String>;
    async fn click(&mut self, locator: &Locator) -> Result<()>;
    async fn fill(&mut self, locator: &Locator, text: &str) -> Result<()>;
    async fn wait_for(&mut self, locator: &Locator, timeout: Duration) -> Result<()>;
    async fn cookie_value(&mut self, name: &str) -> Result<Option<String>>;
    async fn form_field_value(&mut self, name: &str) -> Result<String>;
    async fn user_agent(&mut self) -> Result<String>;
}

pub struct WebDriverBrowser {
    driver: WebDriver,
    poll_interval: Duration,
}

impl WebDriverBrowser {
    pub fn new(driver: WebDriver) -> Self {
        Self {
            driver,
            poll_interval: Duration::from_millis(250),
        }
    }

    pub async fn close(self) -> Result<()> {
        self.driver.quit().await?;
        Ok(())
    }

    fn by(locator: &Locator) -> By {
        match locator {
            Locator::Css(s) => By::Css(s.clone()),
            Locator::XPath(s) => By::XPath(s.clone()),
            Locator::Id(s) => By::Id(s.clone()),
            Locator::Name(s) => By::Name(s.clone()),
            Locator::Class(s) => By::ClassName(s.clone()),
        }
    }
}

#[async_trait]
impl Browser for WebDriverBrowser {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.driver.goto(url).await?;
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String> {
        Ok(self.driver.current_url().await?.to_string())
    }

    async fn click(&mut self, locator: &Locator) -> Result<()> {
        let element = self.driver.find(Self::by(locator)).await?;
        element.click().await?;
        Ok(())
    }

    async fn fill(&mut self, locator: &Locator, text: &str) -> Result<()> {
        let element = self.driver.find(Self::by(locator)).await?;
        element.send_keys(text).await?;
        Ok(())
    }

    async fn wait_for(&mut self, locator: &Locator, timeout: Duration) -> Result<()> {
        self.driver
            .query(Self::by(locator))
            .wait(timeout, self.poll_interval)
            .first()
            .await?;
        Ok(())
    }

    async fn cookie_value(&mut self, name: &str) -> Result<Option<String>> {
        let cookies = self.driver.get_all_cookies().await?;
        Ok(cookies.into_iter().find(|c| c.name == name).map(|c| c.value))
    }

    async fn form_field_value(&mut self, name: &str) -> Result<String> {
        let element = self.driver.find(By::Name(name)).await?;
        Ok(element.attr("value").await?.unwrap_or_default())
    }

    async fn user_agent(&mut self) -> Result<String> {
        let ret = self
            .driver
            .execute("return navigator.userAgent;", vec![])
            .await?;
        Ok(ret.convert()?)
    }
}

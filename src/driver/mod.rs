// Page driver contract: the only way the pipeline touches a page
pub mod http;
pub mod node;
pub mod stub;

pub use http::{HttpDriverFactory, HttpPageDriver};
pub use node::{FieldLocator, Locator, PageNode};
pub use stub::{StubDriver, StubPage, StubSite};

use crate::model::HarvestError;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    Loaded,
    NavigationFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Ready,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Triggered,
    NotFound,
}

#[async_trait::async_trait]
pub trait PageDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> NavigationOutcome;
    async fn query(&self, locator: &Locator) -> Vec<PageNode>;
    async fn wait_for(&self, locator: &Locator, timeout: Duration) -> WaitOutcome;
    async fn trigger(&self, locator: &Locator) -> TriggerOutcome;
}

/// Opens one independent driver session per product worker.
pub trait DriverFactory: Send + Sync {
    type Driver: PageDriver;

    fn open(&self) -> Self::Driver;
}

/// Wraps a driver so that every call is bounded by the per-request timeout
/// and failures surface as [`HarvestError`]s.
pub struct Session<D> {
    driver: D,
    request_timeout: Duration,
}

impl<D: PageDriver> Session<D> {
    pub fn new(driver: D, request_timeout: Duration) -> Self {
        Self {
            driver,
            request_timeout,
        }
    }

    pub async fn goto(&self, url: &str) -> Result<(), HarvestError> {
        debug!("navigate {}", url);
        match timeout(self.request_timeout, self.driver.navigate(url)).await {
            Ok(NavigationOutcome::Loaded) => Ok(()),
            Ok(NavigationOutcome::NavigationFailed(reason)) => Err(HarvestError::NavigationFailed {
                url: url.to_string(),
                reason,
            }),
            Err(_) => Err(HarvestError::NavigationFailed {
                url: url.to_string(),
                reason: format!("no response within {:?}", self.request_timeout),
            }),
        }
    }

    pub async fn query(&self, locator: &Locator) -> Result<Vec<PageNode>, HarvestError> {
        timeout(self.request_timeout, self.driver.query(locator))
            .await
            .map_err(|_| HarvestError::SelectorTimeout {
                locator: locator.to_string(),
                timeout: self.request_timeout,
            })
    }

    pub async fn count(&self, locator: &Locator) -> Result<usize, HarvestError> {
        Ok(self.query(locator).await?.len())
    }

    /// A driver that hangs past its own deadline counts as timed out.
    pub async fn wait_for(&self, locator: &Locator, wait: Duration) -> WaitOutcome {
        match timeout(wait + self.request_timeout, self.driver.wait_for(locator, wait)).await {
            Ok(outcome) => outcome,
            Err(_) => WaitOutcome::TimedOut,
        }
    }

    pub async fn trigger(&self, locator: &Locator) -> Result<TriggerOutcome, HarvestError> {
        timeout(self.request_timeout, self.driver.trigger(locator))
            .await
            .map_err(|_| HarvestError::SelectorTimeout {
                locator: locator.to_string(),
                timeout: self.request_timeout,
            })
    }
}

//! Bounded "reveal more" loop run before reading lazily loaded lists.
//!
//! The controller moves through `Idle → Triggering → Settling` and back until
//! one of the terminal conditions holds. Every path through the loop either
//! increments the iteration counter or terminates, so a driver that always
//! claims more content is available still stops at `max_iterations`.

use crate::config::{ListingSelectors, PaginationConfig, ReviewSelectors};
use crate::driver::{Locator, PageDriver, Session, TriggerOutcome, WaitOutcome};
use crate::model::HarvestError;
use std::time::Duration;
use tracing::debug;

/// Consecutive settles without new records before giving up.
const MAX_STALE_SETTLES: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustedBy {
    IterationCap,
    NoMoreIndicator,
    Stalled,
    NoTrigger,
    Satisfied,
    EmptySection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationState {
    Idle,
    Triggering,
    Settling,
    Exhausted(ExhaustedBy),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationReport {
    pub exhausted_by: ExhaustedBy,
    pub iterations: u32,
    pub records: usize,
}

/// What the controller waits for, counts and clicks.
#[derive(Debug, Clone)]
pub struct RevealLocators {
    pub container: Locator,
    pub empty: Option<Locator>,
    pub item: Locator,
    pub load_more: Locator,
    pub no_more: Locator,
}

impl From<&ReviewSelectors> for RevealLocators {
    fn from(s: &ReviewSelectors) -> Self {
        Self {
            container: s.container.clone(),
            empty: Some(s.empty.clone()),
            item: s.item.clone(),
            load_more: s.load_more.clone(),
            no_more: s.no_more.clone(),
        }
    }
}

impl From<&ListingSelectors> for RevealLocators {
    fn from(s: &ListingSelectors) -> Self {
        Self {
            container: s.item.clone(),
            empty: None,
            item: s.item.clone(),
            load_more: s.load_more.clone(),
            no_more: s.no_more.clone(),
        }
    }
}

pub struct PaginationController {
    max_iterations: u32,
    settle: Duration,
    wait_timeout: Duration,
    wanted: Option<usize>,
}

impl PaginationController {
    pub fn new(config: &PaginationConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            settle: config.settle(),
            wait_timeout: config.wait_timeout(),
            wanted: None,
        }
    }

    pub fn max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Stop early once this many records are visible.
    pub fn wanting(mut self, records: usize) -> Self {
        self.wanted = Some(records);
        self
    }

    pub async fn run<D: PageDriver>(
        &self,
        session: &Session<D>,
        locators: &RevealLocators,
    ) -> Result<PaginationReport, HarvestError> {
        let mut state = PaginationState::Idle;
        let mut iterations = 0u32;
        let mut records = 0usize;
        let mut stale = 0u32;

        loop {
            debug!("pagination state {:?} ({} records, {} iterations)", state, records, iterations);
            state = match state {
                PaginationState::Idle => {
                    if session.wait_for(&locators.container, self.wait_timeout).await
                        == WaitOutcome::TimedOut
                    {
                        if let Some(empty) = &locators.empty {
                            if session.count(empty).await? > 0 {
                                return Ok(PaginationReport {
                                    exhausted_by: ExhaustedBy::EmptySection,
                                    iterations,
                                    records: 0,
                                });
                            }
                        }
                        return Err(HarvestError::SelectorTimeout {
                            locator: locators.container.to_string(),
                            timeout: self.wait_timeout,
                        });
                    }
                    records = session.count(&locators.item).await?;
                    self.next_after_observation(session, locators, iterations, records, stale)
                        .await?
                }
                PaginationState::Triggering => match session.trigger(&locators.load_more).await? {
                    TriggerOutcome::Triggered => {
                        iterations += 1;
                        PaginationState::Settling
                    }
                    TriggerOutcome::NotFound => PaginationState::Exhausted(ExhaustedBy::NoTrigger),
                },
                PaginationState::Settling => {
                    if !self.settle.is_zero() {
                        tokio::time::sleep(self.settle).await;
                    }
                    let now = session.count(&locators.item).await?;
                    if now > records {
                        stale = 0;
                    } else {
                        stale += 1;
                    }
                    records = now;
                    self.next_after_observation(session, locators, iterations, records, stale)
                        .await?
                }
                PaginationState::Exhausted(exhausted_by) => {
                    debug!(
                        "pagination exhausted by {:?} after {} iterations with {} records",
                        exhausted_by, iterations, records
                    );
                    return Ok(PaginationReport {
                        exhausted_by,
                        iterations,
                        records,
                    });
                }
            };
        }
    }

    async fn next_after_observation<D: PageDriver>(
        &self,
        session: &Session<D>,
        locators: &RevealLocators,
        iterations: u32,
        records: usize,
        stale: u32,
    ) -> Result<PaginationState, HarvestError> {
        if self.wanted.is_some_and(|w| records >= w) {
            return Ok(PaginationState::Exhausted(ExhaustedBy::Satisfied));
        }
        if session.count(&locators.no_more).await? > 0 {
            return Ok(PaginationState::Exhausted(ExhaustedBy::NoMoreIndicator));
        }
        if stale >= MAX_STALE_SETTLES {
            return Ok(PaginationState::Exhausted(ExhaustedBy::Stalled));
        }
        if iterations >= self.max_iterations {
            return Ok(PaginationState::Exhausted(ExhaustedBy::IterationCap));
        }
        Ok(PaginationState::Triggering)
    }
}

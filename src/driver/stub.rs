// In-memory page driver serving canned nodes for tests
use super::{
    DriverFactory, Locator, NavigationOutcome, PageDriver, PageNode, TriggerOutcome, WaitOutcome,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Reveal {
    /// Appends one batch per trigger, then reports the control as gone.
    Batches {
        target: String,
        batches: VecDeque<Vec<PageNode>>,
    },
    /// Appends the same node on every trigger, forever.
    Endless { target: String, node: PageNode },
    /// Claims success on every trigger but never adds anything.
    Idle,
}

/// Canned answers for one URL, keyed by locator text.
#[derive(Debug, Clone, Default)]
pub struct StubPage {
    nodes: HashMap<String, Vec<PageNode>>,
    reveals: HashMap<String, Reveal>,
}

impl StubPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, locator: &Locator, nodes: Vec<PageNode>) -> Self {
        self.nodes.insert(locator.as_str().to_string(), nodes);
        self
    }

    pub fn with_html(self, locator: &Locator, fragments: &[&str]) -> Self {
        let nodes = fragments.iter().map(|f| PageNode::from_html(*f)).collect();
        self.with(locator, nodes)
    }

    pub fn reveal_batches(
        mut self,
        trigger: &Locator,
        target: &Locator,
        batches: Vec<Vec<PageNode>>,
    ) -> Self {
        self.reveals.insert(
            trigger.as_str().to_string(),
            Reveal::Batches {
                target: target.as_str().to_string(),
                batches: batches.into(),
            },
        );
        self
    }

    pub fn reveal_endless(mut self, trigger: &Locator, target: &Locator, node: PageNode) -> Self {
        self.reveals.insert(
            trigger.as_str().to_string(),
            Reveal::Endless {
                target: target.as_str().to_string(),
                node,
            },
        );
        self
    }

    pub fn always_more(mut self, trigger: &Locator) -> Self {
        self.reveals.insert(trigger.as_str().to_string(), Reveal::Idle);
        self
    }
}

/// A whole fake storefront; each `open()` starts a fresh session over it.
#[derive(Debug, Clone, Default)]
pub struct StubSite {
    pages: Arc<HashMap<String, StubPage>>,
    failures_left: Arc<AtomicU32>,
    triggers: Arc<AtomicU32>,
    hang: bool,
}

impl StubSite {
    pub fn new(pages: HashMap<String, StubPage>) -> Self {
        Self {
            pages: Arc::new(pages),
            ..Self::default()
        }
    }

    /// The next `n` navigations fail, across all sessions.
    pub fn failing_first(self, n: u32) -> Self {
        self.failures_left.store(n, Ordering::SeqCst);
        self
    }

    /// Navigation never completes; exercises per-request timeouts.
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn trigger_count(&self) -> u32 {
        self.triggers.load(Ordering::SeqCst)
    }
}

impl DriverFactory for StubSite {
    type Driver = StubDriver;

    fn open(&self) -> StubDriver {
        StubDriver {
            site: self.clone(),
            current: Mutex::new(None),
        }
    }
}

pub struct StubDriver {
    site: StubSite,
    current: Mutex<Option<StubPage>>,
}

impl StubDriver {
    fn with_page<T>(&self, f: impl FnOnce(&mut StubPage) -> T) -> Option<T> {
        let mut guard = self.current.lock().unwrap_or_else(|e| e.into_inner());
        guard.as_mut().map(f)
    }
}

#[async_trait::async_trait]
impl PageDriver for StubDriver {
    async fn navigate(&self, url: &str) -> NavigationOutcome {
        if self.site.hang {
            std::future::pending::<()>().await;
        }
        let failing = self
            .site
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return NavigationOutcome::NavigationFailed("injected failure".into());
        }

        match self.site.pages.get(url) {
            Some(page) => {
                let mut guard = self.current.lock().unwrap_or_else(|e| e.into_inner());
                *guard = Some(page.clone());
                NavigationOutcome::Loaded
            }
            None => NavigationOutcome::NavigationFailed(format!("no page at {}", url)),
        }
    }

    async fn query(&self, locator: &Locator) -> Vec<PageNode> {
        self.with_page(|page| page.nodes.get(locator.as_str()).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    async fn wait_for(&self, locator: &Locator, _timeout: Duration) -> WaitOutcome {
        if self.query(locator).await.is_empty() {
            WaitOutcome::TimedOut
        } else {
            WaitOutcome::Ready
        }
    }

    async fn trigger(&self, locator: &Locator) -> TriggerOutcome {
        let outcome = self
            .with_page(|page| {
                let StubPage { nodes, reveals } = page;
                match reveals.get_mut(locator.as_str()) {
                    None => TriggerOutcome::NotFound,
                    Some(Reveal::Idle) => TriggerOutcome::Triggered,
                    Some(Reveal::Endless { target, node }) => {
                        nodes.entry(target.clone()).or_default().push(node.clone());
                        TriggerOutcome::Triggered
                    }
                    Some(Reveal::Batches { target, batches }) => match batches.pop_front() {
                        Some(batch) => {
                            nodes.entry(target.clone()).or_default().extend(batch);
                            TriggerOutcome::Triggered
                        }
                        None => TriggerOutcome::NotFound,
                    },
                }
            })
            .unwrap_or(TriggerOutcome::NotFound);

        if outcome == TriggerOutcome::Triggered {
            self.site.triggers.fetch_add(1, Ordering::SeqCst);
        }
        outcome
    }
}

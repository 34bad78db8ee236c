// Page driver over plain HTTP for server-rendered storefront pages
use super::{
    DriverFactory, Locator, NavigationOutcome, PageDriver, PageNode, TriggerOutcome, WaitOutcome,
};
use crate::model::HarvestError;
use reqwest::Client;
use scraper::Html;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

struct LoadedPage {
    url: Url,
    html: String,
    followed: HashSet<String>,
}

pub struct HttpPageDriver {
    client: Client,
    page: Mutex<Option<LoadedPage>>,
}

impl HttpPageDriver {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            page: Mutex::new(None),
        }
    }

    async fn fetch(&self, url: &Url) -> Result<String, String> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }

        response.text().await.map_err(|e| e.to_string())
    }
}

#[async_trait::async_trait]
impl PageDriver for HttpPageDriver {
    async fn navigate(&self, url: &str) -> NavigationOutcome {
        let parsed = match Url::parse(url) {
            Ok(u) => u,
            Err(e) => return NavigationOutcome::NavigationFailed(format!("bad url: {}", e)),
        };

        match self.fetch(&parsed).await {
            Ok(html) => {
                *self.page.lock().await = Some(LoadedPage {
                    url: parsed,
                    html,
                    followed: HashSet::new(),
                });
                NavigationOutcome::Loaded
            }
            Err(reason) => NavigationOutcome::NavigationFailed(reason),
        }
    }

    async fn query(&self, locator: &Locator) -> Vec<PageNode> {
        let guard = self.page.lock().await;
        match guard.as_ref() {
            Some(page) => select_nodes(&page.html, locator),
            None => Vec::new(),
        }
    }

    /// A fetched document does not change on its own, so presence is decided immediately.
    async fn wait_for(&self, locator: &Locator, _timeout: Duration) -> WaitOutcome {
        if self.query(locator).await.is_empty() {
            WaitOutcome::TimedOut
        } else {
            WaitOutcome::Ready
        }
    }

    /// Follows the newest unvisited "more" link and appends what it returns.
    async fn trigger(&self, locator: &Locator) -> TriggerOutcome {
        let target = {
            let guard = self.page.lock().await;
            let Some(page) = guard.as_ref() else {
                return TriggerOutcome::NotFound;
            };
            reveal_target(&page.html, locator, &page.url, &page.followed)
        };

        let Some(target) = target else {
            return TriggerOutcome::NotFound;
        };

        debug!("Following reveal link {}", target);
        match self.fetch(&target).await {
            Ok(more) => {
                let mut guard = self.page.lock().await;
                if let Some(page) = guard.as_mut() {
                    page.followed.insert(target.to_string());
                    page.html.push_str(&more);
                }
                TriggerOutcome::Triggered
            }
            Err(reason) => {
                warn!("Reveal link {} failed: {}", target, reason);
                TriggerOutcome::NotFound
            }
        }
    }
}

fn select_nodes(html: &str, locator: &Locator) -> Vec<PageNode> {
    let Some(sel) = locator.selector() else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    document
        .select(&sel)
        .map(|el| PageNode::from_html(el.html()))
        .collect()
}

fn reveal_target(
    html: &str,
    locator: &Locator,
    base: &Url,
    followed: &HashSet<String>,
) -> Option<Url> {
    let sel = locator.selector()?;
    let document = Html::parse_document(html);

    let candidates: Vec<Url> = document
        .select(&sel)
        .filter(|el| {
            let v = el.value();
            v.attr("disabled").is_none() && !v.classes().any(|c| c == "disabled")
        })
        .filter_map(|el| {
            el.value()
                .attr("href")
                .or_else(|| el.value().attr("data-href"))
                .map(str::trim)
                .filter(|h| !h.is_empty() && *h != "#" && !h.starts_with("javascript:"))
                .and_then(|h| base.join(h).ok())
        })
        .collect();

    candidates
        .into_iter()
        .rev()
        .find(|u| !followed.contains(u.as_str()))
}

/// Builds HTTP sessions sharing one connection pool.
#[derive(Clone)]
pub struct HttpDriverFactory {
    client: Client,
}

impl HttpDriverFactory {
    pub fn new(user_agent: &str, request_timeout: Duration) -> Result<Self, HarvestError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(request_timeout)
            .build()
            .map_err(|e| HarvestError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl DriverFactory for HttpDriverFactory {
    type Driver = HttpPageDriver;

    fn open(&self) -> HttpPageDriver {
        HttpPageDriver::new(self.client.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reveal_target_skips_disabled_and_followed_links() {
        let base = Url::parse("https://shop.example/product/detail?prdtNo=1").unwrap();
        let html = r#"
            <a class="btn-more" href="/reviews?page=2">more</a>
            <a class="btn-more" href="/reviews?page=3">more</a>
            <a class="btn-more disabled" href="/reviews?page=4">more</a>
        "#;
        let locator = Locator::new(".btn-more");

        let first = reveal_target(html, &locator, &base, &HashSet::new()).unwrap();
        assert_eq!(first.as_str(), "https://shop.example/reviews?page=3");

        let mut followed = HashSet::new();
        followed.insert(first.to_string());
        let second = reveal_target(html, &locator, &base, &followed).unwrap();
        assert_eq!(second.as_str(), "https://shop.example/reviews?page=2");
    }

    #[test]
    fn reveal_target_ignores_script_links() {
        let base = Url::parse("https://shop.example/").unwrap();
        let html = r##"<a class="btn-more" href="#">more</a><button class="btn-more">more</button>"##;
        assert!(reveal_target(html, &Locator::new(".btn-more"), &base, &HashSet::new()).is_none());
    }

    /// Serves `pages` by request path until the test ends; unknown paths get a 404.
    async fn serve(pages: Vec<(&'static str, &'static str)>) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let pages = pages.clone();
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }
                    let request = String::from_utf8_lossy(&request);
                    let path = request.split_whitespace().nth(1).unwrap_or("/");
                    let (status, body) = match pages.iter().find(|(p, _)| *p == path) {
                        Some((_, body)) => ("200 OK", *body),
                        None => ("404 Not Found", ""),
                    };
                    let response = format!(
                        "HTTP/1.1 {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn trigger_appends_revealed_page_for_later_queries() {
        let base = serve(vec![
            (
                "/product",
                r#"<html><body><div class="review">first</div><a class="btn-more" href="/product/reviews?page=2">more</a></body></html>"#,
            ),
            ("/product/reviews?page=2", r#"<div class="review">second</div>"#),
        ])
        .await;

        let factory = HttpDriverFactory::new("test-agent", Duration::from_secs(5)).unwrap();
        let driver = factory.open();
        let item = Locator::new(".review");
        let more = Locator::new(".btn-more");

        assert_eq!(
            driver.navigate(&format!("{}/product", base)).await,
            NavigationOutcome::Loaded
        );
        assert_eq!(driver.query(&item).await.len(), 1);

        assert_eq!(driver.trigger(&more).await, TriggerOutcome::Triggered);
        let texts: Vec<Option<String>> = driver
            .query(&item)
            .await
            .iter()
            .map(|n| n.text(&item))
            .collect();
        assert_eq!(
            texts,
            vec![Some("first".to_string()), Some("second".to_string())]
        );

        assert_eq!(driver.trigger(&more).await, TriggerOutcome::NotFound);
        assert_eq!(driver.wait_for(&item, Duration::ZERO).await, WaitOutcome::Ready);
    }

    #[tokio::test]
    async fn error_status_is_a_failed_navigation() {
        let base = serve(vec![]).await;
        let factory = HttpDriverFactory::new("test-agent", Duration::from_secs(5)).unwrap();
        let outcome = factory.open().navigate(&format!("{}/missing", base)).await;
        assert!(matches!(outcome, NavigationOutcome::NavigationFailed(reason) if reason.contains("404")));
    }
}

//! End-to-end runs of the harvest pipeline against an in-memory storefront.

use review_harvester::config::{AppConfig, PaginationConfig};
use review_harvester::driver::{PageNode, StubPage, StubSite};
use review_harvester::model::{CatalogEntry, ProductOutcome, SkipReason};
use review_harvester::pipeline::Pipeline;
use review_harvester::storage::{export_mismatches, export_reviews, export_status, EXPORT_HEADER};
use std::collections::HashMap;
use std::fs;
use tempfile::TempDir;

const ORIGIN: &str = "https://global.oliveyoung.com";

fn config() -> AppConfig {
    AppConfig {
        shop_domain: "https://myshop.example".into(),
        concurrency: 2,
        max_attempts: 2,
        backoff_base_ms: 0,
        request_timeout_secs: 5,
        show_progress: false,
        pagination: PaginationConfig {
            settle_ms: 0,
            wait_timeout_ms: 10,
            ..PaginationConfig::default()
        },
        ..AppConfig::default()
    }
    .validate()
    .unwrap()
}

fn search_url(query: &str) -> String {
    format!("{}/display/search?query={}", ORIGIN, query)
}

fn detail_url(id: &str) -> String {
    format!("{}/product/detail?prdtNo={}&dataSource=search_result", ORIGIN, id)
}

fn search_page(cards: &[(&str, &str)]) -> StubPage {
    let search = config().site.search;
    if cards.is_empty() {
        return StubPage::new().with_html(&search.no_results, &["<p class=\"search-none\">No results</p>"]);
    }
    let nodes = cards
        .iter()
        .map(|(id, name)| {
            PageNode::from_html(format!(
                r#"<li class="prdt-unit"><input name="prdtNo" value="{}"><input name="prdtName" value="{}"></li>"#,
                id, name
            ))
        })
        .collect();
    StubPage::new().with(&search.candidate, nodes)
}

fn review_node(name: &str, body: &str, pct: u32) -> PageNode {
    PageNode::from_html(format!(
        r#"<div class="product-review-unit isChecked">
            <p class="name">{}</p><span class="date">2024.05.01</span>
            <span class="star-rating"><span class="fill" style="width: {}%"></span></span>
            <div class="review-cont"><p>{}</p></div>
        </div>"#,
        name, pct, body
    ))
}

fn product_page(reviews: Vec<PageNode>) -> StubPage {
    let selectors = config().site.reviews;
    StubPage::new().with(&selectors.item, reviews)
}

fn read_rows(path: &std::path::Path) -> (Vec<String>, Vec<HashMap<String, String>>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let headers: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
    let rows = reader
        .records()
        .map(|r| {
            let r = r.unwrap();
            headers
                .iter()
                .cloned()
                .zip(r.iter().map(str::to_string))
                .collect()
        })
        .collect();
    (headers, rows)
}

#[tokio::test]
async fn matched_reviews_are_exported_and_unmatched_names_recorded() {
    let site = StubSite::new(HashMap::from([
        (search_url("Sun+Stick"), search_page(&[("SS1", "Sun Stick")])),
        (search_url("Ghost+Product"), search_page(&[])),
        (
            detail_url("SS1"),
            product_page(vec![review_node("J***", "Great", 100), review_node("ab**", "", 80)]),
        ),
    ]));
    let catalog = vec![CatalogEntry::new("Sun Stick"), CatalogEntry::new("Ghost Product")];

    let pipeline = Pipeline::new(site, &config()).unwrap();
    let report = pipeline.run(&catalog).await;

    let dir = TempDir::new().unwrap();
    let out = dir.path().join("reviews.csv");
    let miss = dir.path().join("mismatches.txt");
    export_reviews(&out, report.aggregator.reviews()).unwrap();
    export_mismatches(&miss, &report.mismatches).unwrap();

    let (headers, rows) = read_rows(&out);
    assert_eq!(headers, EXPORT_HEADER.to_vec());
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row["body"], "Great");
    assert_eq!(row["rating"], "5.0");
    assert_eq!(row["product_handle"], "sun-stick");
    assert_eq!(row["product_url"], "https://myshop.example/products/sun-stick");
    assert_eq!(row["reviewer_name"], "Jessica");
    assert_eq!(row["review_date"], "2024.05.01");
    assert_eq!(row["title"], "");

    let mismatches = fs::read_to_string(&miss).unwrap();
    assert_eq!(mismatches.lines().collect::<Vec<_>>(), vec!["Ghost Product"]);
    assert!(!fs::read_to_string(&out).unwrap().contains("Ghost Product"));
}

#[tokio::test]
async fn unresolvable_name_is_no_match() {
    let site = StubSite::new(HashMap::from([(
        search_url("Nonexistent+Product+XYZ"),
        search_page(&[]),
    )]));
    let pipeline = Pipeline::new(site, &config()).unwrap();

    let outcome = pipeline
        .process_entry(&CatalogEntry::new("Nonexistent Product XYZ"), None)
        .await;
    assert_eq!(outcome, ProductOutcome::NoMatch);
}

#[tokio::test]
async fn duplicate_bodies_keep_first_review() {
    let site = StubSite::new(HashMap::from([
        (search_url("Toner"), search_page(&[("T1", "Daily Toner"), ("T2", "Toner")])),
        (
            detail_url("T2"),
            product_page(vec![
                review_node("m***", "Fresh", 100),
                review_node("s***", "Fresh", 40),
                review_node("o***", "Too sticky", 40),
            ]),
        ),
    ]));
    let pipeline = Pipeline::new(site, &config()).unwrap();
    let report = pipeline.run(&[CatalogEntry::new("Toner")]).await;

    let reviews = report.aggregator.reviews();
    assert_eq!(reviews.len(), 2);
    assert_eq!(reviews[0].reviewer_name, "Mia");
    assert_eq!(reviews[0].rating, Some(5.0));
    assert_eq!(reviews[1].body, "Too sticky");
    assert_eq!(reviews[1].rating, Some(2.0));
    assert_eq!(report.aggregator.duplicates(), 1);
    assert_eq!(report.statuses[0].detail, "1 duplicate reviews dropped");
}

#[tokio::test]
async fn review_cap_keeps_first_ten_in_page_order() {
    let reviews = (1..=14)
        .map(|i| review_node("k***", &format!("review {}", i), 100))
        .collect();
    let site = StubSite::new(HashMap::from([
        (search_url("Cream"), search_page(&[("C1", "Cream")])),
        (detail_url("C1"), product_page(reviews)),
    ]));
    let pipeline = Pipeline::new(site, &config()).unwrap();
    let report = pipeline.run(&[CatalogEntry::new("Cream")]).await;

    let bodies: Vec<&str> = report.aggregator.reviews().iter().map(|r| r.body.as_str()).collect();
    assert_eq!(bodies.len(), 10);
    assert_eq!(bodies[0], "review 1");
    assert_eq!(bodies[9], "review 10");
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let site = StubSite::new(HashMap::from([
        (search_url("Sun+Stick"), search_page(&[("SS1", "Sun Stick")])),
        (detail_url("SS1"), product_page(vec![review_node("J***", "Great", 94)])),
    ]))
    .failing_first(1);
    let pipeline = Pipeline::new(site, &config()).unwrap();

    let outcome = pipeline.process_entry(&CatalogEntry::new("Sun Stick"), None).await;
    let ProductOutcome::Resolved { reviews } = outcome else {
        panic!("expected reviews, got {:?}", outcome);
    };
    assert_eq!(reviews[0].rating, Some(4.7));
}

#[tokio::test]
async fn exhausted_retries_skip_the_product_but_not_the_run() {
    let site = StubSite::new(HashMap::from([
        (search_url("Sun+Stick"), search_page(&[("SS1", "Sun Stick")])),
        (detail_url("SS1"), product_page(vec![review_node("J***", "Great", 100)])),
    ]))
    .failing_first(2);
    let cfg = AppConfig {
        concurrency: 1,
        ..config()
    };
    let pipeline = Pipeline::new(site, &cfg).unwrap();
    let report = pipeline
        .run(&[CatalogEntry::new("Broken"), CatalogEntry::new("Sun Stick")])
        .await;

    assert_eq!(report.skipped, 1);
    assert_eq!(report.statuses[0].outcome, "skipped");
    assert_eq!(report.aggregator.len(), 1);
    assert_eq!(report.statuses[1].outcome, "resolved");
}

#[tokio::test]
async fn product_without_reviews_is_extraction_empty() {
    let selectors = config().site.reviews;
    let site = StubSite::new(HashMap::from([
        (search_url("Mask"), search_page(&[("M1", "Mask")])),
        (
            detail_url("M1"),
            StubPage::new().with_html(&selectors.empty, &["<div class=\"review-none\">No reviews yet</div>"]),
        ),
    ]));
    let pipeline = Pipeline::new(site, &config()).unwrap();
    let report = pipeline.run(&[CatalogEntry::new("Mask")]).await;

    assert_eq!(report.empty, 1);
    assert!(report.mismatches.is_empty());
    assert!(report.aggregator.is_empty());

    let dir = TempDir::new().unwrap();
    let status = dir.path().join("status.csv");
    export_status(&status, &report.statuses).unwrap();
    let (_, rows) = read_rows(&status);
    assert_eq!(rows[0]["product_name"], "Mask");
    assert_eq!(rows[0]["outcome"], "extraction_empty");
}

#[tokio::test]
async fn spent_budget_skips_remaining_entries() {
    let site = StubSite::new(HashMap::new());
    let cfg = AppConfig {
        run_budget_secs: Some(0),
        ..config()
    };
    let pipeline = Pipeline::new(site, &cfg).unwrap();
    let report = pipeline
        .run(&[CatalogEntry::new("A"), CatalogEntry::new("B")])
        .await;

    assert_eq!(report.skipped, 2);
    assert!(report.statuses.iter().all(|s| s.detail == SkipReason::BudgetExceeded.to_string()));
}

#[tokio::test]
async fn hanging_driver_is_bounded_by_request_timeout() {
    let site = StubSite::new(HashMap::new()).hanging();
    let cfg = AppConfig {
        request_timeout_secs: 1,
        max_attempts: 1,
        ..config()
    };
    let pipeline = Pipeline::new(site, &cfg).unwrap();

    let outcome = pipeline.process_entry(&CatalogEntry::new("Sun Stick"), None).await;
    assert!(matches!(
        outcome,
        ProductOutcome::Skipped {
            reason: SkipReason::RetriesExhausted(_)
        }
    ));
}

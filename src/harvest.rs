//! Category harvesting: run state, cached scraping and the parallel dispatcher.
//!
//! Categories are processed by a bounded set of workers. Every network-bound
//! call, whether a search page or a product detail, first takes a permit from
//! one shared semaphore, so nested fan-out never multiplies the number of
//! requests in flight.

use crate::amazon::client::AmazonSearch;
use crate::amazon::markets::Market;
use crate::amazon::models::{CategoryRef, ListingPage, ListingStub, ProductId, ProductRecord};
use crate::amazon::parser::Parser;
use crate::cache::{CacheKey, ResultCache};
use crate::catalog::CategoryDescriptor;
use crate::checkpoint::CheckpointStore;
use crate::config::Config;
use crate::store::ProductStore;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

#[derive(Default)]
struct RunCounters {
    used: HashSet<ProductId>,
    saved: usize,
    duplicates: usize,
    synthetic_skipped: usize,
    already_stored: usize,
    detail_failures: usize,
    write_failures: usize,
}

/// State shared by all workers of one run.
#[derive(Default)]
pub struct RunState {
    inner: Mutex<RunCounters>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RunCounters> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reserves `id` for this run. Only the first caller gets `true`.
    pub fn claim(&self, id: &ProductId) -> bool {
        let mut inner = self.lock();
        if inner.used.insert(id.clone()) {
            true
        } else {
            inner.duplicates += 1;
            false
        }
    }

    /// Returns the run-wide total after counting one more saved product.
    pub fn record_saved(&self) -> usize {
        let mut inner = self.lock();
        inner.saved += 1;
        inner.saved
    }

    pub fn record_synthetic_skipped(&self) {
        self.lock().synthetic_skipped += 1;
    }

    pub fn record_already_stored(&self) {
        self.lock().already_stored += 1;
    }

    pub fn record_detail_failure(&self) {
        self.lock().detail_failures += 1;
    }

    pub fn record_write_failure(&self) {
        self.lock().write_failures += 1;
    }

    pub fn saved(&self) -> usize {
        self.lock().saved
    }

    pub fn duplicates(&self) -> usize {
        self.lock().duplicates
    }
}

/// Parser plus caches in front of an [`AmazonSearch`] implementation.
pub struct Scraper<C> {
    client: C,
    parser: Parser,
    listings: ResultCache<ListingPage>,
    details: ResultCache<ProductRecord>,
}

impl<C: AmazonSearch> Scraper<C> {
    pub fn new(client: C, parser: Parser, cache_capacity: usize) -> Self {
        Self {
            client,
            parser,
            listings: ResultCache::new(cache_capacity),
            details: ResultCache::new(cache_capacity),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn parser(&self) -> &Parser {
        &self.parser
    }

    pub fn market(&self) -> Market {
        self.client.market()
    }

    /// One parsed search page, from cache when this query was already read.
    pub async fn listing(&self, query: &str, page: u32) -> Option<ListingPage> {
        let key = CacheKey::search(self.market(), query, page);
        if let Some(cached) = self.listings.get(&key) {
            debug!("Using cached page {} of '{}'", page, query);
            return Some(cached);
        }

        let html = self.client.search(query, page).await?;
        let listing = self.parser.extract_listing(&html, query, page);
        self.listings.insert(key, listing.clone());
        Some(listing)
    }

    /// The detail record for a stub. Stubs without an ASIN are not fetched.
    pub async fn detail(&self, stub: &ListingStub) -> Option<ProductRecord> {
        let asin = stub.id.as_asin()?;
        let key = CacheKey::detail(self.market(), asin);
        if let Some(cached) = self.details.get(&key) {
            return Some(cached);
        }

        let html = self.client.product(asin).await?;
        let record = self.parser.extract_detail(&html, stub);
        self.details.insert(key, record.clone());
        Some(record)
    }
}

/// Limits of one harvest run.
#[derive(Debug, Clone)]
pub struct HarvestOptions {
    pub category_workers: usize,
    pub max_concurrent_fetches: usize,
    pub max_pages: u32,
    pub max_queries_per_category: usize,
    pub products_per_category: usize,
}

impl HarvestOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            category_workers: config.category_workers.max(1),
            max_concurrent_fetches: config.max_concurrent_fetches.max(1),
            max_pages: config.max_pages.max(1),
            max_queries_per_category: config.max_queries_per_category.max(1),
            products_per_category: config.products_per_category,
        }
    }
}

/// Totals reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HarvestSummary {
    pub categories_processed: usize,
    pub categories_skipped: usize,
    pub categories_failed: usize,
    pub products_saved: usize,
    pub duplicates_rejected: usize,
    pub synthetic_skipped: usize,
    pub already_stored: usize,
    pub detail_failures: usize,
    pub write_failures: usize,
}

struct CategoryOutcome {
    id: String,
    pages_fetched: usize,
    saved: usize,
    quota_met: bool,
}

impl CategoryOutcome {
    /// Done once any search page was read or nothing more was wanted.
    fn is_complete(&self) -> bool {
        self.pages_fetched > 0 || self.quota_met
    }
}

struct Shared<C> {
    scraper: Arc<Scraper<C>>,
    products: ProductStore,
    options: HarvestOptions,
    state: Arc<RunState>,
    fetch_permits: Arc<Semaphore>,
}

/// Runs categories through search, detail extraction and persistence.
pub struct Dispatcher<C> {
    shared: Arc<Shared<C>>,
    checkpoint: CheckpointStore,
}

impl<C: AmazonSearch + 'static> Dispatcher<C> {
    pub fn new(
        scraper: Arc<Scraper<C>>,
        products: ProductStore,
        checkpoint: CheckpointStore,
        options: HarvestOptions,
    ) -> Self {
        let fetch_permits = Arc::new(Semaphore::new(options.max_concurrent_fetches.max(1)));
        Self {
            shared: Arc::new(Shared {
                scraper,
                products,
                options,
                state: Arc::new(RunState::new()),
                fetch_permits,
            }),
            checkpoint,
        }
    }

    pub fn state(&self) -> Arc<RunState> {
        self.shared.state.clone()
    }

    /// Processes every category not yet in the checkpoint.
    pub async fn run(&self, categories: &[CategoryDescriptor]) -> HarvestSummary {
        let mut completed = self.checkpoint.load();
        let mut summary = HarvestSummary::default();

        let pending: Vec<CategoryDescriptor> = categories
            .iter()
            .filter(|c| {
                let done = completed.contains(&c.id);
                if done {
                    debug!("Skipping completed category {}", c.id);
                }
                !done
            })
            .cloned()
            .collect();
        summary.categories_skipped = categories.len() - pending.len();

        info!(
            "Harvesting {} categories ({} already completed) with {} workers",
            pending.len(),
            summary.categories_skipped,
            self.shared.options.category_workers
        );

        let mut queue = pending.into_iter();
        let mut workers = JoinSet::new();
        for category in queue.by_ref().take(self.shared.options.category_workers) {
            workers.spawn(harvest_category(self.shared.clone(), category));
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(outcome) if outcome.is_complete() => {
                    info!("Category {} done: {} products saved", outcome.id, outcome.saved);
                    summary.categories_processed += 1;
                    completed.insert(outcome.id);
                    if let Err(e) = self.checkpoint.save(&completed) {
                        warn!("Failed to save checkpoint: {:#}", e);
                    }
                }
                Ok(outcome) => {
                    warn!("Category {} fetched no search pages, leaving it for the next run", outcome.id);
                    summary.categories_failed += 1;
                }
                Err(e) => {
                    warn!("Category worker failed: {}", e);
                    summary.categories_failed += 1;
                }
            }

            if let Some(next) = queue.next() {
                workers.spawn(harvest_category(self.shared.clone(), next));
            }
        }

        let counters = self.shared.state.lock();
        summary.products_saved = counters.saved;
        summary.duplicates_rejected = counters.duplicates;
        summary.synthetic_skipped = counters.synthetic_skipped;
        summary.already_stored = counters.already_stored;
        summary.detail_failures = counters.detail_failures;
        summary.write_failures = counters.write_failures;
        summary
    }
}

async fn harvest_category<C: AmazonSearch + 'static>(
    shared: Arc<Shared<C>>,
    category: CategoryDescriptor,
) -> CategoryOutcome {
    let quota = category.quota(shared.options.products_per_category);
    let queries = category.queries(shared.options.max_queries_per_category);
    let category_ref = CategoryRef { id: category.id.clone(), name: category.name.clone() };
    info!("Category {} ({}): {} queries, quota {}", category.id, category.name, queries.len(), quota);

    let mut outcome =
        CategoryOutcome { id: category.id.clone(), pages_fetched: 0, saved: 0, quota_met: false };

    'queries: for query in &queries {
        for page in 1..=shared.options.max_pages {
            if outcome.saved >= quota {
                break 'queries;
            }

            let listing = {
                let Ok(_permit) = shared.fetch_permits.acquire().await else { break 'queries };
                shared.scraper.listing(query, page).await
            };
            let Some(listing) = listing else {
                warn!("No results page {} for '{}', moving on", page, query);
                break;
            };
            outcome.pages_fetched += 1;

            let wanted = claim_stubs(&shared, &listing, quota - outcome.saved);
            outcome.saved += fetch_and_store(&shared, wanted, &category_ref).await;

            if !listing.has_more {
                break;
            }
        }
    }

    outcome.quota_met = outcome.saved >= quota;
    outcome
}

/// Picks the stubs of a page worth a detail fetch, claiming their ids.
fn claim_stubs<C>(shared: &Shared<C>, listing: &ListingPage, remaining: usize) -> Vec<ListingStub> {
    let mut wanted = Vec::new();
    for stub in &listing.stubs {
        if wanted.len() >= remaining {
            break;
        }
        let Some(asin) = stub.id.as_asin() else {
            shared.state.record_synthetic_skipped();
            continue;
        };
        if !shared.state.claim(&stub.id) {
            debug!("Duplicate {} rejected", asin);
            continue;
        }
        if shared.products.exists(asin) {
            debug!("{} already stored, skipping", asin);
            shared.state.record_already_stored();
            continue;
        }
        wanted.push(stub.clone());
    }
    wanted
}

/// Fetches details concurrently and writes each record. Returns the number saved.
async fn fetch_and_store<C: AmazonSearch + 'static>(
    shared: &Arc<Shared<C>>,
    stubs: Vec<ListingStub>,
    category: &CategoryRef,
) -> usize {
    let mut details = JoinSet::new();
    for stub in stubs {
        let shared = shared.clone();
        details.spawn(async move {
            let Ok(_permit) = shared.fetch_permits.clone().acquire_owned().await else {
                return (stub.id, None);
            };
            let record = shared.scraper.detail(&stub).await;
            (stub.id, record)
        });
    }

    let mut saved = 0;
    while let Some(joined) = details.join_next().await {
        let (id, record) = match joined {
            Ok(result) => result,
            Err(e) => {
                warn!("Detail task failed: {}", e);
                shared.state.record_detail_failure();
                continue;
            }
        };
        let Some(mut record) = record else {
            warn!("No detail page for {}, skipping", id);
            shared.state.record_detail_failure();
            continue;
        };

        record.category = Some(category.clone());
        match shared.products.save(&record) {
            Ok(_) => {
                saved += 1;
                let total = shared.state.record_saved();
                debug!("Saved {} ({} this run)", record.id, total);
            }
            Err(e) => {
                warn!("Failed to save {}: {:#}", record.id, e);
                shared.state.record_write_failure();
            }
        }
    }
    saved
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    fn card(asin: &str, title: &str) -> String {
        format!(
            r#"<div data-component-type="s-search-result" data-asin="{asin}">
                <h2><a class="a-link-normal" href="/dp/{asin}"><span>{title}</span></a></h2>
                <span class="a-price"><span class="a-offscreen">$10.00</span></span>
            </div>"#
        )
    }

    fn page(cards: &[String], has_more: bool) -> String {
        let next = if has_more { r#"<a class="s-pagination-next" href="?page=2">Next</a>"# } else { "" };
        format!("<html><body>{}{}</body></html>", cards.join("\n"), next)
    }

    fn detail(title: &str) -> String {
        format!(r#"<html><body><span id="productTitle">{title}</span></body></html>"#)
    }

    /// Serves canned pages and counts calls.
    #[derive(Default)]
    struct MockSearch {
        pages: HashMap<(String, u32), String>,
        products: HashMap<String, String>,
        search_calls: AtomicUsize,
        product_calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        latency: Duration,
    }

    impl MockSearch {
        fn with_page(mut self, query: &str, page: u32, html: String) -> Self {
            self.pages.insert((query.to_string(), page), html);
            self
        }

        fn with_product(mut self, asin: &str, html: String) -> Self {
            self.products.insert(asin.to_string(), html);
            self
        }

        async fn track<T>(&self, value: T) -> T {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.latency).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            value
        }
    }

    #[async_trait]
    impl AmazonSearch for MockSearch {
        async fn search(&self, query: &str, page: u32) -> Option<String> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            let html = self.pages.get(&(query.to_string(), page)).cloned();
            self.track(html).await
        }

        async fn product(&self, asin: &str) -> Option<String> {
            self.product_calls.fetch_add(1, Ordering::SeqCst);
            let html = self.products.get(asin).cloned();
            self.track(html).await
        }

        fn market(&self) -> Market {
            Market::Us
        }
    }

    fn category(id: &str, keywords: &[&str], quota: Option<usize>) -> CategoryDescriptor {
        CategoryDescriptor {
            id: id.to_string(),
            name: id.to_string(),
            parent_id: None,
            slug: id.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            product_quota: quota,
        }
    }

    fn options() -> HarvestOptions {
        HarvestOptions {
            category_workers: 2,
            max_concurrent_fetches: 3,
            max_pages: 3,
            max_queries_per_category: 3,
            products_per_category: 10,
        }
    }

    fn build_dispatcher(mock: MockSearch, dir: &TempDir, options: HarvestOptions) -> (Dispatcher<MockSearch>, Arc<Scraper<MockSearch>>) {
        let scraper = Arc::new(Scraper::new(mock, Parser::new(Market::Us), 100));
        let dispatcher = Dispatcher::new(
            scraper.clone(),
            ProductStore::new(dir.path().join("products")),
            CheckpointStore::for_market(dir.path().join("state"), Market::Us),
            options,
        );
        (dispatcher, scraper)
    }

    fn saved_files(dir: &TempDir) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir.path().join("products"))
            .map(|entries| {
                entries.filter_map(|e| e.ok()).map(|e| e.file_name().to_string_lossy().into_owned()).collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    #[test]
    fn test_claim_first_wins() {
        let state = RunState::new();
        let id = ProductId::Asin("B000000001".into());
        assert!(state.claim(&id));
        assert!(!state.claim(&id));
        assert!(state.claim(&ProductId::Asin("B000000002".into())));
        assert_eq!(state.duplicates(), 1);
    }

    #[tokio::test]
    async fn test_repeated_search_served_from_cache() {
        let mock = MockSearch::default().with_page("lamp", 1, page(&[card("B000000001", "Lamp")], false));
        let scraper = Scraper::new(mock, Parser::new(Market::Us), 10);

        let first = scraper.listing("lamp", 1).await.unwrap();
        let second = scraper.listing("lamp", 1).await.unwrap();
        assert_eq!(first.stubs.len(), 1);
        assert_eq!(second.stubs[0].title, "Lamp");
        assert_eq!(scraper.client().search_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_search_is_not_cached() {
        let scraper = Scraper::new(MockSearch::default(), Parser::new(Market::Us), 10);
        assert!(scraper.listing("lamp", 1).await.is_none());
        assert!(scraper.listing("lamp", 1).await.is_none());
        assert_eq!(scraper.client().search_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_harvest_saves_products_and_checkpoints() {
        let mock = MockSearch::default()
            .with_page("desk lamp", 1, page(&[card("B000000001", "Lamp One"), card("B000000002", "Lamp Two")], false))
            .with_product("B000000001", detail("Lamp One Deluxe"))
            .with_product("B000000002", detail("Lamp Two"));
        let dir = TempDir::new().unwrap();
        let (dispatcher, _) = build_dispatcher(mock, &dir, options());

        let summary = dispatcher.run(&[category("lamps", &["desk lamp"], None)]).await;
        assert_eq!(summary.categories_processed, 1);
        assert_eq!(summary.products_saved, 2);
        assert_eq!(saved_files(&dir), vec!["B000000001.json", "B000000002.json"]);

        let record: ProductRecord = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("products/B000000001.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(record.title, "Lamp One Deluxe");
        assert_eq!(record.category.unwrap().id, "lamps");

        let checkpoint = CheckpointStore::for_market(dir.path().join("state"), Market::Us);
        assert!(checkpoint.load().contains("lamps"));
    }

    #[tokio::test]
    async fn test_completed_categories_are_not_fetched() {
        let mock = MockSearch::default()
            .with_page("chairs", 1, page(&[card("B000000003", "Chair")], false))
            .with_product("B000000003", detail("Chair"));
        let dir = TempDir::new().unwrap();
        CheckpointStore::for_market(dir.path().join("state"), Market::Us)
            .save(&HashSet::from(["lamps".to_string()]))
            .unwrap();

        let (dispatcher, scraper) = build_dispatcher(mock, &dir, options());
        let summary = dispatcher
            .run(&[category("lamps", &["desk lamp"], None), category("chairs", &["chairs"], None)])
            .await;

        assert_eq!(summary.categories_skipped, 1);
        assert_eq!(summary.categories_processed, 1);
        // Only the pending category searched
        assert_eq!(scraper.client().search_calls.load(Ordering::SeqCst), 1);
        assert_eq!(saved_files(&dir), vec!["B000000003.json"]);
    }

    #[tokio::test]
    async fn test_duplicate_asins_saved_once() {
        let shared_card = card("B000000001", "Shared Lamp");
        let mock = MockSearch::default()
            .with_page("desk lamp", 1, page(&[shared_card.clone()], false))
            .with_page("floor lamp", 1, page(&[shared_card, card("B000000002", "Floor Lamp")], false))
            .with_product("B000000001", detail("Shared Lamp"))
            .with_product("B000000002", detail("Floor Lamp"));
        let dir = TempDir::new().unwrap();
        let (dispatcher, scraper) = build_dispatcher(mock, &dir, options());

        let summary = dispatcher
            .run(&[category("desk", &["desk lamp"], None), category("floor", &["floor lamp"], None)])
            .await;

        assert_eq!(summary.products_saved, 2);
        assert_eq!(summary.duplicates_rejected, 1);
        assert_eq!(scraper.client().product_calls.load(Ordering::SeqCst), 2);
        assert_eq!(saved_files(&dir), vec!["B000000001.json", "B000000002.json"]);
    }

    #[tokio::test]
    async fn test_quota_stops_paging() {
        let mock = MockSearch::default()
            .with_page(
                "lamp",
                1,
                page(&[card("B000000001", "A"), card("B000000002", "B"), card("B000000003", "C")], true),
            )
            .with_page("lamp", 2, page(&[card("B000000004", "D")], false))
            .with_product("B000000001", detail("A"))
            .with_product("B000000002", detail("B"))
            .with_product("B000000003", detail("C"));
        let dir = TempDir::new().unwrap();
        let (dispatcher, scraper) = build_dispatcher(mock, &dir, options());

        let summary = dispatcher.run(&[category("lamps", &["lamp"], Some(2))]).await;
        assert_eq!(summary.products_saved, 2);
        assert_eq!(scraper.client().search_calls.load(Ordering::SeqCst), 1);
        assert_eq!(scraper.client().product_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_follows_next_page_until_exhausted() {
        let mock = MockSearch::default()
            .with_page("lamp", 1, page(&[card("B000000001", "A")], true))
            .with_page("lamp", 2, page(&[card("B000000002", "B")], false))
            .with_product("B000000001", detail("A"))
            .with_product("B000000002", detail("B"));
        let dir = TempDir::new().unwrap();
        let (dispatcher, scraper) = build_dispatcher(mock, &dir, options());

        let summary = dispatcher.run(&[category("lamps", &["lamp"], None)]).await;
        assert_eq!(summary.products_saved, 2);
        assert_eq!(scraper.client().search_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_category_without_results_is_not_checkpointed() {
        let dir = TempDir::new().unwrap();
        let (dispatcher, _) = build_dispatcher(MockSearch::default(), &dir, options());

        let summary = dispatcher.run(&[category("lamps", &["lamp"], None)]).await;
        assert_eq!(summary.categories_failed, 1);
        assert_eq!(summary.categories_processed, 0);

        let checkpoint = CheckpointStore::for_market(dir.path().join("state"), Market::Us);
        assert!(checkpoint.load().is_empty());
    }

    #[tokio::test]
    async fn test_zero_quota_completes_without_fetching() {
        let mock = MockSearch::default().with_page("lamp", 1, page(&[card("B000000001", "A")], false));
        let dir = TempDir::new().unwrap();
        let (dispatcher, scraper) = build_dispatcher(mock, &dir, options());

        let summary = dispatcher.run(&[category("lamps", &["lamp"], Some(0))]).await;
        assert_eq!(summary.categories_processed, 1);
        assert_eq!(summary.categories_failed, 0);
        assert_eq!(summary.products_saved, 0);
        assert_eq!(scraper.client().search_calls.load(Ordering::SeqCst), 0);

        let checkpoint = CheckpointStore::for_market(dir.path().join("state"), Market::Us);
        assert!(checkpoint.load().contains("lamps"));
    }

    #[tokio::test]
    async fn test_failed_detail_is_skipped() {
        let mock = MockSearch::default()
            .with_page("lamp", 1, page(&[card("B000000001", "A"), card("B000000002", "B")], false))
            .with_product("B000000002", detail("B"));
        let dir = TempDir::new().unwrap();
        let (dispatcher, _) = build_dispatcher(mock, &dir, options());

        let summary = dispatcher.run(&[category("lamps", &["lamp"], None)]).await;
        assert_eq!(summary.products_saved, 1);
        assert_eq!(summary.detail_failures, 1);
        assert_eq!(summary.categories_processed, 1);
    }

    #[tokio::test]
    async fn test_fetch_concurrency_is_bounded_across_categories() {
        let mut mock = MockSearch { latency: Duration::from_millis(20), ..MockSearch::default() };
        let mut categories = Vec::new();
        for c in 0..4 {
            let query = format!("query {c}");
            let cards: Vec<String> =
                (0..5).map(|i| card(&format!("B00000{c}{i:03}"), &format!("Item {c}-{i}"))).collect();
            for i in 0..5 {
                mock = mock.with_product(&format!("B00000{c}{i:03}"), detail(&format!("Item {c}-{i}")));
            }
            mock = mock.with_page(&query, 1, page(&cards, false));
            categories.push(category(&format!("cat{c}"), &[query.as_str()], None));
        }

        let dir = TempDir::new().unwrap();
        let options = HarvestOptions { category_workers: 4, max_concurrent_fetches: 2, ..options() };
        let (dispatcher, scraper) = build_dispatcher(mock, &dir, options);

        let summary = dispatcher.run(&categories).await;
        assert_eq!(summary.products_saved, 20);
        let peak = scraper.client().max_in_flight.load(Ordering::SeqCst);
        assert!(peak <= 2, "peak in-flight fetches was {}", peak);
    }
}

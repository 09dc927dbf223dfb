use std::{
    sync::{mpsc, Arc, Mutex},
    time::Duration,
};

use rusqlite::Connection;

use super::{fresh_store, game, StubSite};
use crate::{
    collector::{CancelToken, CollectOptions, Collector, RunReport, RunState},
    errors::{CollectError, FetchError},
    extract::extractor_for,
    fetch::{FetchStrategy, Page, PageSource},
    platform::Platform,
    runner::RunRegistry,
    store::{GameStore, DB_FILE, JSON_FILE},
};

const LISTING: &str = "https://azgames.io/new-games";

fn listing(names: &[&str]) -> String {
    let cells: String = names
        .iter()
        .map(|name| {
            let slug = name.to_lowercase().replace(' ', "-");
            format!(
                r#"<div class="us-grid-game"><a class="us-game-link" href="/{slug}"><img title="{name}"></a></div>"#
            )
        })
        .collect();
    format!(r#"<html><body><div class="us-grid">{cells}</div></body></html>"#)
}

fn detail(slug: &str) -> String {
    format!(r#"<html><body><iframe src="https://azgames.io/{slug}.embed"></iframe></body></html>"#)
}

/// Listing plus a detail page for every game.
fn site(names: &[&str]) -> StubSite {
    names.iter().fold(StubSite::default().page(LISTING, listing(names)), |site, name| {
        let slug = name.to_lowercase().replace(' ', "-");
        site.page(&format!("https://azgames.io/{slug}"), detail(&slug))
    })
}

fn options(max_items: usize) -> CollectOptions {
    CollectOptions {
        max_items,
        delay: (Duration::ZERO, Duration::ZERO),
    }
}

fn run(site: StubSite, store: &GameStore, opts: CollectOptions, cancel: &CancelToken) -> RunReport {
    let fetcher = FetchStrategy::new(Platform::AzGames, Box::new(site), None);
    let extractor = extractor_for(Platform::AzGames);
    let mut collector = Collector::new(extractor.as_ref(), &fetcher, store, opts);

    let report = collector.run(cancel, &|_: &str, _: Option<usize>| {});
    assert_eq!(collector.state(), report.state);
    report
}

fn ten_games() -> Vec<String> {
    (1..=10).map(|i| format!("Game {i}")).collect()
}

#[test]
fn collects_every_listed_game() {
    let (store, _tmp) = fresh_store();

    let report = run(
        site(&["Subway Moto", "Slope", "Moto X3M"]),
        &store,
        options(0),
        &CancelToken::new(),
    );

    assert_eq!(report.state, RunState::Done);
    assert_eq!(report.discovered, 3);
    assert_eq!(report.attempted, 3);
    assert_eq!(report.summary.saved, 3);
    assert_eq!(report.failures, 0);

    let games = store.read(Some(Platform::AzGames)).unwrap();
    assert_eq!(games.len(), 3);
    assert!(games
        .iter()
        .any(|g| g.embed_url == "https://azgames.io/subway-moto.embed"));
}

#[test]
fn known_names_are_filtered_before_detail_fetch() {
    let (store, _tmp) = fresh_store();
    store
        .write(vec![game(Platform::ZapGames, "Subway Moto", "subway-moto")], Platform::ZapGames)
        .unwrap();

    let listing_html = r#"
        <div class="us-grid-game"><a class="us-game-link" href="/subway-moto"><img title="subway moto!!"></a></div>
        <div class="us-grid-game"><a class="us-game-link" href="/slope"><img title="Slope"></a></div>
    "#;
    let stub = StubSite::default()
        .page(LISTING, listing_html)
        .page("https://azgames.io/subway-moto", detail("subway-moto"))
        .page("https://azgames.io/slope", detail("slope"));
    let fetched = stub.fetch_log();

    let report = run(stub, &store, options(0), &CancelToken::new());

    assert_eq!(report.state, RunState::Done);
    assert_eq!(report.filtered, 1);
    assert_eq!(report.summary.saved, 1);

    let fetched = fetched.lock().unwrap();
    assert!(!fetched.iter().any(|url| url.contains("subway-moto")));
    assert!(fetched.iter().any(|url| url == "https://azgames.io/slope"));
}

#[test]
fn cancel_after_third_item_stops_run() {
    let (store, _tmp) = fresh_store();
    let names = ten_games();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();

    let stub = site(&names);
    let fetched = stub.fetch_log();

    let cancel = CancelToken::new();
    let token = cancel.clone();
    let progress = move |_: &str, count: Option<usize>| {
        if count == Some(3) {
            token.cancel();
        }
    };

    let fetcher = FetchStrategy::new(Platform::AzGames, Box::new(stub), None);
    let extractor = extractor_for(Platform::AzGames);
    let mut collector = Collector::new(extractor.as_ref(), &fetcher, &store, options(0));
    let report = collector.run(&cancel, &progress);

    assert_eq!(report.state, RunState::Stopped);
    assert_eq!(collector.state(), RunState::Stopped);
    assert!(report.attempted <= 4, "attempted {}", report.attempted);
    assert_eq!(report.summary.saved, 3);

    // listing page plus at most four detail pages
    assert!(fetched.lock().unwrap().len() <= 5);
    assert_eq!(store.read(None).unwrap().len(), 3);
}

#[test]
fn cancelled_before_start_fetches_nothing() {
    let (store, _tmp) = fresh_store();
    let stub = site(&["Slope"]);
    let fetched = stub.fetch_log();

    let cancel = CancelToken::new();
    cancel.cancel();

    let report = run(stub, &store, options(0), &cancel);

    assert_eq!(report.state, RunState::Stopped);
    assert!(fetched.lock().unwrap().is_empty());
}

#[test]
fn max_items_limits_detail_pages() {
    let (store, _tmp) = fresh_store();
    let names = ten_games();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();

    let report = run(site(&names), &store, options(4), &CancelToken::new());

    assert_eq!(report.state, RunState::Done);
    assert_eq!(report.discovered, 10);
    assert_eq!(report.attempted, 4);
    assert_eq!(store.read(None).unwrap().len(), 4);
}

#[test]
fn listing_failure_fails_run() {
    let (store, _tmp) = fresh_store();

    let report = run(StubSite::default(), &store, options(0), &CancelToken::new());

    assert_eq!(report.state, RunState::Failed);
    assert!(report.error.is_some());
    assert_eq!(report.attempted, 0);
}

#[test]
fn empty_listing_fails_run() {
    let (store, _tmp) = fresh_store();
    let stub = StubSite::default().page(LISTING, "<html><body>maintenance</body></html>");

    let report = run(stub, &store, options(0), &CancelToken::new());

    assert_eq!(report.state, RunState::Failed);
    assert!(report.error.unwrap().contains("no games found"));
}

#[test]
fn item_failures_are_skipped() {
    let (store, _tmp) = fresh_store();

    let stub = StubSite::default()
        .page(LISTING, listing(&["Slope", "Broken Game", "Gone Game", "Moto X3M"]))
        .page("https://azgames.io/slope", detail("slope"))
        .page("https://azgames.io/broken-game", "<html><body>no player here</body></html>")
        .page("https://azgames.io/moto-x3m", detail("moto-x3m"));

    let report = run(stub, &store, options(0), &CancelToken::new());

    assert_eq!(report.state, RunState::Done);
    assert_eq!(report.attempted, 4);
    assert_eq!(report.failures, 2);
    assert_eq!(report.summary.saved, 2);
}

#[test]
fn store_failure_fails_run() {
    let (store, tmp) = fresh_store();

    // reads keep working, every insert is refused
    let conn = Connection::open(tmp.path().join(DB_FILE)).unwrap();
    conn.execute_batch(
        r#"
        CREATE TRIGGER refuse_inserts BEFORE INSERT ON games
        BEGIN
            SELECT RAISE(ABORT, 'store is read-only');
        END;
        "#,
    )
    .unwrap();

    let names = ten_games();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    let stub = site(&names);
    let fetched = stub.fetch_log();

    let report = run(stub, &store, options(0), &CancelToken::new());

    assert_eq!(report.state, RunState::Failed);
    assert_eq!(report.attempted, 1);
    assert_eq!(report.summary.saved, 0);
    assert!(report.error.unwrap().contains("persistence error"));

    // listing page plus the one detail page whose save failed
    assert_eq!(fetched.lock().unwrap().len(), 2);
    assert!(!tmp.path().join(JSON_FILE).exists());
}

#[test]
fn blank_names_are_counted_apart() {
    let (store, _tmp) = fresh_store();

    let listing_html = r#"
        <div class="us-grid-game"><a class="us-game-link" href="/qq"><img title="!!!"></a></div>
        <div class="us-grid-game"><a class="us-game-link" href="/slope"><img title="Slope"></a></div>
    "#;
    let stub = StubSite::default()
        .page(LISTING, listing_html)
        .page("https://azgames.io/slope", detail("slope"));

    let report = run(stub, &store, options(0), &CancelToken::new());

    assert_eq!(report.blank_names, 1);
    assert_eq!(report.filtered, 0);
    assert_eq!(report.summary.saved, 1);
}

#[test]
fn inferred_embed_needs_reachability() {
    let (store, _tmp) = fresh_store();

    let stub = StubSite::default()
        .page(LISTING, listing(&["Slope"]))
        .page("https://azgames.io/slope", "<html><body><h1>Slope</h1></body></html>")
        .reachable("https://azgames.io/slope.embed");

    let report = run(stub, &store, options(0), &CancelToken::new());

    assert_eq!(report.summary.saved, 1);
    assert_eq!(
        store.read(None).unwrap()[0].embed_url,
        "https://azgames.io/slope.embed"
    );
}

#[test]
fn rerun_skips_collected_games() {
    let (store, _tmp) = fresh_store();

    let first = run(site(&["Slope", "Moto X3M"]), &store, options(0), &CancelToken::new());
    assert_eq!(first.summary.saved, 2);

    let second = run(
        site(&["Slope", "Moto X3M", "Subway Moto"]),
        &store,
        options(0),
        &CancelToken::new(),
    );
    assert_eq!(second.filtered, 2);
    assert_eq!(second.attempted, 1);
    assert_eq!(store.read(None).unwrap().len(), 3);
}

#[test]
fn progress_reports_running_count() {
    let (store, _tmp) = fresh_store();
    let counts = Arc::new(Mutex::new(vec![]));

    let seen = counts.clone();
    let progress = move |_: &str, count: Option<usize>| {
        if let Some(count) = count {
            seen.lock().unwrap().push(count);
        }
    };

    let fetcher = FetchStrategy::new(Platform::AzGames, Box::new(site(&["Slope", "Moto X3M"])), None);
    let extractor = extractor_for(Platform::AzGames);
    Collector::new(extractor.as_ref(), &fetcher, &store, options(0)).run(&CancelToken::new(), &progress);

    // two saves, then the final tally
    assert_eq!(*counts.lock().unwrap(), vec![1, 2, 2]);
}

// --- run registry ---

/// Blocks every fetch until the gate opens, then answers 404.
struct Gated(Mutex<mpsc::Receiver<()>>);

impl PageSource for Gated {
    fn fetch(&self, _url: &str) -> Result<Page, FetchError> {
        let _ = self.0.lock().unwrap().recv();
        Err(FetchError::Status(404))
    }

    fn probe(&self, _url: &str) -> bool {
        false
    }
}

#[test]
fn one_run_per_platform() {
    let (store, _tmp) = fresh_store();
    let registry = RunRegistry::new(Arc::new(store));
    let (tx, _events) = mpsc::channel();

    let (gate, rx) = mpsc::channel();
    let fetcher = FetchStrategy::new(Platform::AzGames, Box::new(Gated(Mutex::new(rx))), None);
    let first = registry
        .start(extractor_for(Platform::AzGames), fetcher, options(0), tx.clone())
        .unwrap();
    assert!(registry.is_active(Platform::AzGames));

    let fetcher = FetchStrategy::new(Platform::AzGames, Box::new(StubSite::default()), None);
    let second = registry.start(extractor_for(Platform::AzGames), fetcher, options(0), tx.clone());
    assert!(matches!(second, Err(CollectError::AlreadyRunning(Platform::AzGames))));

    // other platforms are independent
    let fetcher = FetchStrategy::new(Platform::ZapGames, Box::new(StubSite::default()), None);
    let other = registry
        .start(extractor_for(Platform::ZapGames), fetcher, options(0), tx.clone())
        .unwrap();
    assert_eq!(other.join().state, RunState::Failed);

    gate.send(()).unwrap();
    let report = first.join();
    assert_eq!(report.state, RunState::Failed);
    assert!(!registry.is_active(Platform::AzGames));

    let fetcher = FetchStrategy::new(Platform::AzGames, Box::new(StubSite::default()), None);
    let again = registry
        .start(extractor_for(Platform::AzGames), fetcher, options(0), tx)
        .unwrap();
    assert_eq!(again.join().state, RunState::Failed);
}

#[test]
fn run_events_arrive_over_channel() {
    let (store, _tmp) = fresh_store();
    let registry = RunRegistry::new(Arc::new(store));
    let (tx, events) = mpsc::channel();

    let fetcher = FetchStrategy::new(Platform::AzGames, Box::new(site(&["Slope"])), None);
    let handle = registry
        .start(extractor_for(Platform::AzGames), fetcher, options(0), tx)
        .unwrap();

    let messages: Vec<String> = events.iter().map(|e| e.message).collect();
    let report = handle.join();

    assert_eq!(report.state, RunState::Done);
    assert_eq!(messages.first().map(String::as_str), Some("collecting azgames.io"));
    assert!(messages.iter().any(|m| m.starts_with("saved Slope")));
}

#[test]
fn parallel_runs_share_one_channel() {
    let (store, _tmp) = fresh_store();
    let registry = RunRegistry::new(Arc::new(store));
    let (tx, events) = mpsc::channel();

    // azgames stays blocked on its listing until zapgames has finished
    let (gate, rx) = mpsc::channel();
    let fetcher = FetchStrategy::new(Platform::AzGames, Box::new(Gated(Mutex::new(rx))), None);
    let blocked = registry
        .start(extractor_for(Platform::AzGames), fetcher, options(0), tx.clone())
        .unwrap();

    let fetcher = FetchStrategy::new(Platform::ZapGames, Box::new(StubSite::default()), None);
    let quick = registry
        .start(extractor_for(Platform::ZapGames), fetcher, options(0), tx)
        .unwrap();
    assert_eq!(quick.join().state, RunState::Failed);

    let mut zap_done = false;
    while !zap_done {
        let event = events.recv().unwrap();
        zap_done = event.platform == Platform::ZapGames && event.message.starts_with("FAILED");
    }

    gate.send(()).unwrap();
    let platforms: Vec<Platform> = events.iter().map(|e| e.platform).collect();
    assert!(platforms.iter().all(|p| *p == Platform::AzGames));
    assert_eq!(blocked.join().state, RunState::Failed);
}

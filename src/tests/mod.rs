mod collector;

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use chrono::{DateTime, Utc};

use crate::{
    errors::FetchError,
    fetch::{Page, PageSource},
    games::GameCreate,
    platform::Platform,
    store::GameStore,
};

fn fresh_store() -> (GameStore, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let store = GameStore::open(tmp.path()).unwrap();
    (store, tmp)
}

fn game(platform: Platform, name: &str, slug: &str) -> GameCreate {
    let source_url = format!("{}/{slug}", platform.origin());
    GameCreate::found(platform, name, &source_url, &format!("{source_url}.embed"))
}

fn game_at(platform: Platform, name: &str, slug: &str, at: DateTime<Utc>) -> GameCreate {
    GameCreate {
        collected_at: Some(at),
        ..game(platform, name, slug)
    }
}

/// Canned site: known urls answer 200 with their html, everything else 404.
#[derive(Default)]
struct StubSite {
    pages: HashMap<String, String>,
    reachable: HashSet<String>,
    fetched: Arc<Mutex<Vec<String>>>,
}

impl StubSite {
    fn page(mut self, url: &str, html: impl Into<String>) -> Self {
        self.pages.insert(url.to_string(), html.into());
        self
    }

    fn reachable(mut self, url: &str) -> Self {
        self.reachable.insert(url.to_string());
        self
    }

    fn fetch_log(&self) -> Arc<Mutex<Vec<String>>> {
        self.fetched.clone()
    }
}

impl PageSource for StubSite {
    fn fetch(&self, url: &str) -> Result<Page, FetchError> {
        self.fetched.lock().unwrap().push(url.to_string());

        match self.pages.get(url) {
            Some(html) => Ok(Page {
                url: url.to_string(),
                status: 200,
                html: html.clone(),
                rendered: false,
            }),
            None => Err(FetchError::Status(404)),
        }
    }

    fn probe(&self, url: &str) -> bool {
        self.reachable.contains(url)
    }
}

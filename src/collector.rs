use std::{
    collections::HashSet,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::sleep,
    time::Duration,
};

use rand::Rng;
use serde::Serialize;

use crate::{
    config::Config,
    errors::CollectError,
    extract::SiteExtractor,
    fetch::FetchStrategy,
    games::{normalize_name, CandidateEntry, GameCreate},
    platform::Platform,
    store::{GameStore, WriteSummary},
};

/// Granularity of cancellation checks while pausing between items.
const PAUSE_SLICE: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunState {
    Idle,
    Listing,
    Detailing,
    Done,
    Stopped,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Idle => "IDLE",
            RunState::Listing => "LISTING",
            RunState::Detailing => "DETAILING",
            RunState::Done => "DONE",
            RunState::Stopped => "STOPPED",
            RunState::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Cooperative stop flag, checked before each listing page and each item.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Where a run reports what it is doing. `count` is the number of games saved so far.
pub trait Progress: Send + Sync {
    fn report(&self, message: &str, count: Option<usize>);
}

impl<F: Fn(&str, Option<usize>) + Send + Sync> Progress for F {
    fn report(&self, message: &str, count: Option<usize>) {
        self(message, count)
    }
}

#[derive(Clone, Debug)]
pub struct CollectOptions {
    /// Detail pages to visit, 0 means unlimited
    pub max_items: usize,
    pub delay: (Duration, Duration),
}

impl CollectOptions {
    pub fn from_config(config: &Config, platform: Platform) -> Self {
        Self {
            max_items: config.max_items(platform),
            delay: config.delay_bounds(platform),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub platform: Platform,
    pub state: RunState,
    /// Links found on listing pages
    pub discovered: usize,
    /// Links dropped because the game is already stored
    pub filtered: usize,
    /// Links dropped because the name has no letters or digits
    pub blank_names: usize,
    /// Detail pages visited
    pub attempted: usize,
    pub failures: usize,
    #[serde(flatten)]
    pub summary: WriteSummary,
    pub error: Option<String>,
}

impl RunReport {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            state: RunState::Idle,
            discovered: 0,
            filtered: 0,
            blank_names: 0,
            attempted: 0,
            failures: 0,
            summary: WriteSummary::default(),
            error: None,
        }
    }
}

/// Drives one collection run: list, filter, then visit each detail page.
pub struct Collector<'a> {
    extractor: &'a dyn SiteExtractor,
    fetcher: &'a FetchStrategy,
    store: &'a GameStore,
    options: CollectOptions,
    state: RunState,
}

impl<'a> Collector<'a> {
    pub fn new(
        extractor: &'a dyn SiteExtractor,
        fetcher: &'a FetchStrategy,
        store: &'a GameStore,
        options: CollectOptions,
    ) -> Self {
        Self {
            extractor,
            fetcher,
            store,
            options,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn run(&mut self, cancel: &CancelToken, progress: &dyn Progress) -> RunReport {
        let platform = self.extractor.platform();
        let mut report = RunReport::new(platform);

        self.state = RunState::Listing;
        log::info!("{platform}: collecting, limit={}", self.options.max_items);
        progress.report(&format!("collecting {platform}"), None);

        let candidates = match self.discover(cancel, progress, &mut report) {
            Ok(Some(candidates)) => candidates,
            Ok(None) => return self.finish(report, RunState::Stopped, progress),
            Err(err) => {
                log::error!("{platform}: listing failed: {err}");
                report.error = Some(err.to_string());
                return self.finish(report, RunState::Failed, progress);
            }
        };

        self.state = RunState::Detailing;

        let limit = match self.options.max_items {
            0 => candidates.len(),
            max => max.min(candidates.len()),
        };

        for (idx, candidate) in candidates.into_iter().take(limit).enumerate() {
            if cancel.is_cancelled() {
                return self.finish(report, RunState::Stopped, progress);
            }

            if idx > 0 && !self.pause(cancel) {
                return self.finish(report, RunState::Stopped, progress);
            }

            report.attempted += 1;
            progress.report(&format!("[{}/{limit}] {}", idx + 1, candidate.name), None);

            let game = match self.collect_one(&candidate) {
                Ok(game) => game,
                Err(err) => {
                    log::warn!("{platform}: skipping {}: {err}", candidate.url);
                    report.failures += 1;
                    progress.report(&format!("skipped {}: {err}", candidate.name), None);
                    continue;
                }
            };

            let url = game.usable_url().unwrap_or_default().to_string();
            match self.store.write(vec![game], platform) {
                Ok(summary) => {
                    report.summary.merge(summary);
                    if summary.saved > 0 {
                        progress.report(
                            &format!("saved {}: {url}", candidate.name),
                            Some(report.summary.saved),
                        );
                    } else {
                        progress.report(&format!("not saved {}", candidate.name), None);
                    }
                }
                Err(err) => {
                    log::error!("{platform}: failed to save {}: {err}", candidate.url);
                    report.error = Some(CollectError::from(err).to_string());
                    return self.finish(report, RunState::Failed, progress);
                }
            }
        }

        self.finish(report, RunState::Done, progress)
    }

    /// Candidates worth a detail fetch, `None` when cancelled.
    fn discover(
        &self,
        cancel: &CancelToken,
        progress: &dyn Progress,
        report: &mut RunReport,
    ) -> Result<Option<Vec<CandidateEntry>>, CollectError> {
        let platform = self.extractor.platform();
        let existing = self.store.existing_names()?;

        let mut seen_urls = HashSet::new();
        let mut seen_names = HashSet::new();
        let mut found = Vec::new();

        for listing_url in platform.listing_urls() {
            if cancel.is_cancelled() {
                return Ok(None);
            }

            progress.report(&format!("fetching {listing_url}"), None);

            let candidates = self
                .fetcher
                .fetch_with(listing_url, platform.listing_marker(), |page| {
                    let candidates = self.extractor.list(&page.html);
                    (!candidates.is_empty()).then_some(candidates)
                })?
                .ok_or_else(|| CollectError::Parse(format!("no games found on {listing_url}")))?;

            log::info!("{platform}: {} games on {listing_url}", candidates.len());
            report.discovered += candidates.len();

            for candidate in candidates {
                if !seen_urls.insert(candidate.url.clone()) {
                    continue;
                }

                let key = normalize_name(&candidate.name);
                if key.is_empty() {
                    log::debug!("{platform}: skipping {}, blank name", candidate.url);
                    report.blank_names += 1;
                    continue;
                }
                if existing.contains(&key) || !seen_names.insert(key) {
                    log::debug!("{platform}: '{}' already collected", candidate.name);
                    report.filtered += 1;
                    continue;
                }

                found.push(candidate);
            }
        }

        progress.report(
            &format!(
                "{} games listed, {} already collected, {} new",
                report.discovered,
                report.filtered,
                found.len()
            ),
            None,
        );

        Ok(Some(found))
    }

    fn collect_one(&self, candidate: &CandidateEntry) -> Result<GameCreate, CollectError> {
        let platform = self.extractor.platform();

        let url = self
            .fetcher
            .fetch_with(&candidate.url, platform.detail_marker(), |page| {
                self.extractor.detail(&page.html, &candidate.url, self.fetcher)
            })?
            .ok_or_else(|| CollectError::Parse(format!("no embed url on {}", candidate.url)))?;

        if !self.extractor.validate(&url) {
            return Err(CollectError::Validation(format!("{url} is not a {platform} player url")));
        }

        Ok(GameCreate::found(platform, &candidate.name, &candidate.url, &url))
    }

    /// Sleep a random time within the delay bounds. `false` if cancelled meanwhile.
    fn pause(&self, cancel: &CancelToken) -> bool {
        let (min, max) = self.options.delay;
        let (min, max) = (min.as_millis() as u64, max.as_millis() as u64);

        let wait = if max > min {
            rand::rng().random_range(min..=max)
        } else {
            min
        };

        let mut left = Duration::from_millis(wait);
        while !left.is_zero() {
            if cancel.is_cancelled() {
                return false;
            }
            let step = left.min(PAUSE_SLICE);
            sleep(step);
            left -= step;
        }

        !cancel.is_cancelled()
    }

    fn finish(&mut self, mut report: RunReport, state: RunState, progress: &dyn Progress) -> RunReport {
        self.state = state;
        report.state = state;

        log::info!(
            "{}: run finished state={state} attempted={} failures={} {}",
            report.platform,
            report.attempted,
            report.failures,
            report.summary
        );
        progress.report(
            &format!("{state}: saved {} games", report.summary.saved),
            Some(report.summary.saved),
        );

        report
    }
}

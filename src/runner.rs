use std::{
    collections::HashSet,
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use crate::{
    collector::{CancelToken, CollectOptions, Collector, Progress, RunReport, RunState},
    errors::CollectError,
    extract::SiteExtractor,
    fetch::FetchStrategy,
    platform::Platform,
    store::GameStore,
};

/// Progress line of a background run.
#[derive(Clone, Debug)]
pub struct ProgressEvent {
    pub platform: Platform,
    pub message: String,
    pub count: Option<usize>,
}

struct ChannelProgress {
    platform: Platform,
    tx: Mutex<mpsc::Sender<ProgressEvent>>,
}

impl Progress for ChannelProgress {
    fn report(&self, message: &str, count: Option<usize>) {
        let event = ProgressEvent {
            platform: self.platform,
            message: message.to_string(),
            count,
        };
        // receiver gone means nobody is listening anymore
        if let Ok(tx) = self.tx.lock() {
            let _ = tx.send(event);
        }
    }
}

/// A run executing on its own thread.
pub struct RunHandle {
    pub platform: Platform,
    pub cancel: CancelToken,
    handle: JoinHandle<RunReport>,
}

impl RunHandle {
    /// Wait for the run to end. A panicked worker reports as failed.
    pub fn join(self) -> RunReport {
        let platform = self.platform;
        self.handle.join().unwrap_or_else(|_| {
            log::error!("{platform}: collection worker panicked");
            let mut report = RunReport::new(platform);
            report.state = RunState::Failed;
            report.error = Some("worker panicked".to_string());
            report
        })
    }
}

/// Releases the platform slot when the worker ends, panics included.
struct ActiveGuard {
    platform: Platform,
    active: Arc<Mutex<HashSet<Platform>>>,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        let mut active = self
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        active.remove(&self.platform);
        log::debug!("{}: run slot released", self.platform);
    }
}

/// At most one active run per platform, runs of different platforms go in parallel.
pub struct RunRegistry {
    store: Arc<GameStore>,
    active: Arc<Mutex<HashSet<Platform>>>,
}

impl RunRegistry {
    pub fn new(store: Arc<GameStore>) -> Self {
        Self {
            store,
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn is_active(&self, platform: Platform) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(&platform)
    }

    /// Spawn a run for the extractor's platform. Its progress goes to `events`,
    /// which several runs may share; the worker's sender is dropped when it ends.
    pub fn start(
        &self,
        extractor: Box<dyn SiteExtractor>,
        fetcher: FetchStrategy,
        options: CollectOptions,
        events: mpsc::Sender<ProgressEvent>,
    ) -> Result<RunHandle, CollectError> {
        let platform = extractor.platform();

        {
            let mut active = self
                .active
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if !active.insert(platform) {
                return Err(CollectError::AlreadyRunning(platform));
            }
        }

        let guard = ActiveGuard {
            platform,
            active: self.active.clone(),
        };

        let cancel = CancelToken::new();
        let token = cancel.clone();
        let store = self.store.clone();

        // if spawning fails the closure and its guard are dropped, freeing the slot
        let handle = thread::Builder::new()
            .name(format!("collect-{platform}"))
            .spawn(move || {
                let _guard = guard;
                let _span = tracing::info_span!("collect", platform = %platform).entered();

                let progress = ChannelProgress {
                    platform,
                    tx: Mutex::new(events),
                };
                let mut collector = Collector::new(extractor.as_ref(), &fetcher, &store, options);
                collector.run(&token, &progress)
            })?;

        log::info!("{platform}: collection started");

        Ok(RunHandle {
            platform,
            cancel,
            handle,
        })
    }
}

use std::{
    path::Path,
    sync::{mpsc, Arc},
};

use chrono::{DateTime, Utc};
use inquire::error::InquireResult;

use crate::{
    cli::{
        errors::{CliError, CliResult},
        types::{ExportFormat, FilterArgs, PromptPreset},
        validation::*,
    },
    collector::{CancelToken, CollectOptions, RunState},
    config::Config,
    export,
    extract::extractor_for,
    fetch::FetchStrategy,
    games::GameRecord,
    normalize::normalize,
    platform::Platform,
    runner::RunRegistry,
    store::GameStore,
};

/// What every command runs against
pub struct Context {
    pub config: Config,
    pub store: Arc<GameStore>,
}

impl FilterArgs {
    fn since(&self) -> Option<DateTime<Utc>> {
        let hours = self.recent?;
        chrono::Duration::try_hours(hours.min(i64::MAX as u64 / 3600) as i64)
            .and_then(|window| Utc::now().checked_sub_signed(window))
    }

    fn matches(&self, game: &GameRecord) -> bool {
        self.platform.map_or(true, |p| game.platform == p)
            && self.since().map_or(true, |since| game.collected_at >= since)
    }

    fn read(&self, store: &GameStore) -> CliResult<Vec<GameRecord>> {
        let games = match self.recent {
            Some(hours) => store.read_recent(self.platform, hours)?,
            None => store.read(self.platform)?,
        };
        Ok(games)
    }
}

/// Command for collecting games
#[derive(Debug, Clone)]
pub struct CollectCommand {
    pub platforms: Vec<Platform>,
    pub max: Option<usize>,
    pub no_headless: bool,
}

impl CollectCommand {
    pub fn new(platforms: Vec<Platform>, max: Option<usize>, no_headless: bool) -> CliResult<Self> {
        let mut unique = Vec::with_capacity(platforms.len());
        for platform in platforms {
            if !unique.contains(&platform) {
                unique.push(platform);
            }
        }

        if unique.is_empty() {
            return Err(CliError::invalid_input("at least one platform is required"));
        }

        Ok(Self {
            platforms: unique,
            max,
            no_headless,
        })
    }

    pub fn execute(self, ctx: &Context) -> CliResult<()> {
        let mut prepared = vec![];
        for &platform in &self.platforms {
            let fetcher = FetchStrategy::for_platform(platform, &ctx.config.scrape, self.no_headless)?;
            let mut options = CollectOptions::from_config(&ctx.config, platform);
            if let Some(max) = self.max {
                options.max_items = max;
            }
            prepared.push((platform, fetcher, options));
        }

        let registry = RunRegistry::new(ctx.store.clone());
        let (tx, events) = mpsc::channel();
        let mut handles = vec![];
        for (platform, fetcher, options) in prepared {
            handles.push(registry.start(extractor_for(platform), fetcher, options, tx.clone())?);
        }
        // the channel closes once every worker is done
        drop(tx);

        let tokens: Vec<CancelToken> = handles.iter().map(|h| h.cancel.clone()).collect();
        if let Err(err) = ctrlc::set_handler(move || {
            eprintln!("stopping after the current item...");
            for token in &tokens {
                token.cancel();
            }
        }) {
            log::warn!("failed to install ctrl-c handler: {err}");
        }

        for event in events.iter() {
            match event.count {
                Some(count) => eprintln!("[{}] {} ({count})", event.platform, event.message),
                None => eprintln!("[{}] {}", event.platform, event.message),
            }
        }

        let reports: Vec<_> = handles.into_iter().map(|handle| handle.join()).collect();

        println!("{}", serde_json::to_string_pretty(&reports)?);

        let failed: Vec<String> = reports
            .iter()
            .filter(|r| r.state == RunState::Failed)
            .map(|r| r.platform.to_string())
            .collect();
        if !failed.is_empty() {
            return Err(CliError::Internal {
                message: format!("collection failed for {}", failed.join(", ")),
            });
        }

        Ok(())
    }
}

/// Command for listing stored games
#[derive(Debug, Clone)]
pub struct ListCommand {
    pub filter: FilterArgs,
    pub search: Option<String>,
    pub count_only: bool,
}

impl ListCommand {
    pub fn new(filter: FilterArgs, search: Option<String>, count_only: bool) -> CliResult<Self> {
        validate_recent(filter.recent)?;
        if let Some(keyword) = &search {
            validate_keyword(keyword)?;
        }

        Ok(Self {
            filter,
            search,
            count_only,
        })
    }

    pub fn execute(self, ctx: &Context) -> CliResult<()> {
        let games = match &self.search {
            Some(keyword) => ctx
                .store
                .search(keyword)?
                .into_iter()
                .filter(|g| self.filter.matches(g))
                .collect(),
            None => self.filter.read(&ctx.store)?,
        };

        if self.count_only {
            println!("{} games found", games.len());
            return Ok(());
        }

        println!("{}", serde_json::to_string_pretty(&games)?);
        Ok(())
    }
}

/// Command for extracting the embed url of one game page
#[derive(Debug, Clone)]
pub struct ExtractCommand {
    pub url: String,
    pub platform: Platform,
    pub no_headless: bool,
}

impl ExtractCommand {
    pub fn new(url: String, no_headless: bool) -> CliResult<Self> {
        validate_url(&url)?;

        let platform = Platform::detect(&url)
            .ok_or_else(|| CliError::validation("url", "not a page of a supported platform"))?;
        let url = normalize(&url, platform.origin())
            .ok_or_else(|| CliError::validation("url", "URL cannot be normalized"))?;

        Ok(Self {
            url,
            platform,
            no_headless,
        })
    }

    pub fn execute(self, ctx: &Context) -> CliResult<()> {
        let platform = self.platform;
        let fetcher = FetchStrategy::for_platform(platform, &ctx.config.scrape, self.no_headless)?;
        let extractor = extractor_for(platform);

        let found = fetcher.fetch_with(&self.url, platform.detail_marker(), |page| {
            extractor.detail(&page.html, &self.url, &fetcher)
        })?;

        let Some(embed_url) = found else {
            return Err(CliError::Internal {
                message: format!("no embed url found on {}", self.url),
            });
        };

        let result = serde_json::json!({
            "platform": platform,
            "source_url": self.url,
            "embed_url": embed_url,
            "valid": extractor.validate(&embed_url),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
        Ok(())
    }
}

/// Command for exporting stored games
#[derive(Debug, Clone)]
pub struct ExportCommand {
    pub filter: FilterArgs,
    pub format: ExportFormat,
    pub template: String,
    pub output: Option<String>,
}

impl ExportCommand {
    pub fn new(
        filter: FilterArgs,
        format: ExportFormat,
        template: Option<String>,
        preset: Option<PromptPreset>,
        output: Option<String>,
    ) -> CliResult<Self> {
        validate_recent(filter.recent)?;

        let template = match (template, preset) {
            (Some(path), _) => std::fs::read_to_string(&path).map_err(|err| {
                CliError::validation("template", format!("failed to read {path}: {err}"))
            })?,
            (None, Some(preset)) => preset.template().to_string(),
            (None, None) => export::DEFAULT_TEMPLATE.to_string(),
        };
        validate_template(&template)?;

        Ok(Self {
            filter,
            format,
            template,
            output,
        })
    }

    pub fn execute(self, ctx: &Context) -> CliResult<()> {
        let games = self.filter.read(&ctx.store)?;
        let output = self.output.as_deref().map(Path::new);

        if games.is_empty() {
            eprintln!("nothing to export");
            return Ok(());
        }

        match self.format {
            ExportFormat::Prompts => {
                let games = export::unique_by_name(games);
                let prompts = export::render_prompts(&games, self.template.trim());
                export::with_output(output, |out| export::write_prompts(out, &prompts))?;
                log::info!("exported {} prompts", prompts.len());
            }
            ExportFormat::Json => {
                export::with_output(output, |out| export::write_json(out, &games))?;
                log::info!("exported {} games as json", games.len());
            }
            ExportFormat::Csv => {
                export::with_output(output, |out| export::write_csv(out, &games))?;
                log::info!("exported {} games as csv", games.len());
            }
        }

        Ok(())
    }
}

/// Command for wiping the store
#[derive(Debug, Clone)]
pub struct ClearCommand {
    pub yes: bool,
}

impl ClearCommand {
    pub fn new(yes: bool) -> Self {
        Self { yes }
    }

    pub fn execute(self, ctx: &Context) -> CliResult<()> {
        let total = ctx.store.statistics()?.total;

        if !self.yes {
            match inquire::prompt_confirmation(format!(
                "You are about to delete all {total} collected games. Are you really sure?"
            )) {
                InquireResult::Ok(true) => {}
                InquireResult::Ok(false) => return Ok(()),
                InquireResult::Err(err) => return Err(err.into()),
            }
        }

        ctx.store.clear()?;
        println!("{total} games removed");
        Ok(())
    }
}

pub fn print_stats(ctx: &Context) -> CliResult<()> {
    let stats = ctx.store.statistics()?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

pub fn print_platforms(ctx: &Context) -> CliResult<()> {
    for platform in Platform::ALL {
        let (min, max) = ctx.config.delay_bounds(platform);
        println!("{platform}");
        println!("  origin: {}", platform.origin());
        for url in platform.listing_urls() {
            println!("  listing: {url}");
        }
        println!(
            "  max items: {}, delay: {}-{}ms",
            ctx.config.max_items(platform),
            min.as_millis(),
            max.as_millis()
        );
    }
    Ok(())
}
